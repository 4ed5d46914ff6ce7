//! Composite identifiers for the unified species collection.
//!
//! The backend scopes ids per collection, so plant 7 and animal 7 are
//! different records. The store keys everything by `"<kind>_<backendId>"`,
//! which is derived, never generated, and therefore stable for a session.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CatalogError, Result};

pub const SEPARATOR: char = '_';

/// Discriminates the two species variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Tree,
    Animal,
}

impl Kind {
    pub fn tag(&self) -> &'static str {
        match self {
            Kind::Tree => "tree",
            Kind::Animal => "animal",
        }
    }

    /// Backend collection path for this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            Kind::Tree => "/plantas",
            Kind::Animal => "/animais",
        }
    }

    fn from_tag(tag: &str) -> Option<Kind> {
        match tag {
            "tree" => Some(Kind::Tree),
            "animal" => Some(Kind::Animal),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

pub fn encode(kind: Kind, backend_id: &str) -> String {
    format!("{}{SEPARATOR}{backend_id}", kind.tag())
}

/// Returns the backend-native id segment of a composite id.
pub fn decode(composite: &str) -> Result<&str> {
    split(composite).map(|(_, backend_id)| backend_id)
}

/// Splits a composite id into its kind and backend-native id.
pub fn split(composite: &str) -> Result<(Kind, &str)> {
    let (tag, backend_id) = composite
        .split_once(SEPARATOR)
        .ok_or_else(|| CatalogError::InvalidIdentifier(composite.to_string()))?;
    let kind =
        Kind::from_tag(tag).ok_or_else(|| CatalogError::InvalidIdentifier(composite.to_string()))?;
    if !is_path_segment(backend_id) {
        return Err(CatalogError::InvalidIdentifier(composite.to_string()));
    }
    Ok((kind, backend_id))
}

/// Backend ids are spliced into `{collection}/{id}` verbatim, so they must be
/// a single non-dot segment of unreserved URL characters.
fn is_path_segment(backend_id: &str) -> bool {
    !backend_id.is_empty()
        && backend_id != "."
        && backend_id != ".."
        && backend_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

/// Decodes `composite`, requiring it to belong to `kind`.
pub fn decode_for(kind: Kind, composite: &str) -> Result<&str> {
    match split(composite)? {
        (found, backend_id) if found == kind => Ok(backend_id),
        _ => Err(CatalogError::InvalidIdentifier(format!(
            "{composite} is not a {kind} identifier"
        ))),
    }
}

/// Accepts a backend id sent either as a JSON number or a JSON string.
pub(crate) fn deserialize_backend_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Int(value) => Ok(value.to_string()),
        RawId::Text(value) if !value.is_empty() => Ok(value),
        RawId::Text(_) => Err(serde::de::Error::custom("empty id")),
    }
}
