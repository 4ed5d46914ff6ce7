//! Error types for the species catalog client and store.
//!
//! # Design
//! Every non-2xx response and every network-level failure lands in
//! `RequestFailed`, carrying the status (when one was received) and the
//! request path relative to the backend base URL. Response bodies that do not
//! fit the endpoint schema surface as `ReconciliationMismatch`; the store
//! reacts to that variant on updates by merging locally instead of failing.

use thiserror::Error;

/// Errors returned by `CatalogClient`, `Transport` implementations and
/// `SpeciesStore`.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backend answered with a non-2xx status, or no answer arrived at all
    /// (`status` is `None` for network-level failures).
    #[error("request to {path} failed ({})", status_label(.status))]
    RequestFailed { status: Option<u16>, path: String },

    /// A composite identifier could not be decoded.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The response body lacks fields required to build a full entity.
    #[error("response from {path} does not match the expected shape: {reason}")]
    ReconciliationMismatch { path: String, reason: String },

    /// A JSON request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl CatalogError {
    /// True when the backend answered 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::RequestFailed {
                status: Some(404),
                ..
            }
        )
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {code}"),
        None => "no response".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_display_includes_status_and_path() {
        let err = CatalogError::RequestFailed {
            status: Some(500),
            path: "/plantas".to_string(),
        };
        assert_eq!(err.to_string(), "request to /plantas failed (HTTP 500)");
    }

    #[test]
    fn network_failure_display() {
        let err = CatalogError::RequestFailed {
            status: None,
            path: "/animais".to_string(),
        };
        assert_eq!(err.to_string(), "request to /animais failed (no response)");
    }

    #[test]
    fn not_found_helper() {
        let err = CatalogError::RequestFailed {
            status: Some(404),
            path: "/animais/9".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!CatalogError::InvalidIdentifier("x".into()).is_not_found());
    }
}
