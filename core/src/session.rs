//! Bearer credential shared between the client and whoever signs in.

use std::sync::Arc;

use parking_lot::RwLock;

/// Cloneable handle over an optional bearer token. Clones observe each
/// other's changes.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Arc<RwLock<Option<String>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.set_token(token);
        session
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// The `authorization` header value, when a token is held.
    pub(crate) fn bearer(&self) -> Option<String> {
        self.token
            .read()
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(|token| format!("Bearer {token}"))
    }
}
