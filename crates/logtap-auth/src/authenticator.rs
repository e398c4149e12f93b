//! The `Authenticator` trait boundary and a static in-memory
//! implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::AuthError;
use crate::identity::Identity;

/// Turns an opaque bearer token into an authenticated [`Identity`].
///
/// The admission path treats any error uniformly as rejection; it
/// never distinguishes "invalid credential" from "authority
/// unreachable" in its own control flow.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validate `token`, returning the identity it belongs to.
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError>;
}

/// In-memory token → username map for tests and local development.
#[derive(Debug, Default)]
pub struct StaticAuthenticator {
    tokens: RwLock<HashMap<String, String>>,
}

impl StaticAuthenticator {
    /// Create an empty authenticator; every token is rejected until
    /// one is granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as belonging to `username`.
    pub fn grant(&self, token: impl Into<String>, username: impl Into<String>) {
        let _ = self.tokens.write().insert(token.into(), username.into());
    }

    /// Stop accepting `token`.
    pub fn revoke(&self, token: &str) {
        let _ = self.tokens.write().remove(token);
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens
            .read()
            .get(token)
            .map(|username| Identity::new(username.as_str()))
            .ok_or_else(|| AuthError::Rejected("unknown token".to_string()))
    }
}
