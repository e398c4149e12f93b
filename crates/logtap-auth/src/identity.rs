//! Authenticated subscriber identity.

use serde::{Deserialize, Serialize};

/// Opaque result of a successful authentication.
///
/// Exposes the username used for access-list comparison; never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    username: String,
}

impl Identity {
    /// Wrap an authenticated username.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    /// The username as reported by the authenticator.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Username with every colon replaced by an underscore.
    ///
    /// Colon is a structural separator in some identity schemes
    /// (`system:serviceaccount:...`) and must not defeat the
    /// access-list comparison.
    pub fn normalized_username(&self) -> String {
        self.username.replace(':', "_")
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.username)
    }
}
