//! # logtap-auth
//!
//! Authentication boundary for the logtap server.
//!
//! The server never validates credentials itself; it hands the opaque
//! bearer token to an [`Authenticator`] and treats any failure
//! uniformly as rejection. Two implementations ship here:
//!
//! - [`TokenReviewAuthenticator`]: posts the token to an external
//!   review endpoint over HTTP
//! - [`StaticAuthenticator`]: in-memory token map for tests and local
//!   development

#![deny(unsafe_code)]

pub mod authenticator;
pub mod errors;
pub mod identity;
pub mod token_review;

pub use authenticator::{Authenticator, StaticAuthenticator};
pub use errors::AuthError;
pub use identity::Identity;
pub use token_review::TokenReviewAuthenticator;
