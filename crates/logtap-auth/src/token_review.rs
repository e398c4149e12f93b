//! HTTP token review client.
//!
//! Posts the bearer token to an external review endpoint and maps the
//! verdict to an [`Identity`]. The endpoint contract mirrors the
//! Kubernetes `TokenReview` shape reduced to what this server needs:
//! request `{"token": "..."}`, response
//! `{"authenticated": bool, "username": "..."}`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::authenticator::Authenticator;
use crate::errors::AuthError;
use crate::identity::Identity;

/// Authenticator backed by an external HTTP token review endpoint.
pub struct TokenReviewAuthenticator {
    client: reqwest::Client,
    review_url: String,
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    authenticated: bool,
    #[serde(default)]
    username: Option<String>,
}

impl TokenReviewAuthenticator {
    /// Create a client for the given review endpoint URL.
    pub fn new(review_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            review_url: review_url.into(),
        }
    }
}

#[async_trait]
impl Authenticator for TokenReviewAuthenticator {
    #[tracing::instrument(skip_all)]
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let body = serde_json::json!({ "token": token });

        let resp = self
            .client
            .post(&self.review_url)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::Review {
                status,
                message: text,
            });
        }

        let review: ReviewResponse = resp.json().await?;
        if !review.authenticated {
            return Err(AuthError::Rejected("token review denied".to_string()));
        }
        let username = review
            .username
            .ok_or_else(|| AuthError::Rejected("review granted but no username".to_string()))?;

        debug!(%username, "token review succeeded");
        Ok(Identity::new(username))
    }
}
