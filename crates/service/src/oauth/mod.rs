//! Identity provider abstraction used by the login flow.
//!
//! The provider only knows about tokens and the remote profile. Whether a
//! profile fetch failed because the access token expired is reported as a
//! value ([`FetchOutcome::Expired`]) so the caller decides how often to refresh.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod google;
pub mod mock;

pub use google::GoogleProvider;

/// OAuth credential as stored on the profile (JSON text column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    pub fn to_json(&self) -> Result<String, OAuthError> {
        serde_json::to_string(self).map_err(|e| OAuthError::Serialize(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, OAuthError> {
        serde_json::from_str(raw).map_err(|e| OAuthError::Serialize(e.to_string()))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

/// Remote user as returned by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub id: String,
    #[serde(alias = "displayName")]
    pub name: String,
}

/// Result of one profile fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(ExternalProfile),
    /// Access token rejected; a refresh may help.
    Expired,
    Failed(String),
}

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("invalid provider configuration: {0}")]
    Config(String),
    #[error("code exchange failed: {0}")]
    Exchange(String),
    #[error("token refresh failed: {0}")]
    Refresh(String),
    #[error("credential has no refresh token")]
    MissingRefreshToken,
    #[error("credential serialization failed: {0}")]
    Serialize(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authorization URL carrying `state`, requesting offline access.
    fn authorize_url(&self, state: &str) -> String;
    async fn exchange_code(&self, code: &str) -> Result<Credential, OAuthError>;
    async fn refresh(&self, credential: &Credential) -> Result<Credential, OAuthError>;
    async fn fetch_profile(&self, credential: &Credential) -> FetchOutcome;
}
