use models::errors::ModelError;
use thiserror::Error;

use crate::oauth::OAuthError;

/// Business errors for the login and account workflows
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("login denied: {0}")]
    Denied(String),
    #[error("oauth state mismatch")]
    StateMismatch,
    #[error("access token still expired after refresh")]
    TokenExpired,
    #[error("identity provider error: {0}")]
    Provider(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid credentials")]
    Unauthorized,
    #[error("hashing error: {0}")]
    HashError(String),
    #[error("repository error: {0}")]
    Repository(String),
}

impl AccountError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AccountError::Denied(_) => 1001,
            AccountError::StateMismatch => 1002,
            AccountError::TokenExpired => 1003,
            AccountError::Provider(_) => 1004,
            AccountError::Validation(_) => 1101,
            AccountError::Conflict(_) => 1102,
            AccountError::NotFound(_) => 1103,
            AccountError::Unauthorized => 1104,
            AccountError::HashError(_) => 1201,
            AccountError::Repository(_) => 1200,
        }
    }
}

impl From<ModelError> for AccountError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Validation(m) => AccountError::Validation(m),
            ModelError::NotFound(m) => AccountError::NotFound(m),
            ModelError::Conflict(m) => AccountError::Conflict(m),
            ModelError::Db(m) => AccountError::Repository(m),
        }
    }
}

impl From<OAuthError> for AccountError {
    fn from(e: OAuthError) -> Self {
        AccountError::Provider(e.to_string())
    }
}
