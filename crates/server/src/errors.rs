use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};

use service::account::errors::AccountError;
use service::settings::SettingsError;

use crate::pages::PageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("session error: {0}")]
    Session(String),
    #[error(transparent)]
    Page(#[from] PageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Account(e) | ApiError::Settings(SettingsError::Account(e)) => account_status(e),
            ApiError::Settings(SettingsError::Invalid(_)) => StatusCode::BAD_REQUEST,
            ApiError::Session(_) | ApiError::Page(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn account_status(e: &AccountError) -> StatusCode {
    match e {
        AccountError::Denied(_) | AccountError::Unauthorized => StatusCode::UNAUTHORIZED,
        AccountError::StateMismatch | AccountError::Validation(_) => StatusCode::BAD_REQUEST,
        AccountError::NotFound(_) => StatusCode::NOT_FOUND,
        AccountError::Conflict(_) => StatusCode::CONFLICT,
        AccountError::TokenExpired
        | AccountError::Provider(_)
        | AccountError::HashError(_)
        | AccountError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = self.to_string();
        let code = match &self {
            ApiError::Account(e) | ApiError::Settings(SettingsError::Account(e)) => Some(e.code()),
            _ => None,
        };
        if status.is_server_error() {
            error!(error = %msg, status = status.as_u16(), "request failed");
        } else {
            warn!(error = %msg, status = status.as_u16(), "request rejected");
        }
        (status, Json(serde_json::json!({"error": msg, "code": code}))).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("service wiring failed: {0}")]
    Services(#[from] service::errors::ServiceError),
    #[error("page templates: {0}")]
    Pages(#[from] PageError),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
