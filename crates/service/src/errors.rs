use thiserror::Error;

use crate::account::errors::AccountError;
use crate::oauth::OAuthError;
use crate::settings::SettingsError;
use crate::tasks::TaskError;

/// Any error the service layer can surface to a caller that does not care which workflow failed.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    OAuth(#[from] OAuthError),
}
