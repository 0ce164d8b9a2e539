use chrono::{DateTime, Utc};
use models::user_log::LogLevel;
use models::user_profile::Preferences;
use serde::{Deserialize, Serialize};

/// Local authentication identity (business view)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUser {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
}

/// External identity linked to a local user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub user_id: Option<i32>,
    pub name: String,
    #[serde(skip_serializing)]
    pub credential: Option<String>,
    pub preferences: Preferences,
}

/// Everything a completed login writes, applied as one unit by
/// [`AccountRepository::record_login`](super::repository::AccountRepository::record_login).
#[derive(Debug, Clone)]
pub struct LoginRecord {
    pub profile_id: String,
    pub name: String,
    pub credential: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct RecordedLogin {
    pub user: AccountUser,
    pub profile: Profile,
    pub user_created: bool,
}

/// One line of a profile's activity log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Query parameters of the provider's redirect back to us
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Where to send the browser to start a login, and what to remember meanwhile
#[derive(Debug, Clone, PartialEq)]
pub struct LoginRedirect {
    pub authorize_url: String,
    pub state: String,
    pub next: Option<String>,
}

/// Result of a completed login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: AccountUser,
    pub profile: Profile,
    /// First login for this external identity.
    pub created: bool,
}

impl From<models::user::Model> for AccountUser {
    fn from(u: models::user::Model) -> Self {
        Self { id: u.id, username: u.username, password_hash: u.password_hash, is_active: u.is_active }
    }
}

impl From<models::user_profile::Model> for Profile {
    fn from(p: models::user_profile::Model) -> Self {
        let preferences = p.preferences();
        Self { id: p.id, user_id: p.user_id, name: p.name, credential: p.credential, preferences }
    }
}

impl From<models::login::RecordedLogin> for RecordedLogin {
    fn from(r: models::login::RecordedLogin) -> Self {
        Self { user: r.user.into(), profile: r.profile.into(), user_created: r.user_created }
    }
}

impl TryFrom<models::user_log::Model> for LogEntry {
    type Error = models::errors::ModelError;

    fn try_from(l: models::user_log::Model) -> Result<Self, Self::Error> {
        Ok(Self { time: l.time.with_timezone(&Utc), level: l.level.parse()?, message: l.message })
    }
}
