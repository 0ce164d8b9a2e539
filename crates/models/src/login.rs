//! Login bookkeeping that must land as one unit: the user row, the
//! profile link and the last-login stamp.

use sea_orm::{DatabaseConnection, DatabaseTransaction, EntityTrait, TransactionTrait};
use tracing::debug;

use crate::errors::ModelError;
use crate::{user, user_profile};

#[derive(Debug, Clone, Copy)]
pub struct LoginRecord<'a> {
    pub profile_id: &'a str,
    /// Current display name; becomes the username.
    pub name: &'a str,
    pub credential: &'a str,
    /// Stored only when a user has to be created.
    pub password_hash: &'a str,
}

#[derive(Debug, Clone)]
pub struct RecordedLogin {
    pub user: user::Model,
    pub profile: user_profile::Model,
    pub user_created: bool,
}

/// Create or rename the linked user, store the credential on the profile and
/// stamp the login, all in one transaction. Nothing is written on error.
pub async fn record(db: &DatabaseConnection, rec: &LoginRecord<'_>) -> Result<RecordedLogin, ModelError> {
    let txn = db.begin().await?;
    match link(&txn, rec).await {
        Ok(out) => {
            txn.commit().await?;
            Ok(out)
        }
        Err(e) => {
            txn.rollback().await?;
            Err(e)
        }
    }
}

async fn link(txn: &DatabaseTransaction, rec: &LoginRecord<'_>) -> Result<RecordedLogin, ModelError> {
    let profile = user_profile::find(txn, rec.profile_id)
        .await?
        .ok_or_else(|| ModelError::NotFound(format!("profile {}", rec.profile_id)))?;
    let linked = match profile.user_id {
        Some(uid) => user::Entity::find_by_id(uid).one(txn).await?,
        None => None,
    };
    let (user, user_created) = match linked {
        Some(u) if u.username == rec.name => (u, false),
        Some(u) => {
            debug!(user_id = u.id, "renaming user to current display name");
            (user::rename(txn, u.id, rec.name).await?, false)
        }
        None => (user::create(txn, rec.name, rec.password_hash).await?, true),
    };
    let profile = user_profile::save_login(txn, rec.profile_id, user.id, rec.name, rec.credential).await?;
    let user = user::touch_login(txn, user.id).await?;
    Ok(RecordedLogin { user, profile, user_created })
}
