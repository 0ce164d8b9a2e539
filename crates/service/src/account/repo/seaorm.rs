use sea_orm::{DatabaseConnection, EntityTrait};

use models::login;
use models::user_log::{self, LogLevel};
use models::user_profile::Preferences;
use models::{user, user_profile};

use crate::account::domain::{AccountUser, LogEntry, LoginRecord, Profile, RecordedLogin};
use crate::account::errors::AccountError;
use crate::account::repository::AccountRepository;

pub struct SeaOrmAccountRepository {
    pub db: DatabaseConnection,
}

impl SeaOrmAccountRepository {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

#[async_trait::async_trait]
impl AccountRepository for SeaOrmAccountRepository {
    async fn find_user(&self, id: i32) -> Result<Option<AccountUser>, AccountError> {
        let res = user::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| AccountError::Repository(e.to_string()))?;
        Ok(res.map(AccountUser::from))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<AccountUser>, AccountError> {
        Ok(user::find_by_username(&self.db, username).await?.map(AccountUser::from))
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<AccountUser, AccountError> {
        Ok(user::create(&self.db, username, password_hash).await?.into())
    }

    async fn get_or_create_profile(&self, id: &str, name: &str) -> Result<(Profile, bool), AccountError> {
        let (p, created) = user_profile::get_or_create(&self.db, id, name).await?;
        Ok((p.into(), created))
    }

    async fn find_profile_by_user(&self, user_id: i32) -> Result<Option<Profile>, AccountError> {
        Ok(user_profile::find_by_user(&self.db, user_id).await?.map(Profile::from))
    }

    async fn find_profile_by_library_login(&self, login: &str) -> Result<Option<Profile>, AccountError> {
        Ok(user_profile::find_by_library_login(&self.db, login).await?.map(Profile::from))
    }

    async fn record_login(&self, rec: &LoginRecord) -> Result<RecordedLogin, AccountError> {
        let rec = login::LoginRecord {
            profile_id: &rec.profile_id,
            name: &rec.name,
            credential: &rec.credential,
            password_hash: &rec.password_hash,
        };
        Ok(login::record(&self.db, &rec).await?.into())
    }

    async fn update_preferences(&self, profile_id: &str, prefs: &Preferences) -> Result<Profile, AccountError> {
        Ok(user_profile::update_preferences(&self.db, profile_id, prefs).await?.into())
    }

    async fn list_renew_enabled(&self) -> Result<Vec<Profile>, AccountError> {
        Ok(user_profile::list_renew_enabled(&self.db).await?.into_iter().map(Profile::from).collect())
    }

    async fn append_log(&self, profile_id: &str, level: LogLevel, message: &str) -> Result<(), AccountError> {
        user_log::append(&self.db, profile_id, level, message).await?;
        Ok(())
    }

    async fn recent_logs(&self, profile_id: &str, limit: u64) -> Result<Vec<LogEntry>, AccountError> {
        let rows = user_log::recent(&self.db, profile_id, limit).await?;
        Ok(rows.into_iter().map(LogEntry::try_from).collect::<Result<_, _>>()?)
    }
}
