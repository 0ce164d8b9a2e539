//! Migrator registering the account schema in dependency order.
//! The profile -> user link is added by its own migration so older
//! profile rows stay valid with a NULL user.
pub use sea_orm_migration::prelude::*;

mod m20150401_000001_create_user;
mod m20150401_000002_create_user_profile;
mod m20150405_000003_add_profile_user;
mod m20150412_000004_add_profile_preferences;
mod m20150503_000005_add_library_credentials;
mod m20150503_000006_create_user_log;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20150401_000001_create_user::Migration),
            Box::new(m20150401_000002_create_user_profile::Migration),
            Box::new(m20150405_000003_add_profile_user::Migration),
            Box::new(m20150412_000004_add_profile_preferences::Migration),
            Box::new(m20150503_000005_add_library_credentials::Migration),
            Box::new(m20150503_000006_create_user_log::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm_migration::sea_orm::{ConnectOptions, ConnectionTrait, Database, Statement};

    #[tokio::test]
    async fn up_and_down_on_sqlite() -> Result<(), DbErr> {
        // one connection: each sqlite memory connection is its own database
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1);
        let db = Database::connect(opts).await?;
        Migrator::up(&db, None).await?;

        let manager = SchemaManager::new(&db);
        assert!(manager.has_table("user").await?);
        assert!(manager.has_table("user_profile").await?);
        assert!(manager.has_column("user_profile", "user_id").await?);
        assert!(manager.has_column("user_profile", "renew_date").await?);
        assert!(manager.has_column("user_profile", "library_login").await?);
        assert!(manager.has_table("user_log").await?);

        // a profile may exist before it is linked to a user
        db.execute(Statement::from_string(
            db.get_database_backend(),
            "INSERT INTO user_profile (id, name, lang) VALUES ('g-1', 'Alice', 'en')".to_owned(),
        ))
        .await?;

        Migrator::down(&db, None).await?;
        assert!(!manager.has_table("user_log").await?);
        assert!(!manager.has_table("user_profile").await?);
        assert!(!manager.has_table("user").await?);
        Ok(())
    }
}
