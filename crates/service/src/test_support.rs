#![cfg(test)]
use sea_orm::DatabaseConnection;
use models::db::{connect_and_migrate, DatabaseConfig};

use crate::account::repo::seaorm::SeaOrmAccountRepository;

/// Fresh in-memory database with every migration applied.
pub async fn get_db() -> Result<DatabaseConnection, anyhow::Error> {
    connect_and_migrate(&DatabaseConfig::in_memory()).await
}

pub async fn seaorm_repo() -> Result<SeaOrmAccountRepository, anyhow::Error> {
    Ok(SeaOrmAccountRepository::new(get_db().await?))
}

mod seaorm_tests {
    use std::sync::Arc;

    use models::user_profile::Preferences;

    use super::seaorm_repo;
    use crate::account::domain::{CallbackParams, LoginRecord};
    use crate::account::errors::AccountError;
    use crate::account::repository::AccountRepository;
    use crate::account::service::{AccountConfig, AccountService};
    use crate::oauth::mock::MockProvider;
    use crate::settings::{SettingsForm, SettingsOutcome, SettingsService};
    use crate::tasks::{AutoRenewTask, Job, TaskHandler};

    #[tokio::test]
    async fn login_flow_against_database() {
        let repo = Arc::new(seaorm_repo().await.unwrap());
        let provider = Arc::new(MockProvider::with_profile("1099", "Frank"));
        let svc = AccountService::new(repo.clone(), provider.clone(), AccountConfig { common_password: "pw".into() });
        let params = CallbackParams { code: Some("abc".into()), state: Some("st".into()), error: None };

        let first = svc.complete_login(&params, Some("st")).await.unwrap();
        assert!(first.created);
        assert_eq!(first.profile.user_id, Some(first.user.id));

        provider.set_profile("1099", "Frank Lee");
        provider.expire_next(1);
        let second = svc.complete_login(&params, Some("st")).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.user.id, first.user.id);
        assert_eq!(second.user.username, "Frank Lee");
        assert_eq!(provider.refresh_count(), 1);

        let stored = repo.find_user(first.user.id).await.unwrap().unwrap();
        assert_eq!(stored.username, "Frank Lee");
        assert!(repo.find_user_by_username("Frank").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn settings_and_auto_renew_against_database() {
        let repo = Arc::new(seaorm_repo().await.unwrap());
        repo.get_or_create_profile("g-gina", "Gina").await.unwrap();
        let login = LoginRecord { profile_id: "g-gina".into(), name: "Gina".into(), credential: "{}".into(), password_hash: "hash".into() };
        let user = repo.record_login(&login).await.unwrap().user;

        let settings = SettingsService::new(repo.clone(), vec!["zh-hant".into(), "en".into()]);
        let form = SettingsForm {
            action: Some("update".into()),
            lang: Some("zh-hant".into()),
            renew_enabled: Some("on".into()),
            renew_date: Some("9".into()),
            calendar_name: None,
            library_login: Some("s777".into()),
            library_password: Some("pw".into()),
        };
        let SettingsOutcome::Updated(p) = settings.submit(user.id, &form).await.unwrap() else {
            panic!("expected update");
        };
        assert_eq!(
            p.preferences,
            Preferences {
                lang: "zh-hant".into(),
                renew_enabled: true,
                renew_date: 9,
                library_login: Some("s777".into()),
                library_password: Some("pw".into()),
                ..Preferences::default()
            }
        );

        let task = AutoRenewTask::new(repo.clone());
        assert_eq!(task.select().await.unwrap(), vec!["g-gina".to_string()]);
        task.run(&Job::new(configs::AUTO_RENEW_TASK, serde_json::json!({}))).await.unwrap();
        let logs = settings.activity("g-gina").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].message.contains("s777"));
    }

    #[tokio::test]
    async fn rejected_login_leaves_no_user_behind() {
        let repo = Arc::new(seaorm_repo().await.unwrap());
        repo.create_user("Ivan", "hash").await.unwrap();
        let provider = Arc::new(MockProvider::with_profile("g-ivan", "Ivan"));
        let svc = AccountService::new(repo.clone(), provider.clone(), AccountConfig { common_password: "pw".into() });
        let params = CallbackParams { code: Some("abc".into()), state: Some("st".into()), error: None };

        assert!(matches!(svc.complete_login(&params, Some("st")).await, Err(AccountError::Conflict(_))));
        assert!(repo.find_profile_by_user(1).await.unwrap().is_none());

        provider.set_profile("g-ivan", "Ivan P");
        let out = svc.complete_login(&params, Some("st")).await.unwrap();
        assert_eq!(out.user.username, "Ivan P");
        assert_eq!(out.profile.user_id, Some(out.user.id));
    }

    #[tokio::test]
    async fn duplicate_username_surfaces_conflict() {
        let repo = seaorm_repo().await.unwrap();
        repo.create_user("Hank", "hash").await.unwrap();
        assert!(matches!(repo.create_user("Hank", "hash").await, Err(AccountError::Conflict(_))));
        assert!(repo.find_profile_by_user(42).await.unwrap().is_none());
    }
}
