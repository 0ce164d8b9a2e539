use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use super::form::{FormErrors, SettingsAction, SettingsForm, DUPLICATE_LIBRARY_LOGIN};
use crate::account::domain::{LogEntry, Profile};
use crate::account::errors::AccountError;
use crate::account::repository::AccountRepository;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings: {0}")]
    Invalid(FormErrors),
    #[error(transparent)]
    Account(#[from] AccountError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsOutcome {
    Updated(Profile),
    /// Account deletion was asked for. Nothing is removed.
    DeleteRequested,
}

/// Activity entries shown under the settings form.
pub const RECENT_LOG_LIMIT: u64 = 20;

pub struct SettingsService {
    repo: Arc<dyn AccountRepository>,
    languages: Vec<String>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn AccountRepository>, languages: Vec<String>) -> Self {
        Self { repo, languages }
    }

    pub fn languages(&self) -> &[String] { &self.languages }

    /// Profile backing the settings page of `user_id`.
    pub async fn load(&self, user_id: i32) -> Result<Profile, SettingsError> {
        let profile = self
            .repo
            .find_profile_by_user(user_id)
            .await?
            .ok_or_else(|| AccountError::NotFound(format!("profile for user {user_id}")))?;
        Ok(profile)
    }

    /// Newest activity entries of a profile.
    pub async fn activity(&self, profile_id: &str) -> Result<Vec<LogEntry>, SettingsError> {
        Ok(self.repo.recent_logs(profile_id, RECENT_LOG_LIMIT).await?)
    }

    /// Validate and apply a submission.
    ///
    /// # Examples
    /// ```
    /// use service::account::domain::LoginRecord;
    /// use service::account::repository::{AccountRepository, mock::MockAccountRepository};
    /// use service::settings::{SettingsForm, SettingsOutcome, SettingsService};
    /// use std::sync::Arc;
    /// let repo = Arc::new(MockAccountRepository::default());
    /// tokio_test::block_on(async {
    ///     repo.get_or_create_profile("g-1", "Amy").await.unwrap();
    ///     let login = LoginRecord { profile_id: "g-1".into(), name: "Amy".into(), credential: "{}".into(), password_hash: "h".into() };
    ///     repo.record_login(&login).await.unwrap();
    /// });
    /// let svc = SettingsService::new(repo, vec!["en".into()]);
    /// let form = SettingsForm { action: Some("update".into()), lang: Some("en".into()), renew_date: Some("4".into()), ..Default::default() };
    /// match tokio_test::block_on(svc.submit(1, &form)).unwrap() {
    ///     SettingsOutcome::Updated(p) => assert_eq!(p.preferences.renew_date, 4),
    ///     other => panic!("unexpected {:?}", other),
    /// }
    /// ```
    #[instrument(skip(self, form))]
    pub async fn submit(&self, user_id: i32, form: &SettingsForm) -> Result<SettingsOutcome, SettingsError> {
        let profile = self.load(user_id).await?;
        match form.validate(&profile.preferences, &self.languages).map_err(SettingsError::Invalid)? {
            SettingsAction::Update(prefs) => {
                self.check_library_login(&profile, prefs.library_login.as_deref()).await?;
                let updated = self.repo.update_preferences(&profile.id, &prefs).await?;
                info!(profile_id = %updated.id, lang = %prefs.lang, renew_enabled = prefs.renew_enabled, "preferences_updated");
                Ok(SettingsOutcome::Updated(updated))
            }
            SettingsAction::Delete => {
                info!(profile_id = %profile.id, "account_delete_requested");
                Ok(SettingsOutcome::DeleteRequested)
            }
        }
    }

    /// A library login may only belong to one profile.
    async fn check_library_login(&self, profile: &Profile, login: Option<&str>) -> Result<(), SettingsError> {
        let Some(login) = login else { return Ok(()) };
        match self.repo.find_profile_by_library_login(login).await? {
            Some(other) if other.id != profile.id => {
                let mut errors = FormErrors::default();
                errors.add("library_login", DUPLICATE_LIBRARY_LOGIN);
                Err(SettingsError::Invalid(errors))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::domain::LoginRecord;
    use crate::account::repository::mock::MockAccountRepository;
    use models::user_log::LogLevel;

    async fn link(repo: &MockAccountRepository, profile_id: &str, name: &str) -> i32 {
        repo.get_or_create_profile(profile_id, name).await.unwrap();
        let login = LoginRecord { profile_id: profile_id.into(), name: name.into(), credential: "{}".into(), password_hash: "hash".into() };
        repo.record_login(&login).await.unwrap().user.id
    }

    async fn setup() -> (SettingsService, Arc<MockAccountRepository>) {
        let repo = Arc::new(MockAccountRepository::default());
        link(&repo, "g-eve", "Eve").await;
        (SettingsService::new(repo.clone(), vec!["zh-hant".into(), "en".into()]), repo)
    }

    fn renew_form(login: &str) -> SettingsForm {
        SettingsForm {
            action: Some("update".into()),
            lang: Some("en".into()),
            renew_enabled: Some("on".into()),
            library_login: Some(login.into()),
            library_password: Some("pw".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn update_persists_preferences() {
        let (svc, repo) = setup().await;
        let form = SettingsForm {
            action: Some("update".into()),
            lang: Some("zh-hant".into()),
            renew_enabled: Some("on".into()),
            renew_date: Some("6".into()),
            calendar_name: Some("books".into()),
            library_login: Some("s100".into()),
            library_password: Some("pw".into()),
        };
        let out = svc.submit(1, &form).await.unwrap();
        assert!(matches!(out, SettingsOutcome::Updated(_)));
        let stored = repo.profile("g-eve").unwrap();
        assert_eq!(stored.preferences.lang, "zh-hant");
        assert!(stored.preferences.renew_enabled);
        assert_eq!(stored.preferences.calendar_name, "books");
        assert_eq!(stored.preferences.library_login.as_deref(), Some("s100"));
    }

    #[tokio::test]
    async fn library_login_held_by_another_profile_is_rejected() {
        let (svc, repo) = setup().await;
        let other = link(&repo, "g-ann", "Ann").await;
        assert!(matches!(svc.submit(other, &renew_form("s200")).await, Ok(SettingsOutcome::Updated(_))));

        match svc.submit(1, &renew_form("s200")).await {
            Err(SettingsError::Invalid(errs)) => assert_eq!(errs.get("library_login"), &[DUPLICATE_LIBRARY_LOGIN.to_string()]),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(repo.profile("g-eve").unwrap().preferences.library_login, None);

        // resubmitting your own login is fine
        assert!(matches!(svc.submit(other, &renew_form("s200")).await, Ok(SettingsOutcome::Updated(_))));
    }

    #[tokio::test]
    async fn activity_is_newest_first() {
        let (svc, repo) = setup().await;
        repo.append_log("g-eve", LogLevel::Info, "first").await.unwrap();
        repo.append_log("g-eve", LogLevel::Success, "second").await.unwrap();
        let logs = svc.activity("g-eve").await.unwrap();
        assert_eq!(logs.iter().map(|l| l.message.as_str()).collect::<Vec<_>>(), vec!["second", "first"]);
    }

    #[tokio::test]
    async fn delete_leaves_profile_in_place() {
        let (svc, repo) = setup().await;
        let form = SettingsForm { action: Some("delete".into()), ..Default::default() };
        assert_eq!(svc.submit(1, &form).await.unwrap(), SettingsOutcome::DeleteRequested);
        assert_eq!(repo.profile_count(), 1);
        assert_eq!(repo.user_count(), 1);
    }

    #[tokio::test]
    async fn invalid_form_returns_errors() {
        let (svc, repo) = setup().await;
        let form = SettingsForm { action: Some("update".into()), lang: Some("de".into()), ..Default::default() };
        match svc.submit(1, &form).await {
            Err(SettingsError::Invalid(errs)) => assert_eq!(errs.get("lang").len(), 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(repo.profile("g-eve").unwrap().preferences.lang, "en");
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (svc, _repo) = setup().await;
        let form = SettingsForm { action: Some("delete".into()), ..Default::default() };
        assert!(matches!(svc.submit(99, &form).await, Err(SettingsError::Account(AccountError::NotFound(_)))));
    }
}
