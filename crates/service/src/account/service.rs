use std::sync::Arc;

use argon2::{Argon2, password_hash::{PasswordHasher, PasswordVerifier, SaltString}, PasswordHash};
use rand::rngs::OsRng;
use tracing::{info, debug, warn, instrument};
use uuid::Uuid;

use super::domain::{AccountUser, CallbackParams, LoginOutcome, LoginRecord, LoginRedirect, Profile};
use super::errors::AccountError;
use super::repository::AccountRepository;
use crate::oauth::{Credential, ExternalProfile, FetchOutcome, IdentityProvider};

/// Refreshes allowed per profile fetch before giving up.
pub const MAX_REFRESH_RETRIES: usize = 1;

/// Account service configuration
#[derive(Clone)]
pub struct AccountConfig {
    /// Shared password every OAuth-created user is stored with.
    pub common_password: String,
}

/// OAuth login and account reconciliation, independent of web framework
pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
    provider: Arc<dyn IdentityProvider>,
    cfg: AccountConfig,
}

impl AccountService {
    pub fn new(repo: Arc<dyn AccountRepository>, provider: Arc<dyn IdentityProvider>, cfg: AccountConfig) -> Self {
        Self { repo, provider, cfg }
    }

    pub fn repository(&self) -> Arc<dyn AccountRepository> { self.repo.clone() }

    /// Build the provider redirect for a new login attempt.
    ///
    /// # Examples
    /// ```
    /// use service::account::{service::{AccountService, AccountConfig}, repository::mock::MockAccountRepository};
    /// use service::oauth::mock::MockProvider;
    /// use std::sync::Arc;
    /// let svc = AccountService::new(Arc::new(MockAccountRepository::default()), Arc::new(MockProvider::default()), AccountConfig { common_password: "pw".into() });
    /// let r = svc.start_login(Some("/account/settings".into()));
    /// assert!(r.authorize_url.contains(&r.state));
    /// assert_eq!(r.next.as_deref(), Some("/account/settings"));
    /// ```
    pub fn start_login(&self, next: Option<String>) -> LoginRedirect {
        let state = Uuid::new_v4().simple().to_string();
        let authorize_url = self.provider.authorize_url(&state);
        debug!(has_next = next.is_some(), "login started");
        LoginRedirect { authorize_url, state, next }
    }

    /// Finish the authorization-code flow: exchange, fetch profile, reconcile, authenticate.
    ///
    /// `expected_state` is the state stored when the login started; a
    /// callback without one was never started here and is rejected.
    ///
    /// # Examples
    /// ```
    /// use service::account::{service::{AccountService, AccountConfig}, repository::mock::MockAccountRepository};
    /// use service::account::domain::CallbackParams;
    /// use service::oauth::mock::MockProvider;
    /// use std::sync::Arc;
    /// let provider = Arc::new(MockProvider::with_profile("g-1", "Alice"));
    /// let svc = AccountService::new(Arc::new(MockAccountRepository::default()), provider, AccountConfig { common_password: "pw".into() });
    /// let pending = svc.start_login(None);
    /// let params = CallbackParams { code: Some("c0de".into()), state: Some(pending.state.clone()), error: None };
    /// let out = tokio_test::block_on(svc.complete_login(&params, Some(&pending.state))).unwrap();
    /// assert!(out.created);
    /// assert_eq!(out.profile.user_id, Some(out.user.id));
    /// ```
    #[instrument(skip(self, params, expected_state))]
    pub async fn complete_login(&self, params: &CallbackParams, expected_state: Option<&str>) -> Result<LoginOutcome, AccountError> {
        if let Some(err) = &params.error {
            return Err(AccountError::Denied(err.clone()));
        }
        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AccountError::Denied("missing authorization code".into()))?;
        match expected_state {
            None => {
                warn!("oauth callback without a pending login");
                return Err(AccountError::StateMismatch);
            }
            Some(expected) if params.state.as_deref() != Some(expected) => {
                warn!("oauth state mismatch");
                return Err(AccountError::StateMismatch);
            }
            Some(_) => {}
        }

        let credential = self.provider.exchange_code(code).await?;
        let (external, credential) = self.fetch_profile(credential).await?;
        let (user, profile, created) = self.reconcile(&external, &credential).await?;
        let user = self.authenticate(&user.username, &self.cfg.common_password).await?;

        info!(user_id = user.id, profile_id = %profile.id, created, "user_logged_in");
        Ok(LoginOutcome { user, profile, created })
    }

    /// Fetch the remote profile, refreshing the credential at most
    /// [`MAX_REFRESH_RETRIES`] times. Returns the credential that worked.
    async fn fetch_profile(&self, mut credential: Credential) -> Result<(ExternalProfile, Credential), AccountError> {
        let mut refreshes = 0;
        loop {
            match self.provider.fetch_profile(&credential).await {
                FetchOutcome::Fetched(p) => return Ok((p, credential)),
                FetchOutcome::Failed(reason) => return Err(AccountError::Provider(reason)),
                FetchOutcome::Expired if refreshes < MAX_REFRESH_RETRIES => {
                    refreshes += 1;
                    debug!(attempt = refreshes, "access token expired, refreshing");
                    credential = self.provider.refresh(&credential).await?;
                }
                FetchOutcome::Expired => return Err(AccountError::TokenExpired),
            }
        }
    }

    /// Make sure the external identity has a profile linked to a user,
    /// refreshing names and the stored credential.
    #[instrument(skip(self, external, credential), fields(profile_id = %external.id))]
    pub async fn reconcile(&self, external: &ExternalProfile, credential: &Credential) -> Result<(AccountUser, Profile, bool), AccountError> {
        let (profile, created) = self.repo.get_or_create_profile(&external.id, &external.name).await?;
        let record = LoginRecord {
            profile_id: profile.id,
            name: external.name.clone(),
            credential: credential.to_json()?,
            password_hash: self.hash_password(&self.cfg.common_password)?,
        };
        let recorded = self.repo.record_login(&record).await?;
        if recorded.user_created {
            info!(user_id = recorded.user.id, "user_created");
        }
        Ok((recorded.user, recorded.profile, created))
    }

    /// Verify a username/password pair against the stored argon2 hash.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<AccountUser, AccountError> {
        let user = self
            .repo
            .find_user_by_username(username)
            .await?
            .ok_or(AccountError::Unauthorized)?;
        if !user.is_active {
            return Err(AccountError::Unauthorized);
        }
        let parsed = PasswordHash::new(&user.password_hash).map_err(|e| AccountError::HashError(e.to_string()))?;
        if Argon2::default().verify_password(password.as_bytes(), &parsed).is_err() {
            return Err(AccountError::Unauthorized);
        }
        Ok(user)
    }

    pub async fn find_user(&self, user_id: i32) -> Result<Option<AccountUser>, AccountError> {
        self.repo.find_user(user_id).await
    }

    /// Profile linked to a logged-in user.
    pub async fn current_profile(&self, user_id: i32) -> Result<Profile, AccountError> {
        self.repo
            .find_profile_by_user(user_id)
            .await?
            .ok_or_else(|| AccountError::NotFound(format!("profile for user {user_id}")))
    }

    fn hash_password(&self, password: &str) -> Result<String, AccountError> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AccountError::HashError(e.to_string()))?
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::repository::mock::MockAccountRepository;
    use crate::oauth::mock::MockProvider;

    fn setup(provider: Arc<MockProvider>) -> (AccountService, Arc<MockAccountRepository>) {
        let repo = Arc::new(MockAccountRepository::default());
        let svc = AccountService::new(repo.clone(), provider, AccountConfig { common_password: "common-pw".into() });
        (svc, repo)
    }

    const STATE: &str = "pending-state";

    fn callback(code: &str) -> CallbackParams {
        CallbackParams { code: Some(code.into()), state: Some(STATE.into()), error: None }
    }

    #[tokio::test]
    async fn first_login_creates_linked_user_and_profile() {
        let provider = Arc::new(MockProvider::with_profile("g-100", "Alice"));
        let (svc, repo) = setup(provider);

        let out = svc.complete_login(&callback("code"), Some(STATE)).await.unwrap();
        assert!(out.created);
        assert_eq!(repo.user_count(), 1);
        assert_eq!(repo.profile_count(), 1);
        assert_eq!(out.profile.user_id, Some(out.user.id));
        assert_eq!(out.user.username, "Alice");
        assert!(out.profile.credential.as_deref().unwrap().contains("access-code-1"));
    }

    #[tokio::test]
    async fn repeat_login_updates_names_and_credential() {
        let provider = Arc::new(MockProvider::with_profile("g-100", "Alice"));
        let (svc, repo) = setup(provider.clone());
        let first = svc.complete_login(&callback("one"), Some(STATE)).await.unwrap();

        provider.set_profile("g-100", "Alice Chan");
        let second = svc.complete_login(&callback("two"), Some(STATE)).await.unwrap();

        assert!(!second.created);
        assert_eq!(repo.user_count(), 1);
        assert_eq!(second.user.id, first.user.id);
        assert_eq!(second.user.username, "Alice Chan");
        assert_eq!(second.profile.name, "Alice Chan");
        assert!(second.profile.credential.as_deref().unwrap().contains("access-two"));
    }

    #[tokio::test]
    async fn orphan_profile_gets_a_user() {
        let provider = Arc::new(MockProvider::with_profile("g-7", "Bob"));
        let (svc, repo) = setup(provider);
        repo.get_or_create_profile("g-7", "Bob").await.unwrap();

        let out = svc.complete_login(&callback("c"), Some(STATE)).await.unwrap();
        assert!(!out.created);
        assert_eq!(repo.user_count(), 1);
        assert_eq!(out.profile.user_id, Some(out.user.id));
    }

    #[tokio::test]
    async fn single_expiry_refreshes_once() {
        let provider = Arc::new(MockProvider::with_profile("g-1", "Carol"));
        provider.expire_next(1);
        let (svc, _repo) = setup(provider.clone());

        let out = svc.complete_login(&callback("c"), Some(STATE)).await.unwrap();
        assert_eq!(provider.refresh_count(), 1);
        assert_eq!(provider.fetch_count(), 2);
        assert!(out.profile.credential.as_deref().unwrap().contains("refreshed-1"));
    }

    #[tokio::test]
    async fn second_expiry_is_token_expired() {
        let provider = Arc::new(MockProvider::with_profile("g-1", "Carol"));
        provider.expire_next(2);
        let (svc, repo) = setup(provider.clone());

        let err = svc.complete_login(&callback("c"), Some(STATE)).await.unwrap_err();
        assert!(matches!(err, AccountError::TokenExpired));
        assert_eq!(provider.refresh_count(), 1);
        assert_eq!(repo.user_count(), 0);
    }

    #[tokio::test]
    async fn provider_error_and_missing_code_are_denied() {
        let provider = Arc::new(MockProvider::with_profile("g-1", "Carol"));
        let (svc, _repo) = setup(provider.clone());

        let denied = CallbackParams { code: None, state: None, error: Some("access_denied".into()) };
        assert!(matches!(svc.complete_login(&denied, Some(STATE)).await, Err(AccountError::Denied(_))));
        let no_code = CallbackParams::default();
        assert!(matches!(svc.complete_login(&no_code, Some(STATE)).await, Err(AccountError::Denied(_))));
        assert_eq!(provider.exchanges.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn state_must_match_when_expected() {
        let provider = Arc::new(MockProvider::with_profile("g-1", "Carol"));
        let (svc, _repo) = setup(provider);
        let r = svc.start_login(None);

        let wrong = CallbackParams { code: Some("c".into()), state: Some("other".into()), error: None };
        assert!(matches!(svc.complete_login(&wrong, Some(&r.state)).await, Err(AccountError::StateMismatch)));

        let right = CallbackParams { code: Some("c".into()), state: Some(r.state.clone()), error: None };
        assert!(svc.complete_login(&right, Some(&r.state)).await.is_ok());
    }

    #[tokio::test]
    async fn callback_without_pending_login_is_rejected() {
        let provider = Arc::new(MockProvider::with_profile("g-1", "Carol"));
        let (svc, repo) = setup(provider.clone());

        let err = svc.complete_login(&callback("c"), None).await.unwrap_err();
        assert!(matches!(err, AccountError::StateMismatch));
        assert_eq!(provider.exchanges.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(repo.user_count(), 0);
    }

    #[tokio::test]
    async fn failed_login_write_does_not_block_retry() {
        let provider = Arc::new(MockProvider::with_profile("g-5", "Alice"));
        let (svc, repo) = setup(provider);
        repo.fail_next_logins(1);

        let err = svc.complete_login(&callback("one"), Some(STATE)).await.unwrap_err();
        assert!(matches!(err, AccountError::Repository(_)));
        assert_eq!(repo.user_count(), 0);
        assert_eq!(repo.profile("g-5").unwrap().user_id, None);

        let retry = svc.complete_login(&callback("two"), Some(STATE)).await.unwrap();
        assert_eq!(retry.user.username, "Alice");
        assert_eq!(retry.profile.user_id, Some(retry.user.id));
        assert_eq!(repo.user_count(), 1);

        let again = svc.complete_login(&callback("three"), Some(STATE)).await.unwrap();
        assert_eq!(again.user.id, retry.user.id);
    }

    #[tokio::test]
    async fn failed_fetch_is_provider_error() {
        let provider = Arc::new(MockProvider::with_profile("g-1", "Carol"));
        provider.fail_fetch("boom");
        let (svc, _repo) = setup(provider);
        assert!(matches!(svc.complete_login(&callback("c"), Some(STATE)).await, Err(AccountError::Provider(_))));
    }

    #[tokio::test]
    async fn authenticate_rejects_wrong_password() {
        let provider = Arc::new(MockProvider::with_profile("g-1", "Dan"));
        let (svc, _repo) = setup(provider);
        let out = svc.complete_login(&callback("c"), Some(STATE)).await.unwrap();

        assert!(svc.authenticate("Dan", "common-pw").await.is_ok());
        assert!(matches!(svc.authenticate("Dan", "nope").await, Err(AccountError::Unauthorized)));
        assert!(matches!(svc.authenticate("Nobody", "common-pw").await, Err(AccountError::Unauthorized)));
        assert_eq!(svc.current_profile(out.user.id).await.unwrap().id, "g-1");
    }
}
