//! Scripted provider for tests and doc examples.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Credential, ExternalProfile, FetchOutcome, IdentityProvider, OAuthError};

/// Returns a fixed profile; the first `expire_next` fetches report an expired token.
#[derive(Default)]
pub struct MockProvider {
    profile: Mutex<Option<ExternalProfile>>,
    expire_remaining: AtomicUsize,
    fail_fetch: Mutex<Option<String>>,
    pub exchanges: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl MockProvider {
    pub fn with_profile(id: &str, name: &str) -> Self {
        let p = Self::default();
        p.set_profile(id, name);
        p
    }

    pub fn set_profile(&self, id: &str, name: &str) {
        let mut guard = self.profile.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(ExternalProfile { id: id.to_string(), name: name.to_string() });
    }

    /// Make the next `n` profile fetches answer [`FetchOutcome::Expired`].
    pub fn expire_next(&self, n: usize) {
        self.expire_remaining.store(n, Ordering::SeqCst);
    }

    pub fn fail_fetch(&self, reason: &str) {
        let mut guard = self.fail_fetch.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(reason.to_string());
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://provider.test/auth?response_type=code&access_type=offline&state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> Result<Credential, OAuthError> {
        if code.is_empty() {
            return Err(OAuthError::Exchange("empty code".into()));
        }
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Credential {
            access_token: format!("access-{}-{}", code, n),
            refresh_token: Some(format!("refresh-{}", code)),
            expires_at: None,
            scopes: vec![],
        })
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential, OAuthError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Credential { access_token: format!("refreshed-{}", n), ..credential.clone() })
    }

    async fn fetch_profile(&self, _credential: &Credential) -> FetchOutcome {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let expire = self
            .expire_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if expire {
            return FetchOutcome::Expired;
        }
        if let Some(reason) = self.fail_fetch.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return FetchOutcome::Failed(reason);
        }
        match self.profile.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            Some(p) => FetchOutcome::Fetched(p),
            None => FetchOutcome::Failed("no profile configured".into()),
        }
    }
}
