use async_trait::async_trait;
use models::user_log::LogLevel;
use models::user_profile::Preferences;

use super::domain::{AccountUser, LogEntry, LoginRecord, Profile, RecordedLogin};
use super::errors::AccountError;

/// Repository abstraction for users and their linked profiles.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_user(&self, id: i32) -> Result<Option<AccountUser>, AccountError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<AccountUser>, AccountError>;
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<AccountUser, AccountError>;

    /// Returns `(profile, created)`.
    async fn get_or_create_profile(&self, id: &str, name: &str) -> Result<(Profile, bool), AccountError>;
    async fn find_profile_by_user(&self, user_id: i32) -> Result<Option<Profile>, AccountError>;
    async fn find_profile_by_library_login(&self, login: &str) -> Result<Option<Profile>, AccountError>;

    /// Create or rename the linked user, store the credential and stamp the
    /// login. All or nothing.
    async fn record_login(&self, login: &LoginRecord) -> Result<RecordedLogin, AccountError>;

    async fn update_preferences(&self, profile_id: &str, prefs: &Preferences) -> Result<Profile, AccountError>;
    async fn list_renew_enabled(&self) -> Result<Vec<Profile>, AccountError>;

    async fn append_log(&self, profile_id: &str, level: LogLevel, message: &str) -> Result<(), AccountError>;
    /// Newest first.
    async fn recent_logs(&self, profile_id: &str, limit: u64) -> Result<Vec<LogEntry>, AccountError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
    use std::sync::{Mutex, MutexGuard};

    use chrono::Utc;
    use models::user_profile::validate_preferences;

    #[derive(Default)]
    pub struct MockAccountRepository {
        users: Mutex<HashMap<i32, AccountUser>>,
        profiles: Mutex<HashMap<String, Profile>>, // key: external id
        logs: Mutex<Vec<(String, LogEntry)>>,
        next_id: AtomicI32,
        failing_logins: AtomicUsize,
    }

    fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(|e| e.into_inner())
    }

    impl MockAccountRepository {
        pub fn user_count(&self) -> usize {
            lock(&self.users).len()
        }

        pub fn profile_count(&self) -> usize {
            lock(&self.profiles).len()
        }

        pub fn profile(&self, id: &str) -> Option<Profile> {
            lock(&self.profiles).get(id).cloned()
        }

        /// Make the next `n` logins fail after the user row has been staged,
        /// as a database error mid-transaction would.
        pub fn fail_next_logins(&self, n: usize) {
            self.failing_logins.store(n, Ordering::SeqCst);
        }

        fn update_profile<F: FnOnce(&mut Profile)>(&self, id: &str, f: F) -> Result<Profile, AccountError> {
            let mut profiles = lock(&self.profiles);
            let p = profiles.get_mut(id).ok_or_else(|| AccountError::NotFound(format!("profile {id}")))?;
            f(p);
            Ok(p.clone())
        }

        fn take_failure(&self) -> bool {
            self.failing_logins
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait]
    impl AccountRepository for MockAccountRepository {
        async fn find_user(&self, id: i32) -> Result<Option<AccountUser>, AccountError> {
            Ok(lock(&self.users).get(&id).cloned())
        }

        async fn find_user_by_username(&self, username: &str) -> Result<Option<AccountUser>, AccountError> {
            Ok(lock(&self.users).values().find(|u| u.username == username).cloned())
        }

        async fn create_user(&self, username: &str, password_hash: &str) -> Result<AccountUser, AccountError> {
            models::user::validate_username(username)?;
            let mut users = lock(&self.users);
            if users.values().any(|u| u.username == username) {
                return Err(AccountError::Conflict(format!("username {username} taken")));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let user = AccountUser { id, username: username.to_string(), password_hash: password_hash.to_string(), is_active: true };
            users.insert(id, user.clone());
            Ok(user)
        }

        async fn get_or_create_profile(&self, id: &str, name: &str) -> Result<(Profile, bool), AccountError> {
            let mut profiles = lock(&self.profiles);
            if let Some(p) = profiles.get(id) {
                return Ok((p.clone(), false));
            }
            let p = Profile {
                id: id.to_string(),
                user_id: None,
                name: name.to_string(),
                credential: None,
                preferences: Preferences::default(),
            };
            profiles.insert(id.to_string(), p.clone());
            Ok((p, true))
        }

        async fn find_profile_by_user(&self, user_id: i32) -> Result<Option<Profile>, AccountError> {
            Ok(lock(&self.profiles).values().find(|p| p.user_id == Some(user_id)).cloned())
        }

        async fn find_profile_by_library_login(&self, login: &str) -> Result<Option<Profile>, AccountError> {
            Ok(lock(&self.profiles)
                .values()
                .find(|p| p.preferences.library_login.as_deref() == Some(login))
                .cloned())
        }

        async fn record_login(&self, login: &LoginRecord) -> Result<RecordedLogin, AccountError> {
            models::user::validate_username(&login.name)?;
            let mut users = lock(&self.users);
            let mut profiles = lock(&self.profiles);
            let profile = profiles
                .get(&login.profile_id)
                .cloned()
                .ok_or_else(|| AccountError::NotFound(format!("profile {}", login.profile_id)))?;

            // stage on copies, publish only when every step succeeded
            let linked = profile.user_id.and_then(|uid| users.get(&uid).cloned());
            let taken = |id: Option<i32>| users.values().any(|u| u.username == login.name && Some(u.id) != id);
            let (user, user_created) = match linked {
                Some(u) if u.username == login.name => (u, false),
                Some(u) if taken(Some(u.id)) => return Err(AccountError::Conflict(format!("username {} taken", login.name))),
                Some(u) => (AccountUser { username: login.name.clone(), ..u }, false),
                None if taken(None) => return Err(AccountError::Conflict(format!("username {} taken", login.name))),
                None => {
                    let id = self.next_id.load(Ordering::SeqCst) + 1;
                    let u = AccountUser { id, username: login.name.clone(), password_hash: login.password_hash.clone(), is_active: true };
                    (u, true)
                }
            };
            if self.take_failure() {
                return Err(AccountError::Repository("transient".into()));
            }

            if user_created {
                self.next_id.fetch_add(1, Ordering::SeqCst);
            }
            let profile = Profile {
                user_id: Some(user.id),
                name: login.name.clone(),
                credential: Some(login.credential.clone()),
                ..profile
            };
            users.insert(user.id, user.clone());
            profiles.insert(profile.id.clone(), profile.clone());
            Ok(RecordedLogin { user, profile, user_created })
        }

        async fn update_preferences(&self, profile_id: &str, prefs: &Preferences) -> Result<Profile, AccountError> {
            validate_preferences(prefs)?;
            if let Some(login) = prefs.library_login.as_deref() {
                let profiles = lock(&self.profiles);
                if profiles.values().any(|p| p.id != profile_id && p.preferences.library_login.as_deref() == Some(login)) {
                    return Err(AccountError::Conflict(format!("library login {login} taken")));
                }
            }
            self.update_profile(profile_id, |p| p.preferences = prefs.clone())
        }

        async fn list_renew_enabled(&self) -> Result<Vec<Profile>, AccountError> {
            let mut out: Vec<Profile> = lock(&self.profiles)
                .values()
                .filter(|p| p.preferences.renew_enabled && p.preferences.library_login.is_some())
                .cloned()
                .collect();
            out.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(out)
        }

        async fn append_log(&self, profile_id: &str, level: LogLevel, message: &str) -> Result<(), AccountError> {
            if message.trim().is_empty() {
                return Err(AccountError::Validation("log message required".into()));
            }
            let entry = LogEntry { time: Utc::now(), level, message: message.to_string() };
            lock(&self.logs).push((profile_id.to_string(), entry));
            Ok(())
        }

        async fn recent_logs(&self, profile_id: &str, limit: u64) -> Result<Vec<LogEntry>, AccountError> {
            Ok(lock(&self.logs)
                .iter()
                .rev()
                .filter(|(id, _)| id == profile_id)
                .take(limit as usize)
                .map(|(_, e)| e.clone())
                .collect())
        }
    }
}
