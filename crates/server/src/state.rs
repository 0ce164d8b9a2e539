use std::sync::Arc;

use configs::AppConfig;
use service::account::AccountService;
use service::settings::SettingsService;
use service::Services;

use crate::pages::{PageError, Pages};
use crate::session::SessionConfig;

#[derive(Clone)]
pub struct ServerState {
    pub accounts: Arc<AccountService>,
    pub settings: Arc<SettingsService>,
    pub session: SessionConfig,
    pub pages: Arc<Pages>,
    pub default_language: String,
}

impl ServerState {
    pub fn new(services: &Services, cfg: &AppConfig) -> Result<Self, PageError> {
        Ok(Self {
            accounts: services.accounts.clone(),
            settings: services.settings.clone(),
            session: SessionConfig::from(&cfg.auth),
            pages: Arc::new(Pages::new()?),
            default_language: cfg.i18n.default_language.clone(),
        })
    }

    /// Language for a session, falling back to the configured default.
    pub fn language<'a>(&'a self, session_lang: Option<&'a str>) -> &'a str {
        service::i18n::resolve(session_lang, self.settings.languages(), &self.default_language)
    }
}
