use std::sync::Arc;

use configs::AppConfig;
use sea_orm::DatabaseConnection;
use tracing::info;

use crate::account::repo::seaorm::SeaOrmAccountRepository;
use crate::account::repository::AccountRepository;
use crate::account::service::{AccountConfig, AccountService};
use crate::errors::ServiceError;
use crate::oauth::{GoogleProvider, IdentityProvider};
use crate::settings::SettingsService;
use crate::tasks::auto_renew::default_registry;
use crate::tasks::TaskRegistry;

/// Wired services shared by the web and worker processes.
#[derive(Clone)]
pub struct Services {
    pub repo: Arc<dyn AccountRepository>,
    pub accounts: Arc<AccountService>,
    pub settings: Arc<SettingsService>,
}

impl Services {
    pub fn new(repo: Arc<dyn AccountRepository>, provider: Arc<dyn IdentityProvider>, cfg: &AppConfig) -> Self {
        let accounts = AccountService::new(
            repo.clone(),
            provider,
            AccountConfig { common_password: cfg.auth.common_password.clone() },
        );
        let settings = SettingsService::new(repo.clone(), cfg.i18n.languages.clone());
        Self { repo, accounts: Arc::new(accounts), settings: Arc::new(settings) }
    }

    /// SeaORM repository plus the Google provider built from `[oauth]`.
    pub fn from_config(cfg: &AppConfig, db: DatabaseConnection) -> Result<Self, ServiceError> {
        let provider = GoogleProvider::from_config(&cfg.oauth)?;
        info!(redirect_uri = %cfg.oauth.redirect_uri, "google provider configured");
        Ok(Self::new(Arc::new(SeaOrmAccountRepository::new(db)), Arc::new(provider), cfg))
    }

    pub fn task_registry(&self) -> TaskRegistry {
        default_registry(self.repo.clone())
    }
}
