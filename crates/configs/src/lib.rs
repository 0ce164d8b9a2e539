use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

pub const DEV_SESSION_SECRET: &str = "dev-secret-change-me";
pub const DEV_COMMON_PASSWORD: &str = "dev-common-password";
pub const AUTO_RENEW_TASK: &str = "account.tasks.auto_renew";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub i18n: I18nConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8000, worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            acquire_timeout_secs: default_acquire_timeout(),
            sqlx_logging: false,
        }
    }
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_acquire_timeout() -> u64 { 30 }

/// Google OAuth2 client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_profile_url")]
    pub profile_url: String,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            scopes: default_scopes(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            profile_url: default_profile_url(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/calendar".into(),
        "https://www.googleapis.com/auth/userinfo.profile".into(),
    ]
}
fn default_auth_url() -> String { "https://accounts.google.com/o/oauth2/v2/auth".into() }
fn default_token_url() -> String { "https://oauth2.googleapis.com/token".into() }
fn default_profile_url() -> String { "https://www.googleapis.com/oauth2/v2/userinfo".into() }
fn default_http_timeout() -> u64 { 30 }

/// Session cookie and the shared account password.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_secret")]
    pub session_secret: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,
    #[serde(default)]
    pub secure_cookie: bool,
    #[serde(default = "default_common_password")]
    pub common_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: default_session_secret(),
            cookie_name: default_cookie_name(),
            session_ttl_hours: default_session_ttl(),
            secure_cookie: false,
            common_password: default_common_password(),
        }
    }
}

fn default_session_secret() -> String { DEV_SESSION_SECRET.into() }
fn default_cookie_name() -> String { "slh_session".into() }
fn default_session_ttl() -> i64 { 24 * 14 }
fn default_common_password() -> String { DEV_COMMON_PASSWORD.into() }

#[derive(Debug, Clone, Deserialize)]
pub struct I18nConfig {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self { languages: default_languages(), default_language: default_language() }
    }
}

fn default_languages() -> Vec<String> { vec!["zh-hant".into(), "en".into()] }
fn default_language() -> String { "en".into() }

/// Beat schedule and worker pool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_schedule")]
    pub schedule: Vec<ScheduleEntryConfig>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            utc_offset_hours: default_utc_offset(),
            schedule: default_schedule(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScheduleEntryConfig {
    pub name: String,
    pub task: String,
    pub cron: String,
}

fn default_concurrency() -> usize { 2 }
fn default_utc_offset() -> i32 { 8 }
fn default_schedule() -> Vec<ScheduleEntryConfig> {
    vec![ScheduleEntryConfig {
        name: "Auto renew every day at 8 am".into(),
        task: AUTO_RENEW_TASK.into(),
        cron: "0 8 * * *".into(),
    }]
}

/// Output format of the process logs.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// `RUST_LOG` overrides `filter` when set.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_log_filter(), format: LogFormat::default() }
    }
}

fn default_log_filter() -> String { "info,tower_http=info,sea_orm=warn,service::tasks=debug".into() }

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `CONFIG_PATH` (default `config.toml`), or defaults when the file is
    /// missing, then apply env overrides and validate.
    pub fn load_or_env() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            AppConfig::default()
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize_from_env();
        self.server.normalize()?;
        self.database.normalize_from_env();
        self.database.validate()?;
        self.oauth.normalize_from_env();
        self.oauth.validate()?;
        self.auth.normalize_from_env();
        self.auth.validate()?;
        self.i18n.validate()?;
        self.worker.validate()?;
        self.logging.normalize_from_env();
        self.logging.validate()?;
        Ok(())
    }
}

fn env_if_blank(field: &mut String, key: &str) {
    if field.trim().is_empty() {
        if let Ok(v) = std::env::var(key) {
            *field = v;
        }
    }
}

impl ServerConfig {
    fn normalize_from_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        env_if_blank(&mut self.url, "DATABASE_URL");
        if self.url.trim().is_empty() {
            self.url = "sqlite://data/db.sqlite3?mode=rwc".to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("sqlite:") || lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with sqlite:, postgres:// or postgresql://"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl OAuthConfig {
    pub fn normalize_from_env(&mut self) {
        env_if_blank(&mut self.client_id, "GOOGLE_OAUTH2_CLIENT_ID");
        env_if_blank(&mut self.client_secret, "GOOGLE_OAUTH2_CLIENT_SECRET");
        env_if_blank(&mut self.redirect_uri, "GOOGLE_REDIRECT_URI");
        if self.redirect_uri.trim().is_empty() {
            self.redirect_uri = "http://localhost:8000/account/oauth2callback".to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.scopes.is_empty() {
            return Err(anyhow!("oauth.scopes must not be empty"));
        }
        for (name, url) in [("auth_url", &self.auth_url), ("token_url", &self.token_url), ("profile_url", &self.profile_url), ("redirect_uri", &self.redirect_uri)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow!("oauth.{name} must be an http(s) URL"));
            }
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("oauth.http_timeout_secs must be positive"));
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn normalize_from_env(&mut self) {
        if let Ok(v) = std::env::var("SESSION_SECRET") {
            self.session_secret = v;
        }
        if let Ok(v) = std::env::var("COMMON_PASSWORD") {
            self.common_password = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_secret.len() < 16 {
            return Err(anyhow!("auth.session_secret must be at least 16 bytes"));
        }
        if self.common_password.is_empty() {
            return Err(anyhow!("auth.common_password must not be empty"));
        }
        if self.cookie_name.trim().is_empty() {
            return Err(anyhow!("auth.cookie_name must not be empty"));
        }
        if self.session_ttl_hours <= 0 {
            return Err(anyhow!("auth.session_ttl_hours must be positive"));
        }
        Ok(())
    }
}

impl I18nConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.languages.iter().any(|l| l == &self.default_language) {
            return Err(anyhow!("i18n.default_language must be one of i18n.languages"));
        }
        Ok(())
    }
}

impl LoggingConfig {
    pub fn normalize_from_env(&mut self) {
        if let Ok(v) = std::env::var("LOG_FORMAT") {
            match v.to_ascii_lowercase().as_str() {
                "json" => self.format = LogFormat::Json,
                "compact" => self.format = LogFormat::Compact,
                _ => {}
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.filter.trim().is_empty() {
            return Err(anyhow!("logging.filter must not be empty"));
        }
        Ok(())
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(anyhow!("worker.concurrency must be >= 1"));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(anyhow!("worker.utc_offset_hours must be within -12..=14"));
        }
        if let Some(e) = self.schedule.iter().find(|e| e.task.trim().is_empty() || e.cron.split_whitespace().count() != 5) {
            return Err(anyhow!("worker.schedule entry '{}' needs a task and a 5-field cron", e.name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let mut cfg = AppConfig::default();
        cfg.normalize_and_validate().unwrap();
        assert!(!cfg.database.url.is_empty());
        assert_eq!(cfg.i18n.default_language, "en");
        assert_eq!(cfg.worker.schedule.len(), 1);
        assert_eq!(cfg.worker.schedule[0].task, AUTO_RENEW_TASK);
        assert_eq!(cfg.worker.schedule[0].cron, "0 8 * * *");
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [i18n]
            languages = ["en"]
            default_language = "en"

            [[worker.schedule]]
            name = "nightly"
            task = "account.tasks.auto_renew"
            cron = "30 1 * * *"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.i18n.languages, vec!["en".to_string()]);
        assert_eq!(cfg.worker.schedule[0].cron, "30 1 * * *");
        assert_eq!(cfg.auth.cookie_name, "slh_session");
        assert_eq!(cfg.oauth.scopes.len(), 2);
        assert_eq!(cfg.logging.format, LogFormat::Compact);
    }

    #[test]
    fn parses_logging_section() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [logging]
            filter = "debug,sea_orm=info"
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.logging.filter, "debug,sea_orm=info");
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert!(LoggingConfig { filter: " ".into(), ..LoggingConfig::default() }.validate().is_err());
    }

    #[test]
    fn rejects_unknown_database_scheme() {
        let db = DatabaseConfig { url: "mysql://x".into(), ..DatabaseConfig::default() };
        assert!(db.validate().is_err());
    }

    #[test]
    fn rejects_short_session_secret() {
        let auth = AuthConfig { session_secret: "short".into(), ..AuthConfig::default() };
        assert!(auth.validate().is_err());
    }

    #[test]
    fn rejects_default_language_outside_list() {
        let i18n = I18nConfig { languages: vec!["en".into()], default_language: "fr".into() };
        assert!(i18n.validate().is_err());
    }

    #[test]
    fn rejects_malformed_cron() {
        let mut worker = WorkerConfig::default();
        worker.schedule[0].cron = "0 8 * *".into();
        assert!(worker.validate().is_err());
    }
}
