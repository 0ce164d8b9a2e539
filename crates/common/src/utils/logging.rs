use std::io;

use configs::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter from `RUST_LOG` when set and valid, else the configured one.
fn build_filter(env: Option<&str>, configured: &str) -> EnvFilter {
    env.and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_new(configured).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the global subscriber on stdout. Returns false when one was
/// already installed.
pub fn init_logging(cfg: &LoggingConfig) -> bool {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(env.as_deref(), &cfg.filter);
    let builder = fmt().with_env_filter(filter).with_writer(io::stdout);
    let res = match cfg.format {
        LogFormat::Compact => builder.with_target(false).compact().try_init(),
        LogFormat::Json => builder.with_target(true).json().try_init(),
    };
    res.is_ok()
}
