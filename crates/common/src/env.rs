//! Environment/runtime helpers
//!
//! Sanity checks run once at startup, before the database is opened.

use std::path::Path;

use tracing::{info, warn};

/// Make sure the directory holding a file-backed SQLite database exists.
///
/// Non-SQLite URLs and in-memory databases are left alone.
pub async fn ensure_sqlite_dir(database_url: &str) -> anyhow::Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(':') {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", dir.display()))?;
            info!(dir = %dir.display(), "sqlite data directory ready");
        }
        _ => {}
    }
    Ok(())
}

/// Warn when a secret still carries its development default.
pub fn warn_if_default(name: &str, value: &str, default: &str) {
    if value == default {
        warn!(setting = %name, "using development default; set it before deploying");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ignores_memory_and_postgres_urls() -> anyhow::Result<()> {
        ensure_sqlite_dir("sqlite::memory:").await?;
        ensure_sqlite_dir("postgres://localhost/slh").await?;
        Ok(())
    }

    #[tokio::test]
    async fn creates_parent_directory() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("slh_env_{}", std::process::id()));
        let url = format!("sqlite://{}/db.sqlite3?mode=rwc", dir.display());
        ensure_sqlite_dir(&url).await?;
        assert!(dir.is_dir());
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }
}
