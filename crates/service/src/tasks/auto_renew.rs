use std::sync::Arc;

use async_trait::async_trait;
use configs::AUTO_RENEW_TASK;
use models::user_log::LogLevel;
use tracing::{info, instrument, warn};

use super::{Job, TaskError, TaskHandler, TaskRegistry};
use crate::account::repository::AccountRepository;

/// Daily job: collects the profiles that opted into auto renew and records
/// the run in each profile's activity log. Renewal against the library
/// system happens outside this process.
pub struct AutoRenewTask {
    repo: Arc<dyn AccountRepository>,
}

impl AutoRenewTask {
    pub fn new(repo: Arc<dyn AccountRepository>) -> Self { Self { repo } }

    /// Ids of the profiles to renew for.
    pub async fn select(&self) -> Result<Vec<String>, TaskError> {
        let profiles = self.repo.list_renew_enabled().await.map_err(|e| TaskError::Failed(e.to_string()))?;
        Ok(profiles.into_iter().map(|p| p.id).collect())
    }
}

#[async_trait]
impl TaskHandler for AutoRenewTask {
    #[instrument(skip(self, job), fields(task = %job.task, job_id = %job.id))]
    async fn run(&self, job: &Job) -> Result<(), TaskError> {
        let profiles = self.repo.list_renew_enabled().await.map_err(|e| TaskError::Failed(e.to_string()))?;
        info!(count = profiles.len(), "auto renew candidates");

        let mut failed = 0usize;
        for p in &profiles {
            let message = format!(
                "Auto renew queued for library account {}, renewing {} days before due date",
                p.preferences.library_login.as_deref().unwrap_or_default(),
                p.preferences.renew_date
            );
            if let Err(e) = self.repo.append_log(&p.id, LogLevel::Info, &message).await {
                warn!(profile_id = %p.id, error = %e, "failed to write activity log");
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(TaskError::Failed(format!("{failed} of {} activity logs not written", profiles.len())));
        }
        Ok(())
    }
}

/// Registry with every task this service knows about.
pub fn default_registry(repo: Arc<dyn AccountRepository>) -> TaskRegistry {
    let mut reg = TaskRegistry::new();
    reg.register(AUTO_RENEW_TASK, Arc::new(AutoRenewTask::new(repo)));
    reg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::repository::mock::MockAccountRepository;
    use models::user_profile::Preferences;

    #[tokio::test]
    async fn selects_only_opted_in_profiles() {
        let repo = Arc::new(MockAccountRepository::default());
        repo.get_or_create_profile("g-1", "A").await.unwrap();
        repo.get_or_create_profile("g-2", "B").await.unwrap();
        let prefs = Preferences {
            renew_enabled: true,
            library_login: Some("s2".into()),
            library_password: Some("pw".into()),
            ..Preferences::default()
        };
        repo.update_preferences("g-2", &prefs).await.unwrap();

        let task = AutoRenewTask::new(repo.clone());
        assert_eq!(task.select().await.unwrap(), vec!["g-2".to_string()]);

        let reg = default_registry(repo.clone());
        let job = Job::new(AUTO_RENEW_TASK, serde_json::json!({}));
        assert!(crate::tasks::WorkerPool::dispatch(&reg, &job).await.is_ok());

        let logs = repo.recent_logs("g-2", 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LogLevel::Info);
        assert!(logs[0].message.contains("s2"));
        assert!(repo.recent_logs("g-1", 10).await.unwrap().is_empty());
    }
}
