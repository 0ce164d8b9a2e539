use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use configs::{ScheduleEntryConfig, WorkerConfig};
use croner::Cron;
use tokio::sync::watch;
use tracing::{error, info};

use super::broker::Broker;
use super::{Job, TaskError};

/// Cron expression (5 fields: minute hour day month weekday) with its source text.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: Box<str>,
    cron: Cron,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, TaskError> {
        let cron = Cron::from_str(expr)
            .map_err(|e| TaskError::InvalidSchedule(format!("invalid cron expression '{}': {}", expr, e)))?;
        Ok(Self { expr: expr.into(), cron })
    }

    /// First occurrence strictly after `after`, evaluated in `after`'s offset.
    pub fn next_after(&self, after: &DateTime<FixedOffset>) -> Result<DateTime<FixedOffset>, TaskError> {
        self.cron
            .find_next_occurrence(after, false)
            .map_err(|e| TaskError::InvalidSchedule(format!("no next occurrence for '{}': {}", self.expr, e)))
    }

    pub fn as_str(&self) -> &str { &self.expr }
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub name: String,
    pub task: String,
    pub schedule: CronSchedule,
    pub args: serde_json::Value,
}

impl ScheduleEntry {
    pub fn new(name: &str, task: &str, cron: &str) -> Result<Self, TaskError> {
        Ok(Self {
            name: name.to_string(),
            task: task.to_string(),
            schedule: CronSchedule::parse(cron)?,
            args: serde_json::Value::Object(Default::default()),
        })
    }

    pub fn from_config(cfg: &ScheduleEntryConfig) -> Result<Self, TaskError> {
        Self::new(&cfg.name, &cfg.task, &cfg.cron)
    }
}

/// Periodic publisher: wakes at the next due time and sends one job per due entry.
pub struct Beat {
    entries: Vec<ScheduleEntry>,
    offset: FixedOffset,
    broker: Arc<dyn Broker>,
}

impl Beat {
    pub fn new(entries: Vec<ScheduleEntry>, utc_offset_hours: i32, broker: Arc<dyn Broker>) -> Result<Self, TaskError> {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .ok_or_else(|| TaskError::InvalidSchedule(format!("utc offset out of range: {}", utc_offset_hours)))?;
        Ok(Self { entries, offset, broker })
    }

    pub fn from_config(cfg: &WorkerConfig, broker: Arc<dyn Broker>) -> Result<Self, TaskError> {
        let entries = cfg.schedule.iter().map(ScheduleEntry::from_config).collect::<Result<Vec<_>, _>>()?;
        Self::new(entries, cfg.utc_offset_hours, broker)
    }

    pub fn entries(&self) -> &[ScheduleEntry] { &self.entries }

    /// Earliest upcoming fire time after `now` and the entries due at that instant.
    pub fn next_due(&self, now: DateTime<Utc>) -> Result<Option<(DateTime<Utc>, Vec<usize>)>, TaskError> {
        let local = now.with_timezone(&self.offset);
        let mut best: Option<(DateTime<Utc>, Vec<usize>)> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            let at = entry.schedule.next_after(&local)?.with_timezone(&Utc);
            match best.as_mut() {
                Some((t, due)) if *t == at => {
                    due.push(idx);
                    continue;
                }
                Some((t, _)) if *t < at => continue,
                _ => {}
            }
            best = Some((at, vec![idx]));
        }
        Ok(best)
    }

    /// Publish one job per due entry. Publish failures are logged and skipped.
    pub async fn tick(&self, due: &[usize]) -> Vec<Job> {
        let mut sent = Vec::with_capacity(due.len());
        for entry in due.iter().filter_map(|i| self.entries.get(*i)) {
            let job = Job::new(entry.task.clone(), entry.args.clone());
            match self.broker.publish(&job).await {
                Ok(()) => {
                    info!(schedule = %entry.name, task = %entry.task, job_id = %job.id, "scheduled job sent");
                    sent.push(job);
                }
                Err(e) => error!(schedule = %entry.name, task = %entry.task, error = %e, "failed to publish scheduled job"),
            }
        }
        sent
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), TaskError> {
        loop {
            let Some((at, due)) = self.next_due(Utc::now())? else {
                info!("beat has no schedule entries, exiting");
                return Ok(());
            };
            let wait = (at - Utc::now()).to_std().unwrap_or_default();
            info!(next_run = %at.with_timezone(&self.offset), entries = due.len(), "beat waiting");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.tick(&due).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("beat stopped");
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::broker::channel;
    use chrono::TimeZone;

    fn hk(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn rejects_bad_cron() {
        assert!(matches!(CronSchedule::parse("not a cron"), Err(TaskError::InvalidSchedule(_))));
        assert!(ScheduleEntry::new("x", "t", "0 8 * * *").is_ok());
    }

    #[test]
    fn default_schedule_fires_at_eight_local() {
        let (broker, _c) = channel();
        let beat = Beat::from_config(&WorkerConfig::default(), Arc::new(broker)).unwrap();
        assert_eq!(beat.entries()[0].name, "Auto renew every day at 8 am");

        let (at, due) = beat.next_due(hk(2024, 3, 1, 7, 30)).unwrap().unwrap();
        assert_eq!(at, hk(2024, 3, 1, 8, 0));
        assert_eq!(due, vec![0]);

        let (at, _) = beat.next_due(hk(2024, 3, 1, 8, 0)).unwrap().unwrap();
        assert_eq!(at, hk(2024, 3, 2, 8, 0));
    }

    #[test]
    fn groups_entries_due_together() {
        let (broker, _c) = channel();
        let entries = vec![
            ScheduleEntry::new("a", "t.a", "0 8 * * *").unwrap(),
            ScheduleEntry::new("b", "t.b", "30 7 * * *").unwrap(),
            ScheduleEntry::new("c", "t.c", "0 8 * * *").unwrap(),
        ];
        let beat = Beat::new(entries, 8, Arc::new(broker)).unwrap();
        let (_, due) = beat.next_due(hk(2024, 3, 1, 7, 0)).unwrap().unwrap();
        assert_eq!(due, vec![1]);
        let (_, due) = beat.next_due(hk(2024, 3, 1, 7, 45)).unwrap().unwrap();
        assert_eq!(due, vec![0, 2]);
    }

    #[test]
    fn empty_schedule_has_nothing_due() {
        let (broker, _c) = channel();
        let beat = Beat::new(vec![], 0, Arc::new(broker)).unwrap();
        assert!(beat.next_due(Utc::now()).unwrap().is_none());
        assert!(Beat::new(vec![], 30, Arc::new(channel().0)).is_err());
    }

    #[tokio::test]
    async fn tick_publishes_jobs() {
        let (broker, consumer) = channel();
        let beat = Beat::from_config(&WorkerConfig::default(), Arc::new(broker)).unwrap();
        let sent = beat.tick(&[0]).await;
        assert_eq!(sent.len(), 1);
        let job = consumer.recv().await.unwrap().unwrap();
        assert_eq!(job.task, configs::AUTO_RENEW_TASK);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (broker, _c) = channel();
        let beat = Beat::from_config(&WorkerConfig::default(), Arc::new(broker)).unwrap();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { beat.run(rx).await });
        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}
