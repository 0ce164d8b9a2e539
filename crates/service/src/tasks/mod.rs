//! Scheduled task runner: a cron beat publishes [`Job`]s to a [`broker::Broker`],
//! a [`worker::WorkerPool`] consumes them and runs the registered handler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod auto_renew;
pub mod broker;
pub mod schedule;
pub mod worker;

pub use auto_renew::AutoRenewTask;
pub use broker::{Broker, ChannelBroker, JobConsumer};
pub use schedule::{Beat, CronSchedule, ScheduleEntry};
pub use worker::WorkerPool;

/// Unit of work on the broker. Serialized as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub task: String,
    #[serde(default)]
    pub args: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(task: impl Into<String>, args: serde_json::Value) -> Self {
        Self { id: Uuid::new_v4(), task: task.into(), args, enqueued_at: Utc::now() }
    }

    pub fn to_json(&self) -> Result<String, TaskError> {
        serde_json::to_string(self).map_err(|e| TaskError::Codec(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, TaskError> {
        serde_json::from_str(raw).map_err(|e| TaskError::Codec(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("broker error: {0}")]
    Broker(String),
    #[error("job codec error: {0}")]
    Codec(String),
    #[error("no handler registered for task {0}")]
    UnknownTask(String),
    #[error("task failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, job: &Job) -> Result<(), TaskError>;
}

/// Task name to handler lookup.
#[derive(Default, Clone)]
pub struct TaskRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, task: impl Into<String>, handler: Arc<dyn TaskHandler>) -> &mut Self {
        self.handlers.insert(task.into(), handler);
        self
    }

    pub fn get(&self, task: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task).cloned()
    }

    pub fn contains(&self, task: &str) -> bool { self.handlers.contains_key(task) }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
