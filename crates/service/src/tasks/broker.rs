use async_trait::async_trait;
use tracing::debug;

use super::{Job, TaskError};

/// Publishing side of a job queue.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, job: &Job) -> Result<(), TaskError>;
}

/// In-process broker over a `flume` channel. Jobs travel as JSON text.
#[derive(Clone)]
pub struct ChannelBroker {
    tx: flume::Sender<String>,
}

/// Consuming side of [`ChannelBroker`]; clone it once per worker.
#[derive(Clone)]
pub struct JobConsumer {
    rx: flume::Receiver<String>,
}

pub fn channel() -> (ChannelBroker, JobConsumer) {
    let (tx, rx) = flume::unbounded();
    (ChannelBroker { tx }, JobConsumer { rx })
}

#[async_trait]
impl Broker for ChannelBroker {
    async fn publish(&self, job: &Job) -> Result<(), TaskError> {
        let raw = job.to_json()?;
        self.tx.send_async(raw).await.map_err(|e| TaskError::Broker(e.to_string()))?;
        debug!(task = %job.task, job_id = %job.id, "job published");
        Ok(())
    }
}

impl JobConsumer {
    /// Next job, or `None` once every broker handle is dropped.
    pub async fn recv(&self) -> Option<Result<Job, TaskError>> {
        match self.rx.recv_async().await {
            Ok(raw) => Some(Job::from_json(&raw)),
            Err(_) => None,
        }
    }

    pub fn pending(&self) -> usize { self.rx.len() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_consume() {
        let (broker, consumer) = channel();
        let job = Job::new("t", serde_json::json!({"k": 1}));
        broker.publish(&job).await.unwrap();
        assert_eq!(consumer.pending(), 1);
        assert_eq!(consumer.recv().await.unwrap().unwrap(), job);
    }

    #[tokio::test]
    async fn closed_when_broker_dropped() {
        let (broker, consumer) = channel();
        drop(broker);
        assert!(consumer.recv().await.is_none());
    }
}
