use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::broker::JobConsumer;
use super::{Job, TaskError, TaskRegistry};

/// Fixed set of consumers running jobs from one queue.
pub struct WorkerPool {
    registry: Arc<TaskRegistry>,
    consumer: JobConsumer,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(registry: Arc<TaskRegistry>, consumer: JobConsumer, concurrency: usize) -> Self {
        Self { registry, consumer, concurrency: concurrency.max(1) }
    }

    /// Run one job with its registered handler.
    pub async fn dispatch(registry: &TaskRegistry, job: &Job) -> Result<(), TaskError> {
        let handler = registry.get(&job.task).ok_or_else(|| TaskError::UnknownTask(job.task.clone()))?;
        handler.run(job).await
    }

    /// Start the consumers. Each exits on shutdown or when the broker closes.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        (0..self.concurrency)
            .map(|worker| {
                let registry = self.registry.clone();
                let consumer = self.consumer.clone();
                let mut shutdown = shutdown.clone();
                tokio::spawn(async move {
                    info!(worker, "worker started");
                    loop {
                        tokio::select! {
                            changed = shutdown.changed() => {
                                if changed.is_err() || *shutdown.borrow() {
                                    break;
                                }
                            }
                            next = consumer.recv() => match next {
                                None => break,
                                Some(Err(e)) => warn!(worker, error = %e, "dropping undecodable job"),
                                Some(Ok(job)) => run_job(worker, &registry, &job).await,
                            }
                        }
                    }
                    info!(worker, "worker stopped");
                })
            })
            .collect()
    }
}

async fn run_job(worker: usize, registry: &TaskRegistry, job: &Job) {
    let started = std::time::Instant::now();
    match WorkerPool::dispatch(registry, job).await {
        Ok(()) => info!(
            worker,
            task = %job.task,
            job_id = %job.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "job succeeded"
        ),
        Err(TaskError::UnknownTask(task)) => warn!(worker, %task, job_id = %job.id, "no handler for job"),
        Err(e) => error!(worker, task = %job.task, job_id = %job.id, error = %e, "job failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::broker::{channel, Broker};
    use crate::tasks::TaskHandler;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl TaskHandler for Counting {
        async fn run(&self, _job: &Job) -> Result<(), TaskError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatch_unknown_task() {
        let reg = TaskRegistry::new();
        let job = Job::new("nope", serde_json::Value::Null);
        assert!(matches!(WorkerPool::dispatch(&reg, &job).await, Err(TaskError::UnknownTask(t)) if t == "nope"));
    }

    #[tokio::test]
    async fn pool_drains_queue_until_broker_closes() {
        let counter = Arc::new(Counting::default());
        let mut reg = TaskRegistry::new();
        reg.register("count", counter.clone());

        let (broker, consumer) = channel();
        for _ in 0..5 {
            broker.publish(&Job::new("count", serde_json::Value::Null)).await.unwrap();
        }
        broker.publish(&Job::new("unknown", serde_json::Value::Null)).await.unwrap();
        drop(broker);

        let (_tx, rx) = watch::channel(false);
        let handles = WorkerPool::new(Arc::new(reg), consumer, 3).spawn(rx);
        assert_eq!(handles.len(), 3);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn pool_stops_on_shutdown() {
        let (_broker, consumer) = channel();
        let (tx, rx) = watch::channel(false);
        let handles = WorkerPool::new(Arc::new(TaskRegistry::new()), consumer, 2).spawn(rx);
        tx.send(true).unwrap();
        for h in handles {
            h.await.unwrap();
        }
    }
}
