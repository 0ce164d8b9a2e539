//! Background process: cron beat plus the worker pool that runs scheduled tasks.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use service::tasks::{broker, Beat, WorkerPool};
use service::Services;

async fn run(cfg: configs::AppConfig, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    common::env::ensure_sqlite_dir(&cfg.database.url).await?;
    let db = models::db::connect_and_migrate(&models::db::DatabaseConfig::from(&cfg.database)).await?;
    let services = Services::from_config(&cfg, db).context("wiring services")?;

    let registry = Arc::new(services.task_registry());
    info!(tasks = ?registry.names(), "task registry ready");

    let (producer, consumer) = broker::channel();
    let beat = Beat::from_config(&cfg.worker, Arc::new(producer)).context("building beat schedule")?;
    for entry in beat.entries() {
        info!(schedule = %entry.name, task = %entry.task, cron = entry.schedule.as_str(), utc_offset = cfg.worker.utc_offset_hours, "schedule entry");
    }

    let workers = WorkerPool::new(registry, consumer, cfg.worker.concurrency).spawn(shutdown.clone());
    beat.run(shutdown).await?;
    // dropping the beat closes the broker so idle workers exit
    drop(beat);
    for w in workers {
        if let Err(e) = w.await {
            error!(error = %e, "worker task join error");
        }
    }
    Ok(())
}

/// Wait for `task` or `signal`. On signal, broadcast shutdown and keep waiting
/// until `task` has drained its in-flight jobs. True on a clean stop.
async fn supervise<S>(mut task: JoinHandle<anyhow::Result<()>>, signal: S, shutdown: watch::Sender<bool>) -> bool
where
    S: Future<Output = ()>,
{
    let finished = tokio::select! {
        res = &mut task => Some(res),
        _ = signal => None,
    };
    let res = match finished {
        Some(res) => res,
        None => {
            info!(service = "worker", event = "shutdown_signal", "shutdown requested, draining jobs");
            let _ = shutdown.send(true);
            task.await
        }
    };
    match res {
        Ok(Ok(())) => {
            info!(service = "worker", event = "stop", "worker stopped");
            true
        }
        Ok(Err(e)) => {
            error!(service = "worker", event = "run_failed", error = %e, "worker returned error");
            false
        }
        Err(e) => {
            error!(service = "worker", event = "task_join_error", error = %e, "worker task join error");
            false
        }
    }
}

fn main() -> ExitCode {
    dotenv().ok();
    let cfg = match configs::AppConfig::load_or_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            common::utils::logging::init_logging(&configs::LoggingConfig::default());
            error!(service = "worker", event = "config_invalid", error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    common::utils::logging::init_logging(&cfg.logging);

    let service_id = Uuid::new_v4();
    let pid = std::process::id();

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "worker", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!(service = "worker", event = "start", %service_id, pid, concurrency = cfg.worker.concurrency, "worker service starting");

    rt.block_on(async move {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run(cfg, rx));
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(service = "worker", event = "signal_error", error = %e, "cannot listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };
        if supervise(task, ctrl_c, tx).await {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    })
}
