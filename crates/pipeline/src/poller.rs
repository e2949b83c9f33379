//! Fixed-interval background poller.
//!
//! Scans for due jobs every tick and hands each to the engine sequentially.
//! One job's failure never aborts the rest of the scan; multiple poller
//! processes may run against the same store because claiming is atomic.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use domainforge_infra::{JobStore, StoreError};

use crate::engine::{JobEngine, ProcessOutcome};

/// Handle to a running poller task.
pub struct PollerHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Request a graceful stop; the current tick finishes first.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawn the poller loop on the current runtime.
pub fn spawn_poller(
    store: Arc<dyn JobStore>,
    engine: Arc<JobEngine>,
    interval: Duration,
    batch_size: u32,
) -> PollerHandle {
    let shutdown = Arc::new(Notify::new());
    let task = tokio::spawn(run(
        store,
        engine,
        interval,
        batch_size,
        Arc::clone(&shutdown),
    ));
    PollerHandle { shutdown, task }
}

async fn run(
    store: Arc<dyn JobStore>,
    engine: Arc<JobEngine>,
    interval: Duration,
    batch_size: u32,
    shutdown: Arc<Notify>,
) {
    info!(interval_secs = interval.as_secs(), batch_size, "job poller started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = tick(store.as_ref(), &engine, batch_size).await {
                    error!(error = %e, "due-job scan failed");
                }
            }
            _ = shutdown.notified() => {
                info!("job poller stopped");
                break;
            }
        }
    }
}

/// One scan: select due jobs, process them in creation order.
async fn tick(
    store: &dyn JobStore,
    engine: &JobEngine,
    batch_size: u32,
) -> Result<(), StoreError> {
    let due = store.due_jobs(Utc::now(), batch_size).await?;
    if due.is_empty() {
        return Ok(());
    }
    debug!(count = due.len(), "processing due jobs");

    for job in due {
        match engine.process(job.id).await {
            Ok(ProcessOutcome::Progressed) => {
                debug!(job_id = %job.id, domain = %job.domain, "job progressed");
            }
            Ok(ProcessOutcome::Abandoned) => {
                debug!(job_id = %job.id, "job claimed elsewhere");
            }
            Ok(ProcessOutcome::Retrying { attempts }) => {
                warn!(job_id = %job.id, domain = %job.domain, attempts, "job will retry");
            }
            Err(e) => {
                error!(job_id = %job.id, domain = %job.domain, error = %e, "job failed");
            }
        }
    }
    Ok(())
}
