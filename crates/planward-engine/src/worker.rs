//! Cascade worker pool
//!
//! Consumes the cascade queue with a bounded number of concurrently
//! running jobs and a per-job timeout. Job failures are logged and
//! swallowed: the caller that triggered the cascade has already been
//! answered, and convergence is regained by the next triggering
//! mutation or an operator re-enqueue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::queue::{JobQueue, RecalcJob};
use crate::recalc::recalc_subtree;
use crate::store::Store;

/// Bounded consumer of the cascade queue.
pub struct CascadeWorker {
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
    max_jobs: usize,
    job_timeout: Duration,
}

impl CascadeWorker {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn JobQueue>, config: &EngineConfig) -> Self {
        Self {
            store,
            queue,
            max_jobs: config.max_worker_jobs.max(1),
            job_timeout: config.job_timeout(),
        }
    }

    /// Start the consume loop on the current runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        WorkerHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(max_jobs = self.max_jobs, "cascade worker starting up");
        let slots = Arc::new(Semaphore::new(self.max_jobs));

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                job = self.queue.dequeue() => {
                    let Some(job) = job else {
                        // Queue closed and drained
                        break;
                    };
                    let permit = Arc::clone(&slots)
                        .acquire_owned()
                        .await
                        .expect("job semaphore is never closed");
                    let store = Arc::clone(&self.store);
                    let job_timeout = self.job_timeout;
                    tokio::spawn(async move {
                        let _permit = permit;
                        run_job(store.as_ref(), &job, job_timeout).await;
                    });
                }
            }
        }

        // Wait for in-flight jobs before reporting shutdown.
        let _all = slots
            .acquire_many(self.max_jobs as u32)
            .await
            .expect("job semaphore is never closed");
        info!("cascade worker shut down");
    }
}

async fn run_job(store: &dyn Store, job: &RecalcJob, job_timeout: Duration) {
    debug!(task = %job.task_id, token = %job.version_token, "cascade job started");
    match tokio::time::timeout(
        job_timeout,
        recalc_subtree(store, job.task_id, job.version_token),
    )
    .await
    {
        Ok(Ok(outcome)) => {
            debug!(task = %job.task_id, ?outcome, "cascade job finished");
        }
        Ok(Err(err)) => {
            error!(task = %job.task_id, code = err.code(), %err, "cascade job failed");
        }
        Err(_) => {
            error!(
                task = %job.task_id,
                timeout_secs = job_timeout.as_secs(),
                "cascade job timed out"
            );
        }
    }
}

/// Handle for stopping a spawned [`CascadeWorker`].
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the consume loop to stop, then wait for in-flight jobs.
    /// Jobs still sitting in the queue are abandoned.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }

    /// Wait for the consume loop to end on its own (queue closed and
    /// drained).
    pub async fn join(self) {
        let _ = self.join.await;
    }
}
