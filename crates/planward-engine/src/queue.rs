//! Cascade queue seam
//!
//! A durable FIFO carrying `(taskId, versionToken)` recalculation
//! jobs. Delivery is at-least-once; idempotency comes from the
//! version-token guard in the worker, not from the transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use planward_core::{EngineError, TaskId, VersionToken};

/// Wire record understood by the cascade workers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalcJob {
    pub function_name: String,
    pub task_id: TaskId,
    pub version_token: VersionToken,
}

impl RecalcJob {
    pub const FUNCTION_NAME: &'static str = "recalcSubtree";

    pub fn new(task_id: TaskId, version_token: VersionToken) -> Self {
        Self {
            function_name: Self::FUNCTION_NAME.to_string(),
            task_id,
            version_token,
        }
    }
}

/// Transport seam for the cascade queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: RecalcJob) -> Result<(), EngineError>;

    /// Wait for the next job. `None` means the queue was closed and
    /// drained; workers exit.
    async fn dequeue(&self) -> Option<RecalcJob>;

    /// Stop accepting jobs. Already-enqueued jobs remain deliverable.
    fn close(&self);
}

/// In-process queue over an unbounded channel.
pub struct MemoryQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<RecalcJob>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<RecalcJob>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Take the next job without waiting, for callers that drain the
    /// queue themselves instead of running a worker pool.
    pub fn try_dequeue(&self) -> Option<RecalcJob> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: RecalcJob) -> Result<(), EngineError> {
        let sender = self
            .tx
            .lock()
            .clone()
            .ok_or_else(|| EngineError::Internal("cascade queue is closed".into()))?;
        sender
            .send(job)
            .map_err(|_| EngineError::Internal("cascade queue is closed".into()))
    }

    async fn dequeue(&self) -> Option<RecalcJob> {
        self.rx.lock().await.recv().await
    }

    fn close(&self) {
        self.tx.lock().take();
    }
}
