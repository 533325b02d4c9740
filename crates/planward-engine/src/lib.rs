//! # planward-engine
//!
//! The asynchronous shell around the planward solver: storage and
//! queue seams, entity mutation orchestration, the version-token
//! guard, and the bounded cascade worker pool.
//!
//! Mutations commit to the store, then enqueue `(taskId,
//! versionToken)` jobs; workers re-read the root, discard stale
//! tokens, and persist only the start dates that actually moved.
//! Between a mutation commit and cascade completion the schedule is
//! temporarily inconsistent; readers see a monotonic approach to
//! consistency.
//!
//! ## Example
//!
//! ```rust
//! use planward_engine::{Engine, EngineConfig, NewProject, NewTask};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), planward_core::EngineError> {
//! let engine = Engine::in_memory(EngineConfig::default());
//!
//! let project = engine
//!     .scheduler()
//!     .create_project(NewProject {
//!         name: "Relaunch".into(),
//!         description: None,
//!         deadline: None,
//!         owner_id: "user-42".into(),
//!     })
//!     .await?;
//!
//! let task = engine
//!     .scheduler()
//!     .create_task(NewTask {
//!         project_id: project.id,
//!         title: "Design".into(),
//!         description: None,
//!         duration_days: Some(3),
//!         start_date: None,
//!     })
//!     .await?;
//! assert_eq!(task.project_id, project.id);
//!
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

pub mod config;
pub mod queue;
pub mod recalc;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod worker;

pub use config::EngineConfig;
pub use queue::{JobQueue, MemoryQueue, RecalcJob};
pub use recalc::{recalc_subtree, RecalcOutcome};
pub use scheduler::{NewProject, NewTask, ProjectPatch, Scheduler, TaskPatch};
pub use store::{MemoryStore, Store};
pub use telemetry::init_tracing;
pub use worker::{CascadeWorker, WorkerHandle};

/// Process-wide engine state: the scheduler surface plus a running
/// cascade worker, with an explicit shutdown hook for the hosting
/// process lifecycle.
pub struct Engine {
    scheduler: Scheduler,
    queue: Arc<dyn JobQueue>,
    worker: WorkerHandle,
}

impl Engine {
    /// Wire the engine over concrete store and queue implementations
    /// and start the cascade worker on the current runtime.
    pub fn start(config: EngineConfig, store: Arc<dyn Store>, queue: Arc<dyn JobQueue>) -> Self {
        let scheduler = Scheduler::new(Arc::clone(&store), Arc::clone(&queue));
        let worker = CascadeWorker::new(store, Arc::clone(&queue), &config).spawn();
        Self {
            scheduler,
            queue,
            worker,
        }
    }

    /// Engine over the in-memory reference store and queue.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::start(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryQueue::new()),
        )
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Graceful shutdown: stop accepting cascade jobs, let the worker
    /// drain what is already enqueued, then return.
    pub async fn shutdown(self) {
        self.queue.close();
        self.worker.join().await;
    }
}
