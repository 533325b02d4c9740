//! Cascade recalculation job
//!
//! Recalculates start dates for every task downstream of a changed
//! root, preserving user slack. The first action is the version
//! guard: a job whose token no longer matches the root row is a
//! silent no-op, because a newer mutation has already enqueued its
//! own job.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use planward_core::{Dependency, EngineError, Task, TaskId, VersionToken};
use planward_solver::{propagate, TaskGraph};

use crate::store::Store;

/// What a cascade job did, mostly for logging and tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecalcOutcome {
    /// Root was deleted between enqueue and execution
    RootMissing,
    /// A newer mutation owns the root; this job was superseded
    StaleToken,
    /// Every downstream date already satisfied its constraints
    NoChanges,
    /// Number of tasks whose start date was rewritten
    Updated(usize),
}

/// Run one cascade from `root_id`, guarded by `expected`.
///
/// Walk-time cycles (a concurrent edge insertion racing our read)
/// abort the job with no writes; the next triggering mutation
/// re-runs the pass.
pub async fn recalc_subtree(
    store: &dyn Store,
    root_id: TaskId,
    expected: VersionToken,
) -> Result<RecalcOutcome, EngineError> {
    let Some(root) = store.get_task(root_id).await? else {
        warn!(task = %root_id, "recalc root not found, may have been deleted");
        return Ok(RecalcOutcome::RootMissing);
    };

    if root.version != expected {
        debug!(
            task = %root_id,
            expected = %expected,
            current = %root.version,
            "stale cascade job discarded"
        );
        return Ok(RecalcOutcome::StaleToken);
    }

    let (tasks, edges) = fetch_subgraph(store, &root).await?;
    debug!(
        task = %root_id,
        tasks = tasks.len(),
        edges = edges.len(),
        "cascade subgraph collected"
    );

    let mut graph = TaskGraph::build(&tasks, &edges);
    let updates = match propagate::propagate(&mut graph) {
        Ok(updates) => updates,
        Err(cycle) => {
            error!(task = %root_id, %cycle, "cycle detected during cascade walk");
            return Err(EngineError::Recalc(cycle.to_string()));
        }
    };

    if updates.is_empty() {
        debug!(task = %root_id, "no date changes needed");
        return Ok(RecalcOutcome::NoChanges);
    }

    let written = store.bulk_update_start_dates(&updates).await?;
    info!(task = %root_id, updated = written, "cascade updated task dates");
    Ok(RecalcOutcome::Updated(written))
}

/// Collect the relevant subgraph for a cascade from `root`:
///
/// - the root and all of its transitive successors (these may be
///   rewritten), and
/// - the direct predecessors of any task in that set (needed for
///   correct start dates, never rewritten).
///
/// Only edges pointing *into* the downstream set are kept, so an
/// included predecessor is always an anchor of the walk.
async fn fetch_subgraph(
    store: &dyn Store,
    root: &Task,
) -> Result<(Vec<Task>, Vec<Dependency>), EngineError> {
    let tasks = store.list_tasks(root.project_id).await?;
    let edges = store.list_edges(root.project_id).await?;

    let graph = TaskGraph::build(&tasks, &edges);
    let mut downstream: HashSet<TaskId> = graph.descendants(root.id);
    downstream.insert(root.id);

    let mut keep = downstream.clone();
    let mut sub_edges = Vec::new();
    for edge in edges {
        if downstream.contains(&edge.successor_id) {
            keep.insert(edge.predecessor_id);
            sub_edges.push(edge);
        }
    }

    let sub_tasks: Vec<Task> = tasks.into_iter().filter(|t| keep.contains(&t.id)).collect();

    Ok((sub_tasks, sub_edges))
}
