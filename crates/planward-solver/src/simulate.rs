//! What-if simulation
//!
//! Runs the slack-preserving forward pass over a cloned in-memory
//! graph with a hypothetical change set applied, and reports how far
//! each task and the project end would move. Nothing is persisted;
//! the caller's rows are read once and never written.

use std::collections::HashMap;

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use planward_core::{end_date_for, Dependency, ProjectId, Task, TaskId};

use crate::graph::TaskGraph;
use crate::SolveError;

/// A hypothetical change to a single task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskChange {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<i64>,
}

/// How the simulation moved one task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskImpact {
    pub task_id: TaskId,
    pub title: String,
    pub original_start: NaiveDate,
    pub original_end: NaiveDate,
    pub simulated_start: NaiveDate,
    pub simulated_end: NaiveDate,
    /// Positive = delayed, negative = earlier
    pub delta_days: i64,
}

/// Complete result of a what-if simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub project_id: ProjectId,
    pub original_end_date: NaiveDate,
    pub simulated_end_date: NaiveDate,
    /// How many days the project end moved
    pub impact_days: i64,
    /// Tasks whose end date moved, in calculation order
    pub affected_tasks: Vec<TaskImpact>,
    pub total_tasks: usize,
}

/// Simulate `changes` against a project's tasks and edges.
///
/// Changes referencing tasks outside the project are ignored. A task
/// whose change specifies a start date is honored up to the earliest
/// date its predecessors allow; everything else behaves exactly like
/// the persisted cascade walk.
pub fn simulate(
    project_id: ProjectId,
    tasks: &[Task],
    edges: &[Dependency],
    changes: &[TaskChange],
) -> Result<SimulationOutcome, SolveError> {
    if tasks.is_empty() {
        return Err(SolveError::EmptyProject);
    }

    let mut graph = TaskGraph::build(tasks, edges);

    let originals: HashMap<TaskId, (NaiveDate, NaiveDate)> = tasks
        .iter()
        .map(|t| (t.id, (t.start_date, t.end_date())))
        .collect();

    // Apply the hypothetical changes in place.
    let changed_starts: HashMap<TaskId, NaiveDate> = changes
        .iter()
        .filter_map(|c| c.start_date.map(|d| (c.task_id, d)))
        .collect();
    for change in changes {
        let Some(node) = graph.node_mut(change.task_id) else {
            continue;
        };
        if let Some(start) = change.start_date {
            node.start_date = start;
        }
        if let Some(duration) = change.duration_days {
            node.duration_days = duration;
        }
    }

    let order = graph.topological_order()?;

    let mut ends: HashMap<TaskId, NaiveDate> = HashMap::with_capacity(order.len());

    for &id in &order {
        let preds = graph.predecessors_of(id).to_vec();
        let node = graph.node(id).expect("ordered id is a node");
        let duration = node.duration_days;

        let start = if preds.is_empty() {
            node.start_date
        } else {
            let max_pred_end = preds
                .iter()
                .map(|pred| ends[pred])
                .max()
                .expect("non-empty predecessors");
            let earliest = max_pred_end + TimeDelta::days(1);

            match changed_starts.get(&id) {
                // The user asked for this date; honor it unless it
                // violates a predecessor.
                Some(&requested) => requested.max(earliest),
                None => node.start_date.max(earliest),
            }
        };

        let end = end_date_for(start, duration);
        ends.insert(id, end);
        graph.node_mut(id).expect("ordered id is a node").start_date = start;
    }

    let original_end_date = originals
        .values()
        .map(|&(_, end)| end)
        .max()
        .expect("at least one task");
    let simulated_end_date = ends.values().copied().max().expect("at least one task");

    let mut affected_tasks = Vec::new();
    for &id in &order {
        let (original_start, original_end) = originals[&id];
        let node = graph.node(id).expect("ordered id is a node");
        let simulated_end = ends[&id];
        let delta_days = (simulated_end - original_end).num_days();

        if delta_days != 0 {
            affected_tasks.push(TaskImpact {
                task_id: id,
                title: node.title.clone(),
                original_start,
                original_end,
                simulated_start: node.start_date,
                simulated_end,
                delta_days,
            });
        }
    }

    Ok(SimulationOutcome {
        project_id,
        original_end_date,
        simulated_end_date,
        impact_days: (simulated_end_date - original_end_date).num_days(),
        affected_tasks,
        total_tasks: tasks.len(),
    })
}
