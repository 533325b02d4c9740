//! Slack-preserving date propagation
//!
//! The cascade walk behind every schedule mutation. Unlike a pure
//! CPM forward sweep, a task that already sits comfortably after all
//! of its predecessors keeps its user-anchored date; only constraint
//! violations push dates forward:
//!
//! `successor.start >= max(predecessor.end) + 1`
//!
//! Anchors — tasks with no predecessor inside the graph being walked
//! — are never rewritten; their dates are user-controlled input.

use std::collections::HashMap;

use chrono::{NaiveDate, TimeDelta};
use planward_core::{end_date_for, TaskId};

use crate::graph::{CycleError, TaskGraph};

/// A task whose start date moved during propagation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateUpdate {
    pub task_id: TaskId,
    pub start_date: NaiveDate,
}

/// Topologically order `graph` and walk it, pushing start dates
/// forward where a precedence constraint is violated.
///
/// Node start dates are updated in place so downstream tasks see the
/// pushed values. Returns only the tasks whose start actually moved
/// relative to the input graph.
pub fn propagate(graph: &mut TaskGraph) -> Result<Vec<DateUpdate>, CycleError> {
    let order = graph.topological_order()?;
    Ok(propagate_in_order(graph, &order))
}

/// The walk itself, for callers that already hold a topological order.
pub fn propagate_in_order(graph: &mut TaskGraph, order: &[TaskId]) -> Vec<DateUpdate> {
    let mut ends: HashMap<TaskId, NaiveDate> = HashMap::with_capacity(order.len());
    let mut updates = Vec::new();

    for &id in order {
        let preds = graph.predecessors_of(id).to_vec();
        let node = graph.node(id).expect("ordered id is a node");
        let duration = node.duration_days;
        let current_start = node.start_date;

        if preds.is_empty() {
            // Anchor: keep the user-set date, just record the end for
            // successors.
            ends.insert(id, end_date_for(current_start, duration));
            continue;
        }

        let max_pred_end = preds
            .iter()
            .map(|pred| ends[pred])
            .max()
            .expect("non-empty predecessors");
        let earliest_valid_start = max_pred_end + TimeDelta::days(1);

        // Push only on violation; later dates are user slack.
        let new_start = if current_start < earliest_valid_start {
            earliest_valid_start
        } else {
            current_start
        };

        ends.insert(id, end_date_for(new_start, duration));

        if new_start != current_start {
            graph
                .node_mut(id)
                .expect("ordered id is a node")
                .start_date = new_start;
            updates.push(DateUpdate {
                task_id: id,
                start_date: new_start,
            });
        }
    }

    updates
}
