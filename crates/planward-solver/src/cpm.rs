//! Critical Path Method analysis
//!
//! Textbook CPM over calendar dates instead of day offsets:
//!
//! 1. Forward pass: Earliest Start (ES) and Earliest Finish (EF)
//! 2. Backward pass: Latest Start (LS) and Latest Finish (LF)
//! 3. Slack = LS - ES in days; critical tasks have zero slack
//!
//! Anchors (tasks without predecessors) seed the forward pass with
//! their stored start dates, so slack is measured against the
//! schedule the user actually has, not an abstract day zero.

use std::collections::HashMap;

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use planward_core::{end_date_for, Dependency, Task, TaskId};

use crate::graph::TaskGraph;
use crate::SolveError;

/// CPM figures for a single task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskCpm {
    pub task_id: TaskId,
    pub title: String,
    pub duration_days: i64,
    pub earliest_start: NaiveDate,
    pub earliest_finish: NaiveDate,
    pub latest_start: NaiveDate,
    pub latest_finish: NaiveDate,
    /// Days this task can slip without moving the project end
    pub total_slack: i64,
    pub is_critical: bool,
}

/// Complete CPM analysis for a project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CpmReport {
    /// Latest earliest-finish across all tasks
    pub project_end_date: NaiveDate,
    /// One record per task, in calculation order
    pub tasks: Vec<TaskCpm>,
    pub critical_task_ids: Vec<TaskId>,
}

/// Run the forward and backward passes over a project's tasks.
pub fn analyze(tasks: &[Task], edges: &[Dependency]) -> Result<CpmReport, SolveError> {
    if tasks.is_empty() {
        return Err(SolveError::EmptyProject);
    }

    let graph = TaskGraph::build(tasks, edges);
    let order = graph.topological_order()?;

    let mut es: HashMap<TaskId, NaiveDate> = HashMap::with_capacity(order.len());
    let mut ef: HashMap<TaskId, NaiveDate> = HashMap::with_capacity(order.len());

    // Forward pass: ES from predecessors, EF from duration.
    for &id in &order {
        let node = graph.node(id).expect("ordered id is a node");

        let earliest_start = graph
            .predecessors_of(id)
            .iter()
            .map(|pred| ef[pred] + TimeDelta::days(1))
            .max()
            .unwrap_or(node.start_date);

        es.insert(id, earliest_start);
        ef.insert(id, end_date_for(earliest_start, node.duration_days));
    }

    let project_end_date = ef.values().copied().max().expect("at least one task");

    let mut ls: HashMap<TaskId, NaiveDate> = HashMap::with_capacity(order.len());
    let mut lf: HashMap<TaskId, NaiveDate> = HashMap::with_capacity(order.len());

    // Backward pass: LF from successors, LS from duration.
    for &id in order.iter().rev() {
        let node = graph.node(id).expect("ordered id is a node");

        let latest_finish = graph
            .successors_of(id)
            .iter()
            .map(|succ| ls[succ] - TimeDelta::days(1))
            .min()
            .unwrap_or(project_end_date);

        let latest_start = if node.duration_days == 0 {
            latest_finish
        } else {
            latest_finish - TimeDelta::days(node.duration_days - 1)
        };

        lf.insert(id, latest_finish);
        ls.insert(id, latest_start);
    }

    let mut report_tasks = Vec::with_capacity(order.len());
    let mut critical_task_ids = Vec::new();

    for &id in &order {
        let node = graph.node(id).expect("ordered id is a node");
        let total_slack = (ls[&id] - es[&id]).num_days();
        let is_critical = total_slack == 0;
        if is_critical {
            critical_task_ids.push(id);
        }

        report_tasks.push(TaskCpm {
            task_id: id,
            title: node.title.clone(),
            duration_days: node.duration_days,
            earliest_start: es[&id],
            earliest_finish: ef[&id],
            latest_start: ls[&id],
            latest_finish: lf[&id],
            total_slack,
            is_critical,
        });
    }

    Ok(CpmReport {
        project_end_date,
        tasks: report_tasks,
        critical_task_ids,
    })
}
