//! Project status summary
//!
//! Answers "where does this project currently end, and does that
//! clear the deadline?" from persisted task rows alone. Deadlines
//! are informative: nothing here feeds back into scheduling.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Project, ProjectId, Task};

/// Snapshot of a project's schedule health.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectStatusReport {
    pub project_id: ProjectId,
    /// Latest `end_date` across the project's tasks; `None` when the
    /// project has no tasks yet.
    pub projected_end_date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    pub is_over_deadline: bool,
    /// Calendar days past the deadline (0 when on time or when either
    /// date is missing).
    pub days_over: i64,
    pub task_count: usize,
}

impl ProjectStatusReport {
    /// Compute the report from a project and its persisted tasks.
    pub fn compute(project: &Project, tasks: &[Task]) -> Self {
        let projected_end_date = tasks.iter().map(Task::end_date).max();

        let (is_over_deadline, days_over) = match (projected_end_date, project.deadline) {
            (Some(projected), Some(deadline)) if projected > deadline => {
                (true, (projected - deadline).num_days())
            }
            _ => (false, 0),
        };

        Self {
            project_id: project.id,
            projected_end_date,
            deadline: project.deadline,
            is_over_deadline,
            days_over,
            task_count: tasks.len(),
        }
    }
}
