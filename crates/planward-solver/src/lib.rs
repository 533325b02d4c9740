//! # planward-solver
//!
//! Pure scheduling algorithms over a project's tasks and precedence
//! edges. Nothing in this crate performs I/O or suspends; the engine
//! crate feeds it rows read from storage and persists whatever it
//! returns.
//!
//! This crate provides:
//! - Dependency graph construction, cycle detection, topological
//!   ordering and descendant enumeration
//! - Critical Path Method analysis (ES/EF/LS/LF, slack, critical set)
//! - Slack-preserving forward-pass date propagation
//! - What-if simulation on cloned in-memory state
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use planward_core::{Dependency, Project, Task};
//! use planward_solver::cpm;
//!
//! let project = Project::new("Test", "owner");
//! let start = NaiveDate::from_ymd_opt(2025, 12, 19).unwrap();
//! let a = Task::new(project.id, "a", start).duration_days(3);
//! let b = Task::new(project.id, "b", start).duration_days(2);
//! let edge = Dependency::new(a.id, b.id);
//!
//! let report = cpm::analyze(&[a.clone(), b], &[edge]).unwrap();
//! assert!(report.critical_task_ids.contains(&a.id));
//! ```

pub mod cpm;
pub mod graph;
pub mod propagate;
pub mod simulate;

pub use cpm::{CpmReport, TaskCpm};
pub use graph::{CycleError, TaskGraph, TaskNode};
pub use propagate::DateUpdate;
pub use simulate::{SimulationOutcome, TaskChange, TaskImpact};

use planward_core::TaskId;

/// Errors from the whole-project analyses (CPM, simulation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    /// The project has no tasks to analyze
    EmptyProject,
    /// The edge set is not a DAG
    Cycle(CycleError),
}

impl std::fmt::Display for SolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveError::EmptyProject => write!(f, "cannot analyze a project with no tasks"),
            SolveError::Cycle(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SolveError {}

impl From<CycleError> for SolveError {
    fn from(e: CycleError) -> Self {
        SolveError::Cycle(e)
    }
}

impl SolveError {
    /// Task ids involved when the error is a cycle.
    pub fn cycle_tasks(&self) -> &[TaskId] {
        match self {
            SolveError::Cycle(e) => &e.tasks,
            SolveError::EmptyProject => &[],
        }
    }
}
