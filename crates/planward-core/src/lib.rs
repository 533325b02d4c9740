//! # planward-core
//!
//! Core domain model and error taxonomy for the planward scheduling
//! engine.
//!
//! This crate provides:
//! - Domain types: `Project`, `Task`, `Dependency`
//! - The `VersionToken` mutation-ordering token
//! - Error types and the wire error envelope
//! - The project status report
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use planward_core::{Project, Task};
//!
//! let project = Project::new("Website relaunch", "user-42");
//! let task = Task::new(project.id, "Design", NaiveDate::from_ymd_opt(2025, 12, 19).unwrap())
//!     .duration_days(3);
//! assert_eq!(task.end_date(), NaiveDate::from_ymd_opt(2025, 12, 21).unwrap());
//! ```

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod status;

pub use status::ProjectStatusReport;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a project
pub type ProjectId = Uuid;

/// Unique identifier for a task
pub type TaskId = Uuid;

/// Opaque per-task token bumped on every user-intent mutation.
///
/// Cascade workers compare the token carried by a job against the
/// current row value and discard the job on mismatch. The token is
/// NOT bumped by cascade reconciliation writes; it orders user
/// mutations only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(Uuid);

impl VersionToken {
    /// Generate a fresh token.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Project
// ============================================================================

/// A container of tasks owned by a user.
///
/// Deleting a project transitively destroys its tasks and their
/// dependency edges. The optional deadline is informative only: it
/// never feeds back into scheduling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new empty project owned by `owner_id`.
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            deadline: None,
            owner_id: owner_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the deadline
    pub fn deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

// ============================================================================
// Task
// ============================================================================

/// A schedulable unit of work belonging to exactly one project.
///
/// `start_date` is the computed or user-anchored day on which work
/// begins. `duration_days` is whole calendar days; 0 denotes a
/// milestone whose start and end coincide.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub duration_days: i64,
    pub start_date: NaiveDate,
    pub version: VersionToken,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task with a one-day duration.
    pub fn new(project_id: ProjectId, title: impl Into<String>, start_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            title: title.into(),
            description: None,
            duration_days: 1,
            start_date,
            version: VersionToken::fresh(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the duration (0 marks a milestone)
    pub fn duration_days(mut self, duration_days: i64) -> Self {
        self.duration_days = duration_days;
        self
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether this task is a milestone (zero duration)
    pub fn is_milestone(&self) -> bool {
        self.duration_days == 0
    }

    /// The inclusive end date.
    ///
    /// A milestone ends on its start day; otherwise the start day
    /// counts, so a 3-day task starting on the 19th ends on the 21st.
    pub fn end_date(&self) -> NaiveDate {
        end_date_for(self.start_date, self.duration_days)
    }
}

/// End date for a `(start, duration)` pair, shared with the solver.
pub fn end_date_for(start_date: NaiveDate, duration_days: i64) -> NaiveDate {
    if duration_days <= 0 {
        start_date
    } else {
        start_date + TimeDelta::days(duration_days - 1)
    }
}

// ============================================================================
// Dependency (precedence edge)
// ============================================================================

/// A directed precedence edge in the task DAG.
///
/// `predecessor_id -> successor_id` means the predecessor must end
/// strictly before the successor begins:
/// `successor.start_date >= predecessor.end_date() + 1`.
///
/// The ordered pair is the composite identity; a pair appears at
/// most once and both endpoints share a project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub predecessor_id: TaskId,
    pub successor_id: TaskId,
    pub created_at: DateTime<Utc>,
}

impl Dependency {
    pub fn new(predecessor_id: TaskId, successor_id: TaskId) -> Self {
        Self {
            predecessor_id,
            successor_id,
            created_at: Utc::now(),
        }
    }

    /// The composite identity of this edge.
    pub fn key(&self) -> (TaskId, TaskId) {
        (self.predecessor_id, self.successor_id)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Engine error taxonomy.
///
/// Each variant maps onto a stable wire code and HTTP status; see
/// [`EngineError::code`] and [`EngineError::http_status`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Referenced entity absent
    #[error("{0} not found")]
    NotFound(String),

    /// Edge admission would close a cycle
    #[error("adding this dependency would create a cycle")]
    CycleDetected,

    /// The `(predecessor, successor)` pair already exists
    #[error("dependency already exists")]
    DuplicateDependency,

    /// Predecessor equals successor
    #[error("a task cannot depend on itself")]
    SelfDependency,

    /// Edge endpoints belong to different projects
    #[error("cannot create a dependency between tasks in different projects")]
    CrossProjectDependency,

    /// Malformed request
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal cascade failure; logged, never surfaced to clients
    #[error("recalculation failed: {0}")]
    Recalc(String),

    /// Catch-all
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable wire code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::CycleDetected => "cycle_detected",
            EngineError::DuplicateDependency => "duplicate_dependency",
            EngineError::SelfDependency => "self_dependency",
            EngineError::CrossProjectDependency => "cross_project_dependency",
            EngineError::Validation(_) => "validation_error",
            EngineError::Recalc(_) => "recalc_error",
            EngineError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status the hosting layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            EngineError::NotFound(_) => 404,
            EngineError::CycleDetected
            | EngineError::SelfDependency
            | EngineError::CrossProjectDependency => 400,
            EngineError::DuplicateDependency => 409,
            EngineError::Validation(_) => 422,
            EngineError::Recalc(_) | EngineError::Internal(_) => 500,
        }
    }

    /// Structured wire envelope for this error.
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.code().to_string(),
            message: self.to_string(),
            details: None,
        }
    }
}

/// Structured error body returned by the hosting HTTP layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn end_date_counts_start_day() {
        let project = Project::new("p", "owner");
        let task = Task::new(project.id, "Design", date(2025, 12, 19)).duration_days(3);
        assert_eq!(task.end_date(), date(2025, 12, 21));
    }

    #[test]
    fn milestone_ends_on_start_day() {
        let project = Project::new("p", "owner");
        let task = Task::new(project.id, "Launch", date(2025, 12, 22)).duration_days(0);
        assert!(task.is_milestone());
        assert_eq!(task.end_date(), date(2025, 12, 22));
    }

    #[test]
    fn task_defaults_to_one_day() {
        let project = Project::new("p", "owner");
        let task = Task::new(project.id, "Quick", date(2026, 1, 5));
        assert_eq!(task.duration_days, 1);
        assert_eq!(task.end_date(), date(2026, 1, 5));
    }

    #[test]
    fn version_tokens_are_unique() {
        let a = VersionToken::fresh();
        let b = VersionToken::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn dates_serialize_as_iso_calendar_dates() {
        let project = Project::new("p", "owner");
        let task = Task::new(project.id, "Design", date(2025, 12, 19));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["start_date"], serde_json::json!("2025-12-19"));
    }

    #[test]
    fn error_codes_and_statuses() {
        let cases: Vec<(EngineError, &str, u16)> = vec![
            (EngineError::NotFound("task x".into()), "not_found", 404),
            (EngineError::CycleDetected, "cycle_detected", 400),
            (EngineError::DuplicateDependency, "duplicate_dependency", 409),
            (EngineError::SelfDependency, "self_dependency", 400),
            (
                EngineError::CrossProjectDependency,
                "cross_project_dependency",
                400,
            ),
            (EngineError::Validation("bad".into()), "validation_error", 422),
            (EngineError::Recalc("boom".into()), "recalc_error", 500),
            (EngineError::Internal("boom".into()), "internal_error", 500),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.http_status(), status);
        }
    }

    #[test]
    fn envelope_carries_code_and_message() {
        let envelope = EngineError::DuplicateDependency.envelope();
        assert_eq!(envelope.error, "duplicate_dependency");
        assert_eq!(envelope.message, "dependency already exists");
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("details").is_none());
    }
}
