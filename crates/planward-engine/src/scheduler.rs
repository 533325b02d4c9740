//! Entity mutation orchestration
//!
//! Every mutation that can change the schedule follows the same
//! shape: validate, persist, bump the affected root's version token,
//! then enqueue one `(rootTaskId, versionToken)` cascade job per
//! root. The read-side analyses (simulation, CPM, status) live here
//! too, so a hosting HTTP layer maps one endpoint to one method.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, info, warn};

use planward_core::{
    Dependency, EngineError, Project, ProjectId, ProjectStatusReport, Task, TaskId, VersionToken,
};
use planward_solver::{
    cpm, simulate, CpmReport, SimulationOutcome, SolveError, TaskChange, TaskGraph,
};

use crate::queue::{JobQueue, RecalcJob};
use crate::store::Store;

/// Request body for creating a project.
#[derive(Clone, Debug, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    pub owner_id: String,
}

/// Partial update for a project; unset fields are left alone.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<NaiveDate>,
}

/// Request body for creating a task.
#[derive(Clone, Debug, Deserialize)]
pub struct NewTask {
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to 1; 0 denotes a milestone
    #[serde(default)]
    pub duration_days: Option<i64>,
    /// Defaults to today
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

/// Partial update for a task; unset fields are left alone.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_days: Option<i64>,
    pub start_date: Option<NaiveDate>,
}

/// The engine's mutation and analysis surface.
///
/// Handlers and workers share no in-process state beyond the store
/// and the queue; two concurrent edits to the same task serialize at
/// the store row, and whichever commits later owns the current
/// version token.
pub struct Scheduler {
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
    /// Serializes edge admission per project: the cycle check and the
    /// edge write must see the same committed graph.
    admission_locks: DashMap<ProjectId, Arc<tokio::sync::Mutex<()>>>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            store,
            queue,
            admission_locks: DashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    pub async fn create_project(&self, input: NewProject) -> Result<Project, EngineError> {
        let mut project = Project::new(input.name, input.owner_id);
        project.description = input.description;
        project.deadline = input.deadline;
        let project = self.store.insert_project(project).await?;
        info!(project = %project.id, "project created");
        Ok(project)
    }

    pub async fn get_project(&self, id: ProjectId) -> Result<Project, EngineError> {
        self.store
            .get_project(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("project {id}")))
    }

    pub async fn list_projects(&self, owner_id: Option<&str>) -> Result<Vec<Project>, EngineError> {
        self.store.list_projects(owner_id).await
    }

    pub async fn update_project(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> Result<Project, EngineError> {
        let mut project = self.get_project(id).await?;
        if let Some(name) = patch.name {
            project.name = name;
        }
        if let Some(description) = patch.description {
            project.description = Some(description);
        }
        if let Some(deadline) = patch.deadline {
            project.deadline = Some(deadline);
        }
        project.updated_at = Utc::now();
        self.store.update_project(project).await
    }

    /// Delete a project and, transitively, its tasks and edges.
    pub async fn delete_project(&self, id: ProjectId) -> Result<(), EngineError> {
        if !self.store.delete_project(id).await? {
            return Err(EngineError::NotFound(format!("project {id}")));
        }
        self.admission_locks.remove(&id);
        info!(project = %id, "project deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Create a task. No cascade is triggered: a fresh task has no
    /// edges yet.
    pub async fn create_task(&self, input: NewTask) -> Result<Task, EngineError> {
        if self.store.get_project(input.project_id).await?.is_none() {
            return Err(EngineError::NotFound(format!(
                "project {}",
                input.project_id
            )));
        }
        let duration_days = input.duration_days.unwrap_or(1);
        validate_duration(duration_days)?;

        let start_date = input.start_date.unwrap_or_else(|| Utc::now().date_naive());
        let mut task = Task::new(input.project_id, input.title, start_date)
            .duration_days(duration_days);
        task.description = input.description;

        let task = self.store.insert_task(task).await?;
        debug!(task = %task.id, project = %task.project_id, "task created");
        Ok(task)
    }

    pub async fn get_task(&self, id: TaskId) -> Result<Task, EngineError> {
        self.store
            .get_task(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("task {id}")))
    }

    pub async fn list_tasks(&self, project_id: ProjectId) -> Result<Vec<Task>, EngineError> {
        self.store.list_tasks(project_id).await
    }

    /// Update a task, generate a new version token, and enqueue a
    /// cascade from it.
    pub async fn update_task(&self, id: TaskId, patch: TaskPatch) -> Result<Task, EngineError> {
        let mut task = self.get_task(id).await?;

        if let Some(duration_days) = patch.duration_days {
            validate_duration(duration_days)?;
            task.duration_days = duration_days;
        }
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(start_date) = patch.start_date {
            task.start_date = start_date;
        }

        let token = VersionToken::fresh();
        task.version = token;
        task.updated_at = Utc::now();
        let task = self.store.update_task(task).await?;

        self.enqueue_recalc(id, token).await?;
        Ok(task)
    }

    /// Delete a task. Its former direct successors may now start
    /// earlier, so each gets a fresh token and its own cascade.
    pub async fn delete_task(&self, id: TaskId) -> Result<(), EngineError> {
        // Snapshot successors before the delete removes their edges.
        let successors = self.store.direct_successors(id).await?;
        if !self.store.delete_task(id).await? {
            return Err(EngineError::NotFound(format!("task {id}")));
        }
        info!(task = %id, successors = successors.len(), "task deleted");

        for successor_id in successors {
            self.bump_and_enqueue(successor_id).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dependency edges
    // ------------------------------------------------------------------

    /// Admit and create a precedence edge, returning it together
    /// with the successor's fresh version token.
    ///
    /// Checks, in order: both endpoints exist, same project, no
    /// self-loop, not a duplicate, and no cycle over the committed
    /// graph plus the proposed edge. The check and the write run
    /// under a per-project lock.
    pub async fn create_dependency(
        &self,
        predecessor_id: TaskId,
        successor_id: TaskId,
    ) -> Result<(Dependency, VersionToken), EngineError> {
        let predecessor = self
            .store
            .get_task(predecessor_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("predecessor task {predecessor_id}")))?;
        let successor = self
            .store
            .get_task(successor_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("successor task {successor_id}")))?;

        if predecessor.project_id != successor.project_id {
            return Err(EngineError::CrossProjectDependency);
        }
        if predecessor_id == successor_id {
            return Err(EngineError::SelfDependency);
        }

        let lock = self.admission_lock(predecessor.project_id);
        let _guard = lock.lock().await;

        if self
            .store
            .get_edge(predecessor_id, successor_id)
            .await?
            .is_some()
        {
            return Err(EngineError::DuplicateDependency);
        }

        let tasks = self.store.list_tasks(predecessor.project_id).await?;
        let edges = self.store.list_edges(predecessor.project_id).await?;
        let graph = TaskGraph::build(&tasks, &edges);
        if graph.would_create_cycle(predecessor_id, successor_id) {
            debug!(
                predecessor = %predecessor_id,
                successor = %successor_id,
                "edge rejected: would create a cycle"
            );
            return Err(EngineError::CycleDetected);
        }

        let edge = self
            .store
            .insert_edge(Dependency::new(predecessor_id, successor_id))
            .await?;

        // The new edge may push the successor later.
        let token = self.bump_and_enqueue(successor_id).await?.ok_or_else(|| {
            EngineError::Internal(format!("successor task {successor_id} vanished during admission"))
        })?;
        Ok((edge, token))
    }

    pub async fn get_dependency(
        &self,
        predecessor_id: TaskId,
        successor_id: TaskId,
    ) -> Result<Dependency, EngineError> {
        self.store
            .get_edge(predecessor_id, successor_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("dependency".into()))
    }

    pub async fn list_dependencies(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Dependency>, EngineError> {
        self.store.list_edges(project_id).await
    }

    /// Delete an edge. The successor may now start earlier, which is
    /// why cascades never unconditionally push forward.
    pub async fn delete_dependency(
        &self,
        predecessor_id: TaskId,
        successor_id: TaskId,
    ) -> Result<(), EngineError> {
        if !self.store.delete_edge(predecessor_id, successor_id).await? {
            return Err(EngineError::NotFound("dependency".into()));
        }
        self.bump_and_enqueue(successor_id).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read-only analyses
    // ------------------------------------------------------------------

    /// What-if simulation; persisted state is untouched.
    pub async fn simulate(
        &self,
        project_id: ProjectId,
        changes: &[TaskChange],
    ) -> Result<SimulationOutcome, EngineError> {
        self.get_project(project_id).await?;
        let tasks = self.store.list_tasks(project_id).await?;
        let edges = self.store.list_edges(project_id).await?;

        for change in changes {
            if !tasks.iter().any(|t| t.id == change.task_id) {
                warn!(task = %change.task_id, "simulation change for unknown task, skipping");
            }
        }

        simulate::simulate(project_id, &tasks, &edges, changes).map_err(map_solve_error)
    }

    /// Full CPM report for a project.
    pub async fn critical_path(&self, project_id: ProjectId) -> Result<CpmReport, EngineError> {
        self.get_project(project_id).await?;
        let tasks = self.store.list_tasks(project_id).await?;
        let edges = self.store.list_edges(project_id).await?;
        cpm::analyze(&tasks, &edges).map_err(map_solve_error)
    }

    /// Projected end date vs. deadline.
    pub async fn project_status(
        &self,
        project_id: ProjectId,
    ) -> Result<ProjectStatusReport, EngineError> {
        let project = self.get_project(project_id).await?;
        let tasks = self.store.list_tasks(project_id).await?;
        Ok(ProjectStatusReport::compute(&project, &tasks))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn admission_lock(&self, project_id: ProjectId) -> Arc<tokio::sync::Mutex<()>> {
        self.admission_locks
            .entry(project_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Give `task_id` a fresh version token and enqueue a cascade
    /// carrying it. A task deleted in the meantime is skipped and
    /// reported as `None`.
    async fn bump_and_enqueue(
        &self,
        task_id: TaskId,
    ) -> Result<Option<VersionToken>, EngineError> {
        let Some(mut task) = self.store.get_task(task_id).await? else {
            return Ok(None);
        };
        let token = VersionToken::fresh();
        task.version = token;
        task.updated_at = Utc::now();
        self.store.update_task(task).await?;
        self.enqueue_recalc(task_id, token).await?;
        Ok(Some(token))
    }

    async fn enqueue_recalc(
        &self,
        task_id: TaskId,
        token: VersionToken,
    ) -> Result<(), EngineError> {
        debug!(task = %task_id, %token, "enqueuing cascade job");
        self.queue.enqueue(RecalcJob::new(task_id, token)).await
    }
}

fn validate_duration(duration_days: i64) -> Result<(), EngineError> {
    if duration_days < 0 {
        return Err(EngineError::Validation(
            "duration_days must be >= 0".into(),
        ));
    }
    Ok(())
}

fn map_solve_error(err: SolveError) -> EngineError {
    match err {
        SolveError::EmptyProject => EngineError::Validation("project has no tasks".into()),
        SolveError::Cycle(_) => EngineError::CycleDetected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn scheduler() -> (Scheduler, Arc<MemoryQueue>) {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        (Scheduler::new(store, queue.clone()), queue)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn project_with(scheduler: &Scheduler) -> Project {
        scheduler
            .create_project(NewProject {
                name: "p".into(),
                description: None,
                deadline: None,
                owner_id: "owner".into(),
            })
            .await
            .unwrap()
    }

    fn new_task(project_id: ProjectId, title: &str) -> NewTask {
        NewTask {
            project_id,
            title: title.into(),
            description: None,
            duration_days: Some(2),
            start_date: Some(date(2026, 1, 5)),
        }
    }

    #[tokio::test]
    async fn task_start_defaults_to_today() {
        let (scheduler, _) = scheduler();
        let project = project_with(&scheduler).await;
        let task = scheduler
            .create_task(NewTask {
                project_id: project.id,
                title: "t".into(),
                description: None,
                duration_days: None,
                start_date: None,
            })
            .await
            .unwrap();
        assert_eq!(task.start_date, Utc::now().date_naive());
        assert_eq!(task.duration_days, 1);
    }

    #[tokio::test]
    async fn negative_duration_is_rejected() {
        let (scheduler, _) = scheduler();
        let project = project_with(&scheduler).await;
        let err = scheduler
            .create_task(NewTask {
                duration_days: Some(-1),
                ..new_task(project.id, "t")
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[tokio::test]
    async fn create_task_does_not_enqueue() {
        let (scheduler, queue) = scheduler();
        let project = project_with(&scheduler).await;
        scheduler
            .create_task(new_task(project.id, "t"))
            .await
            .unwrap();
        assert!(queue.try_dequeue().is_none());
    }

    #[tokio::test]
    async fn update_task_enqueues_the_new_token() {
        let (scheduler, queue) = scheduler();
        let project = project_with(&scheduler).await;
        let task = scheduler
            .create_task(new_task(project.id, "t"))
            .await
            .unwrap();

        let updated = scheduler
            .update_task(
                task.id,
                TaskPatch {
                    duration_days: Some(7),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();

        assert_ne!(updated.version, task.version);
        let job = queue.try_dequeue().unwrap();
        assert_eq!(job.task_id, task.id);
        assert_eq!(job.version_token, updated.version);
    }

    #[tokio::test]
    async fn project_patch_leaves_unset_fields_alone() {
        let (scheduler, _) = scheduler();
        let project = project_with(&scheduler).await;

        let updated = scheduler
            .update_project(
                project.id,
                ProjectPatch {
                    deadline: Some(date(2026, 6, 1)),
                    ..ProjectPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, project.name);
        assert_eq!(updated.deadline, Some(date(2026, 6, 1)));
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let (scheduler, _) = scheduler();
        let err = scheduler
            .create_task(new_task(uuid::Uuid::new_v4(), "t"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
