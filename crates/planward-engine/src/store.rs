//! Storage seam
//!
//! The relational store is the single source of truth; this module
//! defines the slice of it the engine needs, plus an in-memory
//! reference implementation backing the worker tests and any host
//! that does not bring its own persistence.
//!
//! Two contract points matter to the rest of the engine:
//! - deleting a task removes every edge touching it, and deleting a
//!   project cascades to its tasks and their edges
//! - `bulk_update_start_dates` stamps `updated_at` but never touches
//!   `version`: cascade reconciliation is not a user-intent mutation

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use planward_core::{Dependency, EngineError, Project, ProjectId, Task, TaskId};
use planward_solver::DateUpdate;

/// Persistence operations required by the engine.
#[async_trait]
pub trait Store: Send + Sync {
    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------
    async fn insert_project(&self, project: Project) -> Result<Project, EngineError>;
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, EngineError>;
    /// Projects, optionally restricted to one owner, ordered by
    /// creation time.
    async fn list_projects(&self, owner_id: Option<&str>) -> Result<Vec<Project>, EngineError>;
    async fn update_project(&self, project: Project) -> Result<Project, EngineError>;
    /// Returns false when the project did not exist. Cascades to the
    /// project's tasks and their edges.
    async fn delete_project(&self, id: ProjectId) -> Result<bool, EngineError>;

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------
    async fn insert_task(&self, task: Task) -> Result<Task, EngineError>;
    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, EngineError>;
    /// All tasks in a project, ordered by creation time.
    async fn list_tasks(&self, project_id: ProjectId) -> Result<Vec<Task>, EngineError>;
    async fn update_task(&self, task: Task) -> Result<Task, EngineError>;
    /// Returns false when the task did not exist. Removes every edge
    /// touching the task.
    async fn delete_task(&self, id: TaskId) -> Result<bool, EngineError>;

    // ------------------------------------------------------------------
    // Dependency edges
    // ------------------------------------------------------------------
    async fn insert_edge(&self, edge: Dependency) -> Result<Dependency, EngineError>;
    async fn get_edge(
        &self,
        predecessor_id: TaskId,
        successor_id: TaskId,
    ) -> Result<Option<Dependency>, EngineError>;
    /// All edges between tasks of a project.
    async fn list_edges(&self, project_id: ProjectId) -> Result<Vec<Dependency>, EngineError>;
    async fn delete_edge(
        &self,
        predecessor_id: TaskId,
        successor_id: TaskId,
    ) -> Result<bool, EngineError>;
    /// Successor ids of edges where `task_id` is the predecessor.
    async fn direct_successors(&self, task_id: TaskId) -> Result<Vec<TaskId>, EngineError>;

    // ------------------------------------------------------------------
    // Cascade writes
    // ------------------------------------------------------------------
    /// Apply recalculated start dates in one atomic batch, stamping
    /// `updated_at`. Rows deleted since the recalc read are skipped.
    /// Never bumps `version`.
    async fn bulk_update_start_dates(&self, updates: &[DateUpdate])
        -> Result<usize, EngineError>;
}

/// In-memory `Store` over plain maps behind a `parking_lot` lock.
///
/// Locks are held only across non-suspending map work, never across
/// an await point.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    projects: HashMap<ProjectId, Project>,
    tasks: HashMap<TaskId, Task>,
    edges: HashMap<(TaskId, TaskId), Dependency>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn remove_edges_touching(&mut self, task_id: TaskId) {
        self.edges
            .retain(|&(pred, succ), _| pred != task_id && succ != task_id);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_project(&self, project: Project) -> Result<Project, EngineError> {
        self.inner
            .write()
            .projects
            .insert(project.id, project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, EngineError> {
        Ok(self.inner.read().projects.get(&id).cloned())
    }

    async fn list_projects(&self, owner_id: Option<&str>) -> Result<Vec<Project>, EngineError> {
        let inner = self.inner.read();
        let mut projects: Vec<Project> = inner
            .projects
            .values()
            .filter(|p| owner_id.map_or(true, |owner| p.owner_id == owner))
            .cloned()
            .collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(projects)
    }

    async fn update_project(&self, project: Project) -> Result<Project, EngineError> {
        let mut inner = self.inner.write();
        if !inner.projects.contains_key(&project.id) {
            return Err(EngineError::NotFound(format!("project {}", project.id)));
        }
        inner.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn delete_project(&self, id: ProjectId) -> Result<bool, EngineError> {
        let mut inner = self.inner.write();
        if inner.projects.remove(&id).is_none() {
            return Ok(false);
        }
        let task_ids: Vec<TaskId> = inner
            .tasks
            .values()
            .filter(|t| t.project_id == id)
            .map(|t| t.id)
            .collect();
        for task_id in task_ids {
            inner.tasks.remove(&task_id);
            inner.remove_edges_touching(task_id);
        }
        Ok(true)
    }

    async fn insert_task(&self, task: Task) -> Result<Task, EngineError> {
        self.inner.write().tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, EngineError> {
        Ok(self.inner.read().tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, project_id: ProjectId) -> Result<Vec<Task>, EngineError> {
        let inner = self.inner.read();
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn update_task(&self, task: Task) -> Result<Task, EngineError> {
        let mut inner = self.inner.write();
        if !inner.tasks.contains_key(&task.id) {
            return Err(EngineError::NotFound(format!("task {}", task.id)));
        }
        inner.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool, EngineError> {
        let mut inner = self.inner.write();
        if inner.tasks.remove(&id).is_none() {
            return Ok(false);
        }
        inner.remove_edges_touching(id);
        Ok(true)
    }

    async fn insert_edge(&self, edge: Dependency) -> Result<Dependency, EngineError> {
        self.inner.write().edges.insert(edge.key(), edge.clone());
        Ok(edge)
    }

    async fn get_edge(
        &self,
        predecessor_id: TaskId,
        successor_id: TaskId,
    ) -> Result<Option<Dependency>, EngineError> {
        Ok(self
            .inner
            .read()
            .edges
            .get(&(predecessor_id, successor_id))
            .cloned())
    }

    async fn list_edges(&self, project_id: ProjectId) -> Result<Vec<Dependency>, EngineError> {
        let inner = self.inner.read();
        let mut edges: Vec<Dependency> = inner
            .edges
            .values()
            .filter(|e| {
                inner
                    .tasks
                    .get(&e.predecessor_id)
                    .is_some_and(|t| t.project_id == project_id)
            })
            .cloned()
            .collect();
        edges.sort_by_key(Dependency::key);
        Ok(edges)
    }

    async fn delete_edge(
        &self,
        predecessor_id: TaskId,
        successor_id: TaskId,
    ) -> Result<bool, EngineError> {
        Ok(self
            .inner
            .write()
            .edges
            .remove(&(predecessor_id, successor_id))
            .is_some())
    }

    async fn direct_successors(&self, task_id: TaskId) -> Result<Vec<TaskId>, EngineError> {
        let inner = self.inner.read();
        let mut successors: Vec<TaskId> = inner
            .edges
            .keys()
            .filter(|&&(pred, _)| pred == task_id)
            .map(|&(_, succ)| succ)
            .collect();
        successors.sort_unstable();
        Ok(successors)
    }

    async fn bulk_update_start_dates(
        &self,
        updates: &[DateUpdate],
    ) -> Result<usize, EngineError> {
        let mut inner = self.inner.write();
        let now = Utc::now();
        let mut written = 0;
        for update in updates {
            if let Some(task) = inner.tasks.get_mut(&update.task_id) {
                task.start_date = update.start_date;
                task.updated_at = now;
                written += 1;
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use planward_core::VersionToken;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn deleting_a_task_removes_its_edges() {
        let store = MemoryStore::new();
        let project = store
            .insert_project(Project::new("p", "owner"))
            .await
            .unwrap();
        let a = store
            .insert_task(Task::new(project.id, "a", date(2026, 1, 1)))
            .await
            .unwrap();
        let b = store
            .insert_task(Task::new(project.id, "b", date(2026, 1, 1)))
            .await
            .unwrap();
        store
            .insert_edge(Dependency::new(a.id, b.id))
            .await
            .unwrap();

        assert!(store.delete_task(a.id).await.unwrap());
        assert_eq!(store.get_edge(a.id, b.id).await.unwrap(), None);
        assert!(store.get_task(b.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_a_project_cascades() {
        let store = MemoryStore::new();
        let project = store
            .insert_project(Project::new("p", "owner"))
            .await
            .unwrap();
        let a = store
            .insert_task(Task::new(project.id, "a", date(2026, 1, 1)))
            .await
            .unwrap();
        let b = store
            .insert_task(Task::new(project.id, "b", date(2026, 1, 1)))
            .await
            .unwrap();
        store
            .insert_edge(Dependency::new(a.id, b.id))
            .await
            .unwrap();

        assert!(store.delete_project(project.id).await.unwrap());
        assert!(store.get_task(a.id).await.unwrap().is_none());
        assert!(store.get_task(b.id).await.unwrap().is_none());
        assert_eq!(store.get_edge(a.id, b.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn bulk_update_keeps_the_version_token() {
        let store = MemoryStore::new();
        let project = store
            .insert_project(Project::new("p", "owner"))
            .await
            .unwrap();
        let task = store
            .insert_task(Task::new(project.id, "a", date(2026, 1, 1)))
            .await
            .unwrap();
        let token_before: VersionToken = task.version;

        let written = store
            .bulk_update_start_dates(&[DateUpdate {
                task_id: task.id,
                start_date: date(2026, 2, 1),
            }])
            .await
            .unwrap();

        assert_eq!(written, 1);
        let reread = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(reread.start_date, date(2026, 2, 1));
        assert_eq!(reread.version, token_before);
    }

    #[tokio::test]
    async fn bulk_update_skips_deleted_rows() {
        let store = MemoryStore::new();
        let project = store
            .insert_project(Project::new("p", "owner"))
            .await
            .unwrap();
        let task = store
            .insert_task(Task::new(project.id, "a", date(2026, 1, 1)))
            .await
            .unwrap();
        store.delete_task(task.id).await.unwrap();

        let written = store
            .bulk_update_start_dates(&[DateUpdate {
                task_id: task.id,
                start_date: date(2026, 2, 1),
            }])
            .await
            .unwrap();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn list_projects_filters_by_owner() {
        let store = MemoryStore::new();
        store
            .insert_project(Project::new("mine", "alice"))
            .await
            .unwrap();
        store
            .insert_project(Project::new("theirs", "bob"))
            .await
            .unwrap();

        let mine = store.list_projects(Some("alice")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "mine");
        assert_eq!(store.list_projects(None).await.unwrap().len(), 2);
    }
}
