//! Dependency graph construction and validation
//!
//! Builds an in-memory directed graph from task rows and precedence
//! edges. Edges point from predecessor to successor. The graph is the
//! substrate for every algorithm in this crate: topological ordering
//! (which doubles as cycle detection), descendant enumeration for
//! cascade subgraphs, and the virtual-edge cycle test used by edge
//! admission.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use chrono::NaiveDate;
use planward_core::{Dependency, Task, TaskId};

/// The edge set is not a DAG.
///
/// Carries the tasks left unordered when the topological sort
/// stalled; every cycle is contained in that set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    pub tasks: Vec<TaskId>,
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cycle detected involving tasks: {:?}", self.tasks)
    }
}

impl std::error::Error for CycleError {}

/// The scheduling-relevant slice of a task row.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub id: TaskId,
    pub title: String,
    pub duration_days: i64,
    pub start_date: NaiveDate,
}

impl From<&Task> for TaskNode {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            duration_days: task.duration_days,
            start_date: task.start_date,
        }
    }
}

const NO_NEIGHBORS: &[TaskId] = &[];

/// Directed task graph with adjacency in both directions.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: HashMap<TaskId, TaskNode>,
    successors: HashMap<TaskId, Vec<TaskId>>,
    predecessors: HashMap<TaskId, Vec<TaskId>>,
}

impl TaskGraph {
    /// Build a graph from task rows and edges.
    ///
    /// Edges whose endpoints are not both present in `tasks` are
    /// ignored, so a caller may pass a subgraph's task set together
    /// with the full project edge list.
    pub fn build(tasks: &[Task], edges: &[Dependency]) -> Self {
        let mut nodes = HashMap::with_capacity(tasks.len());
        let mut successors: HashMap<TaskId, Vec<TaskId>> = HashMap::with_capacity(tasks.len());
        let mut predecessors: HashMap<TaskId, Vec<TaskId>> = HashMap::with_capacity(tasks.len());

        for task in tasks {
            nodes.insert(task.id, TaskNode::from(task));
            successors.insert(task.id, Vec::new());
            predecessors.insert(task.id, Vec::new());
        }

        for edge in edges {
            if !nodes.contains_key(&edge.predecessor_id) || !nodes.contains_key(&edge.successor_id)
            {
                continue;
            }
            successors
                .get_mut(&edge.predecessor_id)
                .expect("endpoint checked above")
                .push(edge.successor_id);
            predecessors
                .get_mut(&edge.successor_id)
                .expect("endpoint checked above")
                .push(edge.predecessor_id);
        }

        Self {
            nodes,
            successors,
            predecessors,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: TaskId) -> Option<&TaskNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: TaskId) -> Option<&mut TaskNode> {
        self.nodes.get_mut(&id)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn predecessors_of(&self, id: TaskId) -> &[TaskId] {
        self.predecessors
            .get(&id)
            .map_or(NO_NEIGHBORS, Vec::as_slice)
    }

    pub fn successors_of(&self, id: TaskId) -> &[TaskId] {
        self.successors.get(&id).map_or(NO_NEIGHBORS, Vec::as_slice)
    }

    /// Kahn's algorithm.
    ///
    /// The ready set is drained in ascending task-id order, so the
    /// result is deterministic for a given graph.
    pub fn topological_order(&self) -> Result<Vec<TaskId>, CycleError> {
        let mut in_degree: HashMap<TaskId, usize> = self
            .nodes
            .keys()
            .map(|&id| (id, self.predecessors_of(id).len()))
            .collect();

        let mut ready: BinaryHeap<Reverse<TaskId>> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| Reverse(id))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for &succ in self.successors_of(id) {
                let deg = in_degree.get_mut(&succ).expect("successor is a node");
                *deg -= 1;
                if *deg == 0 {
                    ready.push(Reverse(succ));
                }
            }
        }

        if order.len() != self.nodes.len() {
            let ordered: HashSet<TaskId> = order.into_iter().collect();
            let mut remaining: Vec<TaskId> = self
                .nodes
                .keys()
                .filter(|id| !ordered.contains(id))
                .copied()
                .collect();
            remaining.sort_unstable();
            return Err(CycleError { tasks: remaining });
        }

        Ok(order)
    }

    /// All nodes reachable from `root` via forward edges, excluding
    /// `root` itself. Empty when `root` is not in the graph.
    pub fn descendants(&self, root: TaskId) -> HashSet<TaskId> {
        let mut seen = HashSet::new();
        if !self.contains(root) {
            return seen;
        }

        let mut queue: VecDeque<TaskId> = self.successors_of(root).iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            if seen.insert(id) {
                queue.extend(self.successors_of(id).iter().copied());
            }
        }
        seen.remove(&root);
        seen
    }

    /// Would adding the edge `(predecessor, successor)` close a cycle?
    ///
    /// Equivalent to inserting the edge virtually and re-checking, but
    /// cheaper: the new edge closes a cycle exactly when `predecessor`
    /// is reachable from `successor` (or the edge is a self-loop).
    pub fn would_create_cycle(&self, predecessor: TaskId, successor: TaskId) -> bool {
        predecessor == successor || self.descendants(successor).contains(&predecessor)
    }
}
