//! Dependency graph over a submitted batch.
//!
//! The DAG is represented with integer indices over the submission list and
//! two parallel arrays: in-degree counts and dependent lists. Readiness is
//! maintained incrementally; nothing is recomputed per completion.

use crate::core::parallel::Task;
use crate::error::AgentXError;
use crate::Result;
use std::collections::HashMap;

/// Incremental dependency tracker for one batch.
#[derive(Debug)]
pub struct DependencyGraph {
    ids: Vec<String>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl DependencyGraph {
    /// Build and validate the graph for a batch.
    ///
    /// Rejects duplicate ids, references to unknown ids, and cycles, all as
    /// [`AgentXError::InvalidConfig`], before any task starts.
    pub fn build(tasks: &[Task]) -> Result<Self> {
        let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(tasks.len());
        for (idx, task) in tasks.iter().enumerate() {
            if index_of.insert(task.id.as_str(), idx).is_some() {
                return Err(AgentXError::invalid_config(format!(
                    "duplicate task id: {}",
                    task.id
                )));
            }
        }

        let mut dependencies = vec![Vec::new(); tasks.len()];
        let mut dependents = vec![Vec::new(); tasks.len()];
        let mut in_degree = vec![0usize; tasks.len()];
        for (idx, task) in tasks.iter().enumerate() {
            for dep in &task.dependencies {
                let dep_idx = *index_of.get(dep.as_str()).ok_or_else(|| {
                    AgentXError::invalid_config(format!(
                        "task {} depends on unknown id: {}",
                        task.id, dep
                    ))
                })?;
                if dep_idx == idx {
                    return Err(AgentXError::invalid_config(format!(
                        "cycle detected: {}\u{2192}{}",
                        task.id, task.id
                    )));
                }
                dependencies[idx].push(dep_idx);
                dependents[dep_idx].push(idx);
                in_degree[idx] += 1;
            }
        }

        let graph = Self {
            ids: tasks.iter().map(|t| t.id.clone()).collect(),
            dependencies,
            dependents,
            in_degree,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Kahn's algorithm over a scratch copy of the in-degrees; any node left
    /// unvisited sits on a cycle, which is then traced for the message.
    fn check_acyclic(&self) -> Result<()> {
        let mut degree = self.in_degree.clone();
        let mut queue: Vec<usize> = (0..degree.len()).filter(|&i| degree[i] == 0).collect();
        let mut visited = 0usize;
        while let Some(idx) = queue.pop() {
            visited += 1;
            for &dep in &self.dependents[idx] {
                degree[dep] -= 1;
                if degree[dep] == 0 {
                    queue.push(dep);
                }
            }
        }
        if visited == degree.len() {
            return Ok(());
        }

        let start = (0..degree.len())
            .find(|&i| degree[i] > 0)
            .expect("unvisited node must exist");
        Err(AgentXError::invalid_config(format!(
            "cycle detected: {}",
            self.trace_cycle(start, &degree)
        )))
    }

    /// Walk unresolved dependency edges from `start` until a node repeats,
    /// then render the cycle as `a→b→a`.
    ///
    /// Every node with positive residual degree has at least one dependency
    /// that is itself unresolved, so the walk stays inside the cyclic
    /// subgraph and must eventually revisit a node.
    fn trace_cycle(&self, start: usize, residual: &[usize]) -> String {
        let mut path = vec![start];
        let mut seen = vec![false; self.ids.len()];
        seen[start] = true;
        let mut current = start;
        loop {
            let next = *self.dependencies[current]
                .iter()
                .find(|&&dep| residual[dep] > 0)
                .expect("unresolved node must have an unresolved dependency");
            if seen[next] {
                let cycle_start = path.iter().position(|&n| n == next).unwrap_or(0);
                let mut names: Vec<&str> = path[cycle_start..]
                    .iter()
                    .map(|&n| self.ids[n].as_str())
                    .collect();
                names.push(&self.ids[next]);
                return names.join("\u{2192}");
            }
            seen[next] = true;
            path.push(next);
            current = next;
        }
    }

    /// Number of tasks in the graph.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Indices with no unresolved dependencies, in submission order.
    pub fn initially_ready(&self) -> Vec<usize> {
        (0..self.in_degree.len())
            .filter(|&i| self.in_degree[i] == 0)
            .collect()
    }

    /// Record a terminal state for `idx` and return the indices that became
    /// ready as a consequence, in submission order.
    pub fn complete(&mut self, idx: usize) -> Vec<usize> {
        let mut newly_ready = Vec::new();
        for pos in 0..self.dependents[idx].len() {
            let dependent = self.dependents[idx][pos];
            self.in_degree[dependent] -= 1;
            if self.in_degree[dependent] == 0 {
                newly_ready.push(dependent);
            }
        }
        newly_ready.sort_unstable();
        newly_ready
    }

    /// Direct dependency indices of a task.
    pub fn dependencies_of(&self, idx: usize) -> &[usize] {
        &self.dependencies[idx]
    }

    /// Task id at an index.
    pub fn id_of(&self, idx: usize) -> &str {
        &self.ids[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        let mut t = Task::new(id, "body");
        t.dependencies = deps.iter().map(|d| d.to_string()).collect();
        t
    }

    #[test]
    fn test_ready_and_completion_flow() {
        let tasks = vec![task("a", &[]), task("b", &["a"]), task("c", &["a", "b"])];
        let mut graph = DependencyGraph::build(&tasks).unwrap();
        assert_eq!(graph.initially_ready(), vec![0]);
        assert_eq!(graph.complete(0), vec![1]);
        assert_eq!(graph.complete(1), vec![2]);
        assert_eq!(graph.complete(2), Vec::<usize>::new());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let tasks = vec![task("a", &[]), task("a", &[])];
        let err = DependencyGraph::build(&tasks).unwrap_err();
        assert!(err.to_string().contains("duplicate task id: a"));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let tasks = vec![task("a", &["ghost"])];
        let err = DependencyGraph::build(&tasks).unwrap_err();
        assert!(err.to_string().contains("unknown id: ghost"));
    }

    #[test]
    fn test_two_node_cycle_message() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"])];
        let err = DependencyGraph::build(&tasks).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cycle detected:"), "got: {}", msg);
        assert!(
            msg.contains("a\u{2192}b\u{2192}a") || msg.contains("b\u{2192}a\u{2192}b"),
            "got: {}",
            msg
        );
    }

    #[test]
    fn test_self_cycle_rejected() {
        let tasks = vec![task("a", &["a"])];
        let err = DependencyGraph::build(&tasks).unwrap_err();
        assert!(err.to_string().contains("cycle detected: a\u{2192}a"));
    }

    #[test]
    fn test_cycle_trace_skips_resolved_side_dependency() {
        // "a" lists an acyclic dependency first; the trace must follow the
        // cyclic edge instead of wandering off to "x"
        let tasks = vec![task("x", &[]), task("a", &["x", "b"]), task("b", &["a"])];
        let err = DependencyGraph::build(&tasks).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cycle detected:"), "got: {}", msg);
        assert!(!msg.contains('x'), "acyclic node leaked into trace: {}", msg);
    }

    #[test]
    fn test_diamond_is_acyclic() {
        let tasks = vec![
            task("root", &[]),
            task("left", &["root"]),
            task("right", &["root"]),
            task("merge", &["left", "right"]),
        ];
        let mut graph = DependencyGraph::build(&tasks).unwrap();
        assert_eq!(graph.initially_ready(), vec![0]);
        assert_eq!(graph.complete(0), vec![1, 2]);
        assert!(graph.complete(1).is_empty());
        assert_eq!(graph.complete(2), vec![3]);
    }
}
