//! Task dependency graph
//!
//! Edges come from `dependsOn`. Ordering uses Kahn's algorithm with
//! declaration order as the tiebreaker, so the same manifest always yields
//! the same order.

use crate::{CoreError, Result};
use devauto_config::AutomationManifest;
use std::collections::HashMap;

/// Resolved `dependsOn` graph over a manifest's tasks
#[derive(Debug, Clone)]
pub struct TaskGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    /// Direct dependencies of each task (deduplicated)
    deps: Vec<Vec<usize>>,
    /// Direct dependents of each task
    dependents: Vec<Vec<usize>>,
    /// Topological order (dependencies first)
    order: Vec<usize>,
}

struct Edges {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl Edges {
    /// Collect edges, reporting the first unknown dependency when `strict`
    fn collect(manifest: &AutomationManifest, strict: bool) -> Result<Self> {
        let ids: Vec<String> = manifest.tasks.keys().cloned().collect();
        let index: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let n = ids.len();
        let mut deps = vec![Vec::new(); n];
        let mut dependents = vec![Vec::new(); n];

        for (i, task) in manifest.tasks.values().enumerate() {
            for dep_id in &task.depends_on {
                match index.get(dep_id) {
                    Some(&j) => {
                        if !deps[i].contains(&j) {
                            deps[i].push(j);
                            dependents[j].push(i);
                        }
                    }
                    None if strict => {
                        return Err(CoreError::UnknownDependency {
                            task: ids[i].clone(),
                            dependency: dep_id.clone(),
                        })
                    }
                    None => {}
                }
            }
        }

        Ok(Self {
            ids,
            index,
            deps,
            dependents,
        })
    }

    /// Kahn's algorithm. Returns the order and, when incomplete, the stuck nodes.
    fn sort(&self) -> (Vec<usize>, Vec<usize>) {
        let n = self.ids.len();
        let mut pending: Vec<usize> = self.deps.iter().map(Vec::len).collect();
        let mut queue: Vec<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while !queue.is_empty() {
            let idx = queue.remove(0);
            order.push(idx);

            for &dep in &self.dependents[idx] {
                pending[dep] -= 1;
                if pending[dep] == 0 {
                    let pos = queue.partition_point(|&x| x < dep);
                    queue.insert(pos, dep);
                }
            }
        }

        let stuck = (0..n).filter(|&i| pending[i] > 0).collect();
        (order, stuck)
    }

    /// Nodes reachable from `from` through dependencies, within `within`
    fn reachable(&self, from: usize, within: &[bool]) -> Vec<bool> {
        let mut seen = vec![false; self.ids.len()];
        let mut stack: Vec<usize> = self.deps[from].clone();
        while let Some(i) = stack.pop() {
            if !within[i] || seen[i] {
                continue;
            }
            seen[i] = true;
            stack.extend(self.deps[i].iter().copied());
        }
        seen
    }

    /// One cycle per strongly connected group of stuck nodes, in declaration order
    fn cycles_from(&self, stuck: &[usize]) -> Vec<Vec<String>> {
        let n = self.ids.len();
        let mut is_stuck = vec![false; n];
        for &i in stuck {
            is_stuck[i] = true;
        }
        let reach: HashMap<usize, Vec<bool>> = stuck
            .iter()
            .map(|&i| (i, self.reachable(i, &is_stuck)))
            .collect();

        let mut assigned = vec![false; n];
        let mut cycles = Vec::new();
        for &i in stuck {
            if assigned[i] {
                continue;
            }
            let mut in_group = vec![false; n];
            for &j in stuck {
                if j == i || (reach[&i][j] && reach[&j][i]) {
                    in_group[j] = true;
                    assigned[j] = true;
                }
            }
            let size = in_group.iter().filter(|&&g| g).count();
            if size == 1 {
                // stuck only because of an upstream cycle, unless it depends on itself
                if self.deps[i].contains(&i) {
                    cycles.push(vec![self.ids[i].clone(), self.ids[i].clone()]);
                }
                continue;
            }

            // every member has a dependency on another member
            let mut path = vec![i];
            let mut current = i;
            loop {
                let Some(next) = self.deps[current]
                    .iter()
                    .copied()
                    .find(|&d| d != current && in_group[d])
                else {
                    break;
                };
                if let Some(pos) = path.iter().position(|&p| p == next) {
                    let mut cycle: Vec<String> =
                        path[pos..].iter().map(|&p| self.ids[p].clone()).collect();
                    cycle.push(self.ids[next].clone());
                    cycles.push(cycle);
                    break;
                }
                path.push(next);
                current = next;
            }
        }
        cycles
    }
}

impl TaskGraph {
    /// Build the graph, rejecting unknown dependencies and cycles
    pub fn build(manifest: &AutomationManifest) -> Result<Self> {
        let edges = Edges::collect(manifest, true)?;
        let (order, stuck) = edges.sort();

        if !stuck.is_empty() {
            let cycle = edges.cycles_from(&stuck).into_iter().next().unwrap_or_default();
            return Err(CoreError::DependencyCycle(cycle.join(" -> ")));
        }

        tracing::debug!(
            "Task graph: {} task(s), order: {}",
            edges.ids.len(),
            order
                .iter()
                .map(|&i| edges.ids[i].as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            ids: edges.ids,
            index: edges.index,
            deps: edges.deps,
            dependents: edges.dependents,
            order,
        })
    }

    /// Dependency cycles in the manifest, one per group of tasks that depend
    /// on each other, ignoring unknown dependencies.
    ///
    /// Each path starts and ends with the same id. A task depending on itself
    /// yields `[id, id]`.
    pub fn find_cycles(manifest: &AutomationManifest) -> Vec<Vec<String>> {
        let Ok(edges) = Edges::collect(manifest, false) else {
            return Vec::new();
        };
        let (_, stuck) = edges.sort();
        edges.cycles_from(&stuck)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All task ids, dependencies first
    pub fn topological_order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.ids[i].as_str()).collect()
    }

    /// Direct dependencies of a task
    pub fn dependencies(&self, id: &str) -> Result<Vec<&str>> {
        let i = self.lookup(id)?;
        Ok(self.deps[i].iter().map(|&j| self.ids[j].as_str()).collect())
    }

    /// The given tasks plus all their transitive dependencies, in topological order
    pub fn closure<S: AsRef<str>>(&self, roots: &[S]) -> Result<Vec<&str>> {
        let mut selected = vec![false; self.ids.len()];
        let mut stack = Vec::new();
        for root in roots {
            stack.push(self.lookup(root.as_ref())?);
        }

        while let Some(i) = stack.pop() {
            if selected[i] {
                continue;
            }
            selected[i] = true;
            stack.extend(self.deps[i].iter().copied());
        }

        Ok(self.ordered(&selected))
    }

    /// Every task that transitively depends on `id`, in topological order
    pub fn dependents_of(&self, id: &str) -> Result<Vec<&str>> {
        let start = self.lookup(id)?;
        let mut selected = vec![false; self.ids.len()];
        let mut stack: Vec<usize> = self.dependents[start].clone();

        while let Some(i) = stack.pop() {
            if selected[i] {
                continue;
            }
            selected[i] = true;
            stack.extend(self.dependents[i].iter().copied());
        }

        Ok(self.ordered(&selected))
    }

    fn ordered(&self, selected: &[bool]) -> Vec<&str> {
        self.order
            .iter()
            .filter(|&&i| selected[i])
            .map(|&i| self.ids[i].as_str())
            .collect()
    }

    fn lookup(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| CoreError::TaskNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devauto_config::TaskSpec;

    fn manifest(tasks: &[(&str, &[&str])]) -> AutomationManifest {
        let mut m = AutomationManifest::default();
        for (id, deps) in tasks {
            m.tasks.insert(
                id.to_string(),
                TaskSpec {
                    command: format!("echo {}", id),
                    depends_on: deps.iter().map(|d| d.to_string()).collect(),
                    ..Default::default()
                },
            );
        }
        m
    }

    #[test]
    fn test_dependencies_come_first() {
        let m = manifest(&[
            ("setup-vscode", &["install-dependencies"]),
            ("install-dependencies", &[]),
        ]);
        let graph = TaskGraph::build(&m).unwrap();
        assert_eq!(
            graph.topological_order(),
            vec!["install-dependencies", "setup-vscode"]
        );
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let m = manifest(&[
            ("c", &[]),
            ("a", &["c"]),
            ("b", &[]),
            ("d", &["b", "c"]),
        ]);
        let graph = TaskGraph::build(&m).unwrap();
        // c, b ready first (declaration order c=0, b=2); a unblocks after c
        assert_eq!(graph.topological_order(), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let m = manifest(&[("a", &["missing"])]);
        match TaskGraph::build(&m) {
            Err(CoreError::UnknownDependency { task, dependency }) => {
                assert_eq!(task, "a");
                assert_eq!(dependency, "missing");
            }
            other => panic!("expected UnknownDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_rejected() {
        let m = manifest(&[("a", &["c"]), ("b", &["a"]), ("c", &["b"]), ("d", &[])]);
        let err = TaskGraph::build(&m).unwrap_err();
        match err {
            CoreError::DependencyCycle(path) => {
                assert_eq!(path, "a -> c -> b -> a");
            }
            other => panic!("expected DependencyCycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let m = manifest(&[("loop", &["loop"])]);
        assert_eq!(TaskGraph::find_cycles(&m), vec![vec!["loop", "loop"]]);
    }

    #[test]
    fn test_find_cycles_ignores_unknown_dependencies() {
        let m = manifest(&[("a", &["ghost"]), ("b", &["a"])]);
        assert!(TaskGraph::find_cycles(&m).is_empty());
    }

    #[test]
    fn test_find_cycles_reports_each_group() {
        let m = manifest(&[
            ("a", &["a"]),
            ("b", &["c"]),
            ("c", &["b"]),
            ("d", &["b"]),
            ("e", &["f"]),
            ("f", &["e", "f"]),
        ]);
        assert_eq!(
            TaskGraph::find_cycles(&m),
            vec![
                vec!["a", "a"],
                vec!["b", "c", "b"],
                vec!["e", "f", "e"],
            ]
        );
    }

    #[test]
    fn test_duplicate_dependency_counted_once() {
        let m = manifest(&[("a", &[]), ("b", &["a", "a"])]);
        let graph = TaskGraph::build(&m).unwrap();
        assert_eq!(graph.dependencies("b").unwrap(), vec!["a"]);
        assert_eq!(graph.topological_order(), vec!["a", "b"]);
    }

    #[test]
    fn test_closure_pulls_in_transitive_dependencies() {
        let m = manifest(&[
            ("fetch", &[]),
            ("build", &["fetch"]),
            ("test", &["build"]),
            ("lint", &[]),
        ]);
        let graph = TaskGraph::build(&m).unwrap();
        assert_eq!(graph.closure(&["test"]).unwrap(), vec!["fetch", "build", "test"]);
        assert_eq!(graph.closure(&["lint", "build"]).unwrap(), vec!["fetch", "build", "lint"]);
        assert!(matches!(
            graph.closure(&["nope"]),
            Err(CoreError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_dependents_of() {
        let m = manifest(&[
            ("fetch", &[]),
            ("build", &["fetch"]),
            ("test", &["build"]),
            ("lint", &[]),
        ]);
        let graph = TaskGraph::build(&m).unwrap();
        assert_eq!(graph.dependents_of("fetch").unwrap(), vec!["build", "test"]);
        assert!(graph.dependents_of("lint").unwrap().is_empty());
    }

    #[test]
    fn test_empty_manifest() {
        let graph = TaskGraph::build(&AutomationManifest::default()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.topological_order().is_empty());
    }
}
