//! Dependency graph over build targets.
//!
//! Derived on demand from the registry; never persisted. Edges point
//! from a dependency to the targets that read it, so "everything
//! downstream of X" is a forward traversal.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::ConfigError;
use crate::registry::Registry;

/// Directed graph of target names, dependency -> dependent.
pub struct TargetGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl TargetGraph {
    /// Build the graph from a registry. Fails if a step declares a
    /// dependency on a target no registered step produces.
    pub fn from_registry(registry: &Registry) -> Result<Self, ConfigError> {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for step in registry.steps() {
            if !node_map.contains_key(&step.target) {
                let idx = graph.add_node(step.target.clone());
                node_map.insert(step.target.clone(), idx);
            }
        }

        for step in registry.steps() {
            let target_idx = node_map[&step.target];
            for dep in &step.depends_on {
                let dep_idx = *node_map.get(dep).ok_or_else(|| {
                    ConfigError::UnknownDependency {
                        step_id: step.id.clone(),
                        dependency: dep.clone(),
                    }
                })?;
                // update_edge so repeated declarations collapse to one edge
                graph.update_edge(dep_idx, target_idx, ());
            }
        }

        Ok(Self { graph, node_map })
    }

    /// Fail with a configuration error if the graph contains a cycle.
    /// A cycle is a defect in the step declarations, not something to
    /// quietly survive.
    pub fn ensure_acyclic(&self) -> Result<(), ConfigError> {
        for scc in kosaraju_scc(&self.graph) {
            let cyclic = scc.len() > 1
                || (scc.len() == 1 && self.graph.find_edge(scc[0], scc[0]).is_some());
            if cyclic {
                let mut names: Vec<&str> =
                    scc.iter().map(|&n| self.graph[n].as_str()).collect();
                names.sort_unstable();
                return Err(ConfigError::DependencyCycle(names.join(" -> ")));
            }
        }
        Ok(())
    }

    /// Transitive closure of targets that depend (directly or
    /// indirectly) on `target`, excluding `target` itself. Each
    /// downstream target appears once, however many paths reach it.
    pub fn downstream_of(&self, target: &str) -> BTreeSet<String> {
        let mut downstream = BTreeSet::new();
        let Some(&start) = self.node_map.get(target) else {
            return downstream;
        };

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if visited.insert(next) {
                    downstream.insert(self.graph[next].clone());
                    queue.push_back(next);
                }
            }
        }
        downstream
    }

    /// Topological order of targets. `preference` ranks targets (lower
    /// runs earlier) and breaks ties between independent targets, so
    /// the result is deterministic and follows registration order
    /// wherever the dependencies allow.
    pub fn topo_targets(
        &self,
        preference: &HashMap<String, usize>,
    ) -> Result<Vec<String>, ConfigError> {
        let mut indegree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| {
                (
                    n,
                    self.graph.neighbors_directed(n, Direction::Incoming).count(),
                )
            })
            .collect();

        let mut ready: Vec<NodeIndex> = indegree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&n, _)| n)
            .collect();

        let rank = |n: NodeIndex| {
            preference
                .get(self.graph[n].as_str())
                .copied()
                .unwrap_or(usize::MAX)
        };

        let mut order = Vec::with_capacity(self.graph.node_count());
        while !ready.is_empty() {
            let pos = (0..ready.len())
                .min_by_key(|&i| rank(ready[i]))
                .expect("ready is non-empty");
            let node = ready.swap_remove(pos);
            order.push(self.graph[node].clone());

            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                let deg = indegree.get_mut(&next).expect("node has indegree");
                *deg -= 1;
                if *deg == 0 {
                    ready.push(next);
                }
            }
        }

        if order.len() != self.graph.node_count() {
            let mut leftover: Vec<&str> = self
                .graph
                .node_indices()
                .filter(|n| !order.contains(&self.graph[*n]))
                .map(|n| self.graph[n].as_str())
                .collect();
            leftover.sort_unstable();
            return Err(ConfigError::DependencyCycle(leftover.join(" -> ")));
        }
        Ok(order)
    }
}
