//! Step registry.
//!
//! An explicit, owned collection of build steps. Steps are registered
//! once at startup and the registry is passed by reference into the
//! planner and executor; there is no process-global state, so tests can
//! build as many independent registries as they like.

use duckdb::Connection;
use std::collections::{BTreeSet, HashSet};

use crate::error::ConfigError;
use crate::graph::TargetGraph;
use crate::step::Step;

/// Ordered collection of build steps, append-only during startup.
#[derive(Default)]
pub struct Registry {
    steps: Vec<Step>,
    ids: HashSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step. Fails if the id is already registered.
    pub fn register<F>(
        &mut self,
        id: impl Into<String>,
        target: impl Into<String>,
        depends_on: &[&str],
        action: F,
    ) -> Result<(), ConfigError>
    where
        F: Fn(&Connection) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = id.into();
        if !self.ids.insert(id.clone()) {
            return Err(ConfigError::DuplicateStepId(id));
        }
        self.steps.push(Step {
            id,
            target: target.into(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            action: Box::new(action),
        });
        Ok(())
    }

    /// Steps in registration order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every target produced by some registered step, sorted.
    pub fn known_targets(&self) -> BTreeSet<String> {
        self.steps.iter().map(|s| s.target.clone()).collect()
    }

    /// Whether some registered step produces `target`.
    pub fn produces(&self, target: &str) -> bool {
        self.steps.iter().any(|s| s.target == target)
    }

    /// Check the dependency graph: every declared dependency must be
    /// produced by a registered step, and the graph must be acyclic.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let graph = TargetGraph::from_registry(self)?;
        graph.ensure_acyclic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &Connection) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn register_keeps_declaration_order() {
        let mut reg = Registry::new();
        reg.register("a_v1", "a", &[], noop).unwrap();
        reg.register("b_v1", "b", &["a"], noop).unwrap();
        let ids: Vec<_> = reg.steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a_v1", "b_v1"]);
        assert!(reg.produces("a"));
        assert!(!reg.produces("c"));
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut reg = Registry::new();
        reg.register("a_v1", "a", &[], noop).unwrap();
        let err = reg.register("a_v1", "other", &[], noop).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateStepId(id) if id == "a_v1"));
    }

    #[test]
    fn unknown_dependency_rejected() {
        let mut reg = Registry::new();
        reg.register("a_v1", "a", &["nope"], noop).unwrap();
        let err = reg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDependency { .. }));
    }

    #[test]
    fn dependency_cycle_rejected() {
        let mut reg = Registry::new();
        reg.register("a_v1", "a", &["b"], noop).unwrap();
        reg.register("b_v1", "b", &["a"], noop).unwrap();
        let err = reg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DependencyCycle(_)));
    }

    #[test]
    fn self_dependency_rejected() {
        let mut reg = Registry::new();
        reg.register("a_v1", "a", &["a"], noop).unwrap();
        let err = reg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DependencyCycle(_)));
    }
}
