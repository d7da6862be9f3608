//! Build planning.
//!
//! Decides which steps run this invocation, and in what order. The
//! order is a deterministic topological ordering of the dependency
//! graph (registration order breaks ties), so correctness never
//! depends on steps being declared dependency-first.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::error::ConfigError;
use crate::graph::TargetGraph;
use crate::manifest::Manifest;
use crate::registry::Registry;
use crate::step::Step;

/// Why a step is in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanReason {
    /// Never built: the step id has no manifest entry.
    New,
    /// Previously built, forced by a request or an upstream rebuild.
    Rebuild,
}

impl PlanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanReason::New => "NEW",
            PlanReason::Rebuild => "REBUILD",
        }
    }
}

/// One planned step.
#[derive(Debug)]
pub struct PlannedStep<'a> {
    pub step: &'a Step,
    pub reason: PlanReason,
}

/// Ordered list of steps to execute.
#[derive(Debug)]
pub struct Plan<'a> {
    pub steps: Vec<PlannedStep<'a>>,
}

impl Plan<'_> {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Compute the steps to run.
///
/// - `full_rebuild` ignores the manifest entirely: every step runs.
/// - Requesting a target forces it and everything transitively
///   downstream of it.
/// - Independently, any step missing from the manifest runs, and a
///   rebuilt dependency cascades to its dependents within this run.
pub fn plan<'a>(
    registry: &'a Registry,
    manifest: &Manifest,
    requested_targets: &[String],
    full_rebuild: bool,
) -> Result<Plan<'a>, ConfigError> {
    let known = registry.known_targets();
    for target in requested_targets {
        if !known.contains(target) {
            return Err(ConfigError::UnknownTarget {
                target: target.clone(),
                known: known.iter().cloned().collect::<Vec<_>>().join(", "),
            });
        }
    }

    let graph = TargetGraph::from_registry(registry)?;
    graph.ensure_acyclic()?;

    // Deterministic execution order: topological, with the first
    // producing step's registration index as the tie-break.
    let mut preference: HashMap<String, usize> = HashMap::new();
    for (idx, step) in registry.steps().iter().enumerate() {
        preference.entry(step.target.clone()).or_insert(idx);
    }
    let target_rank: HashMap<String, usize> = graph
        .topo_targets(&preference)?
        .into_iter()
        .enumerate()
        .map(|(rank, target)| (target, rank))
        .collect();

    let mut ordered: Vec<&Step> = registry.steps().iter().collect();
    ordered.sort_by_key(|s| target_rank[&s.target]);

    if full_rebuild {
        let steps = ordered
            .into_iter()
            .map(|step| PlannedStep {
                step,
                reason: PlanReason::New,
            })
            .collect();
        return Ok(Plan { steps });
    }

    let mut force_targets: BTreeSet<String> = BTreeSet::new();
    for target in requested_targets {
        force_targets.insert(target.clone());
        force_targets.extend(graph.downstream_of(target));
    }

    let mut rebuilt_this_run: BTreeSet<&str> = BTreeSet::new();
    let mut steps = Vec::new();

    for step in ordered {
        let is_new = !manifest.contains_key(&step.id);
        let forced = force_targets.contains(&step.target);
        let upstream_rebuilt = step
            .depends_on
            .iter()
            .any(|dep| rebuilt_this_run.contains(dep.as_str()));

        if is_new || forced || upstream_rebuilt {
            rebuilt_this_run.insert(step.target.as_str());
            steps.push(PlannedStep {
                step,
                reason: if is_new {
                    PlanReason::New
                } else {
                    PlanReason::Rebuild
                },
            });
        }
    }

    Ok(Plan { steps })
}
