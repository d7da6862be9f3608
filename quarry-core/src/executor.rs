//! Build execution.
//!
//! Runs a plan strictly in order, one step at a time. Each step gets a
//! fresh engine connection that is dropped when the step returns,
//! success or failure. The manifest is persisted after every
//! successful step, so an interrupted run keeps credit for what
//! finished; the first failure aborts the whole run.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::engine::EngineConfig;
use crate::error::BuildError;
use crate::manifest::{Manifest, ManifestEntry, ManifestStore};
use crate::planner::Plan;
use crate::publish;

/// Post-build reporting collaborator, invoked after a fully successful
/// run. Reporting can never fail the build: errors are logged and
/// dropped.
pub trait Reporter {
    fn report(&self) -> anyhow::Result<()>;
}

/// Reporter that does nothing.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Outcome of one executed step.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step_id: String,
    pub target: String,
    pub elapsed: Duration,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub executed: Vec<StepReport>,
}

/// Sequential step runner.
pub struct Executor {
    output_dir: PathBuf,
    manifest_store: ManifestStore,
    engine: EngineConfig,
}

impl Executor {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        manifest_store: ManifestStore,
        engine: EngineConfig,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            manifest_store,
            engine,
        }
    }

    /// Run every step of the plan in order.
    ///
    /// `manifest` must be the document the plan was computed against
    /// (empty for a full rebuild); it is extended and persisted after
    /// each success.
    pub fn run(
        &self,
        plan: &Plan<'_>,
        mut manifest: Manifest,
        reporter: &dyn Reporter,
    ) -> Result<BuildReport, BuildError> {
        publish::cleanup_stale_artifacts(&self.output_dir)?;

        let mut report = BuildReport::default();

        if plan.is_empty() {
            info!("nothing to do, all steps up to date");
        } else {
            fs::create_dir_all(&self.output_dir)?;
            info!("running {} step(s)", plan.len());

            for planned in &plan.steps {
                let step = planned.step;
                info!("── step {} (target={}) ──", step.id, step.target);
                let started = Instant::now();

                // Fresh connection per step, dropped before the
                // manifest write whichever way the step ends.
                let result = match self.engine.connect() {
                    Ok(conn) => step.run(&conn),
                    Err(err) => Err(err.into()),
                };
                if let Err(source) = result {
                    error!("step {} failed: {:#}", step.id, source);
                    return Err(BuildError::Step {
                        step_id: step.id.clone(),
                        source,
                    });
                }

                let elapsed = started.elapsed();
                manifest.insert(
                    step.id.clone(),
                    ManifestEntry {
                        completed_at: Utc::now(),
                        elapsed_seconds: elapsed.as_secs_f64(),
                    },
                );
                self.manifest_store.save(&manifest)?;
                info!("done in {:.1}s", elapsed.as_secs_f64());

                report.executed.push(StepReport {
                    step_id: step.id.clone(),
                    target: step.target.clone(),
                    elapsed,
                });
            }

            info!("build complete");
        }

        if let Err(err) = reporter.report() {
            warn!("post-build reporting failed: {:#}", err);
        }

        Ok(report)
    }
}
