//! Build command: plan and execute pending or requested steps.

use anyhow::Result;
use colored::Colorize;
use quarry_core::{
    plan, EngineConfig, Executor, Manifest, ManifestStore, NullReporter, PlanReason, Registry,
};
use quarry_steps::DataPaths;

use super::summary::SummaryReporter;

pub fn run(
    dir: &str,
    targets: &[String],
    full: bool,
    dry_run: bool,
    no_summary: bool,
) -> Result<()> {
    let paths = DataPaths::new(dir);
    let mut registry = Registry::new();
    quarry_steps::register_all(&mut registry, &paths)?;

    let store = ManifestStore::new(paths.manifest_path());
    // A full rebuild plans and runs against an empty manifest, so the
    // first save drops all previous credit.
    let manifest = if full { Manifest::new() } else { store.load()? };

    let build_plan = plan(&registry, &manifest, targets, full)?;
    tracing::debug!("planned {} step(s)", build_plan.len());

    if dry_run {
        if build_plan.is_empty() {
            println!("Nothing to do — all steps up to date.");
            return Ok(());
        }
        println!("Dry run — would execute these steps:");
        for planned in &build_plan.steps {
            let status = match planned.reason {
                PlanReason::New => "NEW".green(),
                PlanReason::Rebuild => "REBUILD".yellow(),
            };
            println!(
                "  {} (target={}) [{}]",
                planned.step.id.bold(),
                planned.step.target,
                status
            );
        }
        return Ok(());
    }

    let executor = Executor::new(paths.output_dir(), store, EngineConfig::default());
    let report = if no_summary {
        executor.run(&build_plan, manifest, &NullReporter)?
    } else {
        let reporter = SummaryReporter::new(paths.clone());
        executor.run(&build_plan, manifest, &reporter)?
    };

    if !report.executed.is_empty() {
        println!(
            "{} {} step(s) completed.",
            "OK:".green().bold(),
            report.executed.len()
        );
    }
    Ok(())
}
