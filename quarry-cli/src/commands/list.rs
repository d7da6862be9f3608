//! List command: every registered step with its manifest status.

use anyhow::Result;
use quarry_core::{ManifestStore, Registry};
use quarry_steps::DataPaths;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::output::OutputFormat;

#[derive(Debug, Serialize, Tabled)]
struct StepRow {
    #[tabled(rename = "STEP")]
    id: String,
    #[tabled(rename = "TARGET")]
    target: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "DEPENDS ON")]
    depends_on: String,
}

pub fn run(dir: &str, format: OutputFormat) -> Result<()> {
    let paths = DataPaths::new(dir);
    let mut registry = Registry::new();
    quarry_steps::register_all(&mut registry, &paths)?;

    let manifest = ManifestStore::new(paths.manifest_path()).load()?;

    let rows: Vec<StepRow> = registry
        .steps()
        .iter()
        .map(|step| {
            let status = match manifest.get(&step.id) {
                Some(entry) => format!(
                    "DONE ({}, {:.1}s)",
                    entry.completed_at.format("%Y-%m-%d %H:%M"),
                    entry.elapsed_seconds
                ),
                None => "PENDING".to_string(),
            };
            StepRow {
                id: step.id.clone(),
                target: step.target.clone(),
                status,
                depends_on: step.depends_on.join(", "),
            }
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Table => {
            let mut table = Table::new(&rows);
            table.with(Style::blank());
            println!("{table}");
        }
    }
    Ok(())
}
