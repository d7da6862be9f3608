//! Output format selection.

use clap::ValueEnum;

/// Output format for commands that have a machine-readable shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Table,
    /// JSON for machine consumption
    Json,
}
