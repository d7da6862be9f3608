//! Quarry CLI: incremental builder for the market-data Parquet
//! warehouse.
//!
//! Raw vendor files under `data_sources/` go in, sorted Parquet tables
//! under `db/` come out. Steps are rebuilt only when pending or
//! explicitly requested; requesting a target also rebuilds everything
//! downstream of it.

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use commands::{build, fetch, list, summary};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version)]
#[command(about = "Incremental builder for the market-data Parquet warehouse")]
#[command(propagate_version = true)]
#[command(after_help = "Quick Start:
  quarry build              Run pending steps
  quarry build prices       Rebuild prices and everything downstream
  quarry build --full       Rebuild everything from scratch
  quarry list               Show all steps and their status
  quarry summary            Eyeball the built tables")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Project directory holding data_sources/ and db/
    #[arg(short = 'C', long, global = true, default_value = ".")]
    dir: String,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format (for list)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pending build steps, or rebuild specific targets
    #[command(visible_alias = "b")]
    Build {
        /// Target(s) to rebuild (e.g. prices). Cascades to dependents.
        targets: Vec<String>,

        /// Ignore the manifest and rebuild everything
        #[arg(long)]
        full: bool,

        /// Show what would run without running it
        #[arg(long)]
        dry_run: bool,

        /// Skip the post-build summary
        #[arg(long)]
        no_summary: bool,
    },

    /// Show all steps and their build status
    #[command(visible_alias = "ls")]
    List,

    /// Human-readable overview of the built tables
    Summary {
        /// Tables to summarize (default: all)
        tables: Vec<String>,
    },

    /// Download raw source data into data_sources/
    Fetch {
        #[command(subcommand)]
        source: fetch::FetchSource,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            let _ = Cli::command().print_help();
            println!();
            return Ok(());
        }
    };

    match command {
        Commands::Build {
            targets,
            full,
            dry_run,
            no_summary,
        } => build::run(&cli.dir, &targets, full, dry_run, no_summary),
        Commands::List => list::run(&cli.dir, cli.format),
        Commands::Summary { tables } => summary::run(&cli.dir, &tables),
        Commands::Fetch { source } => fetch::run(&cli.dir, source).await,
    }
}
