//! Error types for the build engine.

use thiserror::Error;

/// Configuration mistakes, detected before any step runs.
///
/// None of these mutate the manifest: a rejected invocation leaves the
/// output directory exactly as it was.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),

    #[error("unknown target '{target}' (known targets: {known})")]
    UnknownTarget { target: String, known: String },

    #[error("step '{step_id}' depends on '{dependency}', which no registered step produces")]
    UnknownDependency { step_id: String, dependency: String },

    #[error("dependency cycle between targets: {0}")]
    DependencyCycle(String),
}

/// Errors surfaced by a build run.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A step action failed (or its artifact failed verification). The
    /// run aborts here; manifest entries from earlier steps stand.
    #[error("step '{step_id}' failed")]
    Step {
        step_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("verification failed: {path} has {rows} rows (expected >= {min_rows})")]
    Verification {
        path: String,
        rows: usize,
        min_rows: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),
}
