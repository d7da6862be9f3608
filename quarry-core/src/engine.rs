//! Embedded DuckDB engine.
//!
//! Each step gets its own in-memory connection, configured and dropped
//! by the executor; nothing is shared across steps.

use duckdb::Connection;

use crate::error::BuildError;

/// Connection settings for the embedded engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// DuckDB memory limit, e.g. `"12GB"`.
    pub memory_limit: String,
    /// Worker threads inside the engine.
    pub threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_limit: "12GB".to_string(),
            threads: num_cpus::get(),
        }
    }
}

impl EngineConfig {
    /// Open a fresh in-memory connection with these settings applied.
    pub fn connect(&self) -> Result<Connection, BuildError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&format!(
            "SET memory_limit = '{}'; SET threads = {};",
            self.memory_limit, self.threads
        ))?;
        Ok(conn)
    }
}

/// Count the rows of a Parquet file, directory glob, or Hive tree and
/// fail if the artifact holds fewer than `min_rows`. This is the only
/// post-build verification a step gets; schema checking is out of
/// scope.
pub fn verify_parquet(
    conn: &Connection,
    path: &str,
    min_rows: usize,
) -> Result<usize, BuildError> {
    let sql = format!(
        "SELECT COUNT(*) FROM read_parquet('{}')",
        path.replace('\'', "''")
    );
    let rows: usize = conn.query_row(&sql, [], |row| row.get(0))?;
    if rows < min_rows {
        return Err(BuildError::Verification {
            path: path.to_string(),
            rows,
            min_rows,
        });
    }
    Ok(rows)
}
