//! Market cap: fold the per-ticker CSVs into a single sorted Parquet
//! file, filtered to the known ticker universe.

use anyhow::Result;
use duckdb::Connection;
use std::fs;
use tracing::info;

use quarry_core::{publish, verify_parquet, ConfigError, Registry};

use crate::paths::{sql_path, DataPaths, PARQUET_SETTINGS};

pub fn register(registry: &mut Registry, paths: &DataPaths) -> Result<(), ConfigError> {
    let paths = paths.clone();
    registry.register("market_cap_v2", "market_cap", &["tickers"], move |conn| {
        build(conn, &paths)
    })
}

fn build(conn: &Connection, paths: &DataPaths) -> Result<()> {
    let csv_glob = paths.market_cap_csvs().join("*.csv");
    let tickers = paths.target_file("tickers");
    let dest = paths.target_file("market_cap");
    let staged = publish::staging_path(&dest);
    fs::create_dir_all(paths.output_dir())?;

    info!("building market_cap from CSV files");

    // Caps above 20T are vendor glitches, not companies.
    conn.execute_batch(&format!(
        "COPY (
    SELECT
        replace(string_split(filename, '/')[-1], '.csv', '') AS ticker,
        CAST(date AS DATE) AS day,
        CAST(market_cap AS BIGINT) AS cap
    FROM read_csv(
        '{src}',
        header=true,
        columns={{'date': 'DATE', 'market_cap': 'BIGINT'}},
        filename=true
    )
    WHERE ticker != ''
      AND ticker IN (SELECT ticker FROM read_parquet('{tickers}'))
      AND cap > 0
      AND cap < 20000000000000
    ORDER BY ticker, day
) TO '{out}' ({PARQUET_SETTINGS})",
        src = sql_path(&csv_glob),
        tickers = sql_path(&tickers),
        out = sql_path(&staged),
    ))?;

    publish::publish(&staged, &dest)?;
    let count = verify_parquet(conn, &dest.to_string_lossy(), 1)?;
    info!("  wrote {} rows to market_cap.parquet", count);
    Ok(())
}
