//! Daily aggregates: hourly bars -> daily OHLCV plus component sums,
//! Hive-partitioned by year.

use anyhow::Result;
use duckdb::Connection;
use std::fs;
use tracing::info;

use quarry_core::{publish, verify_parquet, ConfigError, Registry};

use crate::paths::{sql_path, DataPaths, PARQUET_SETTINGS};

pub fn register(registry: &mut Registry, paths: &DataPaths) -> Result<(), ConfigError> {
    let paths = paths.clone();
    registry.register("daily_aggs_v2", "daily_aggs", &["prices"], move |conn| {
        build(conn, &paths)
    })
}

fn build(conn: &Connection, paths: &DataPaths) -> Result<()> {
    let prices_dir = paths.target_dir("prices");
    let daily_dir = paths.target_dir("daily_aggs");
    let building = publish::building_dir(&daily_dir);

    if building.exists() {
        fs::remove_dir_all(&building)?;
    }
    fs::create_dir_all(&building)?;

    info!("building daily aggregates from all price data");

    // Partition years present in the prices tree; used only to address
    // the per-year files, so fetch them as text.
    let mut years: Vec<String> = Vec::new();
    {
        let glob = prices_dir.join("**").join("*.parquet");
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT year::VARCHAR AS year
             FROM read_parquet('{}', hive_partitioning=true)
             ORDER BY year",
            sql_path(&glob)
        ))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            years.push(row.get(0)?);
        }
    }

    let total_years = years.len();
    let mut total_rows = 0usize;

    for (idx, year) in years.iter().enumerate() {
        let year_glob = prices_dir.join(format!("year={year}")).join("*.parquet");
        let out_dir = building.join(format!("year={year}"));
        fs::create_dir_all(&out_dir)?;
        let out_path = out_dir.join("data.parquet");

        conn.execute_batch(&format!(
            "COPY (
    SELECT
        ticker,
        CAST(ts AS DATE) AS day,

        -- day's OHLCV (first/last by ts, max/min/sum)
        FIRST(open ORDER BY ts) AS open,
        MAX(high) AS high,
        MIN(low) AS low,
        LAST(close ORDER BY ts) AS close,
        SUM(volume)::BIGINT AS volume,

        -- component sums
        SUM(open) AS sum_open,
        SUM(high) AS sum_high,
        SUM(low) AS sum_low,
        SUM(close) AS sum_close,
        SUM(volume)::BIGINT AS sum_volume,
        COUNT(*)::UTINYINT AS cnt

    FROM read_parquet('{src}')
    GROUP BY ticker, CAST(ts AS DATE)
    ORDER BY ticker, day
) TO '{out}' ({PARQUET_SETTINGS})",
            src = sql_path(&year_glob),
            out = sql_path(&out_path),
        ))?;

        let count = verify_parquet(conn, &out_path.to_string_lossy(), 1)?;
        total_rows += count;
        info!("  [{}/{}] year={}: {} rows", idx + 1, total_years, year, count);
    }

    // A much older layout wrote a single daily_aggs.parquet file;
    // remove it so the directory artifact is unambiguous.
    let old_file = paths.target_file("daily_aggs");
    if old_file.exists() {
        fs::remove_file(&old_file)?;
    }

    publish::publish(&building, &daily_dir)?;
    info!("  wrote {} total daily agg rows", total_rows);
    Ok(())
}
