//! Hundred-day aggregates: daily rows rolled into 100-trading-day
//! blocks per ticker.

use anyhow::Result;
use duckdb::Connection;
use tracing::info;

use quarry_core::{publish, verify_parquet, ConfigError, Registry};

use crate::paths::{sql_path, DataPaths, PARQUET_SETTINGS};

pub fn register(registry: &mut Registry, paths: &DataPaths) -> Result<(), ConfigError> {
    let paths = paths.clone();
    registry.register(
        "hundred_day_aggs_v1",
        "hundred_day_aggs",
        &["daily_aggs"],
        move |conn| build(conn, &paths),
    )
}

fn build(conn: &Connection, paths: &DataPaths) -> Result<()> {
    let daily_glob = paths.target_dir("daily_aggs").join("**").join("*.parquet");
    let dest = paths.target_file("hundred_day_aggs");
    let staged = publish::staging_path(&dest);

    info!("building 100-day aggregates");

    conn.execute_batch(&format!(
        "COPY (
    WITH numbered AS (
        SELECT *,
            (ROW_NUMBER() OVER (PARTITION BY ticker ORDER BY day) - 1) // 100 AS block_id
        FROM read_parquet('{src}', hive_partitioning=true)
    )
    SELECT
        ticker,
        MIN(day) AS block_start,
        MAX(day) AS block_end,

        -- block OHLCV
        FIRST(open ORDER BY day) AS open,
        MAX(high) AS high,
        MIN(low) AS low,
        LAST(close ORDER BY day) AS close,
        SUM(volume)::BIGINT AS volume,

        -- component sums
        SUM(sum_open) AS sum_open,
        SUM(sum_high) AS sum_high,
        SUM(sum_low) AS sum_low,
        SUM(sum_close) AS sum_close,
        SUM(sum_volume)::BIGINT AS sum_volume,
        SUM(cnt)::USMALLINT AS cnt,
        COUNT(*)::UTINYINT AS day_cnt

    FROM numbered
    GROUP BY ticker, block_id
    ORDER BY ticker, block_start
) TO '{out}' ({PARQUET_SETTINGS})",
        src = sql_path(&daily_glob),
        out = sql_path(&staged),
    ))?;

    publish::publish(&staged, &dest)?;
    let count = verify_parquet(conn, &dest.to_string_lossy(), 1)?;
    info!("  wrote {} rows to hundred_day_aggs.parquet", count);
    Ok(())
}
