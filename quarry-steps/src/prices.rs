//! Hourly prices: extract the vendor ZIPs into a Hive-partitioned
//! `prices/year=*/data.parquet` tree.
//!
//! Two passes. Pass 1 extracts each ZIP to a scratch dir, bulk-reads
//! the bar files, and spills per-year fragments under
//! `_prices_temp_fragments/`. Pass 2 merges each year's fragments,
//! deduplicating overlapping (ticker, ts) pairs with ETF winning over
//! stock, and swaps the finished tree into place.

use anyhow::{Context, Result};
use duckdb::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use quarry_core::{publish, verify_parquet, ConfigError, Registry};

use crate::archive;
use crate::paths::{
    sql_path, DataPaths, BAR_FILE_SUFFIX, PARQUET_SETTINGS, REGULAR_HOURS_END,
    REGULAR_HOURS_START,
};

pub fn register(registry: &mut Registry, paths: &DataPaths) -> Result<(), ConfigError> {
    let paths = paths.clone();
    registry.register("prices_v2", "prices", &["tickers"], move |conn| {
        build(conn, &paths)
    })
}

fn build(conn: &Connection, paths: &DataPaths) -> Result<()> {
    let prices_dir = paths.target_dir("prices");
    let building = publish::building_dir(&prices_dir);
    let fragments = paths.output_dir().join("_prices_temp_fragments");

    // Clean any prior state from an interrupted attempt
    for dir in [&building, &fragments] {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
    }
    fs::create_dir_all(&fragments)?;
    fs::create_dir_all(&building)?;

    let mut zips: Vec<(PathBuf, &str)> = archive::list_zips(&paths.stocks_zips())?
        .into_iter()
        .map(|z| (z, "stock"))
        .collect();
    zips.extend(
        archive::list_zips(&paths.etfs_zips())?
            .into_iter()
            .map(|z| (z, "etf")),
    );
    let total = zips.len();

    info!("pass 1: processing {} ZIP files into temp fragments", total);
    for (idx, (zip_path, asset_type)) in zips.iter().enumerate() {
        let name = zip_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("  [{}/{}] {}", idx + 1, total, name);
        if let Err(err) = spill_zip(conn, zip_path, asset_type, &fragments) {
            warn!("  error processing {}: {:#}", name, err);
        }
    }

    info!("pass 2: merging fragments per year");
    let mut year_dirs: Vec<PathBuf> = fs::read_dir(&fragments)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with("year="))
        })
        .collect();
    year_dirs.sort();

    let total_years = year_dirs.len();
    for (idx, year_dir) in year_dirs.iter().enumerate() {
        let year = year_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("  [{}/{}] merging {}", idx + 1, total_years, year);

        let out_dir = building.join(&year);
        fs::create_dir_all(&out_dir)?;
        let out_path = out_dir.join("data.parquet");

        // ETF wins over stock for overlapping (ticker, ts) pairs
        conn.execute_batch(&format!(
            "COPY (
    SELECT ticker, ts, open, high, low, close, volume
    FROM (
        SELECT *,
            ROW_NUMBER() OVER (
                PARTITION BY ticker, ts
                ORDER BY CASE WHEN _asset_type = 'etf' THEN 0 ELSE 1 END
            ) AS _rn
        FROM read_parquet('{frags}')
    )
    WHERE _rn = 1
    ORDER BY ticker, ts
) TO '{out}' ({PARQUET_SETTINGS})",
            frags = sql_path(&year_dir.join("*.parquet")),
            out = sql_path(&out_path),
        ))?;

        let count = verify_parquet(conn, &out_path.to_string_lossy(), 1)?;
        info!("  {}: {} rows", year, count);
    }

    publish::publish(&building, &prices_dir)?;
    fs::remove_dir_all(&fragments)?;

    let glob = prices_dir.join("**").join("*.parquet");
    let total_rows = verify_parquet(conn, &glob.to_string_lossy(), 1)?;
    info!("  wrote {} total price rows", total_rows);
    Ok(())
}

/// Extract one ZIP and spill its bars into per-year fragment files.
fn spill_zip(
    conn: &Connection,
    zip_path: &Path,
    asset_type: &str,
    fragments: &Path,
) -> Result<()> {
    let scratch = tempfile::tempdir().context("creating scratch dir")?;
    archive::extract_zip(zip_path, scratch.path())?;

    let glob = scratch.path().join("**").join("*.txt");
    let suffix = BAR_FILE_SUFFIX.replace('\'', "''");

    // Bar files carry no header; the ticker comes from the filename.
    // Files not matching the bar suffix are filtered back out.
    conn.execute_batch(&format!(
        "CREATE OR REPLACE TABLE _raw AS
    SELECT
        replace(string_split(filename, '/')[-1], '{suffix}', '') AS ticker,
        column0 AS ts,
        column1 AS open,
        column2 AS high,
        column3 AS low,
        column4 AS close,
        column5 AS volume,
        '{asset_type}' AS _asset_type
    FROM read_csv(
        '{glob}',
        header=false,
        columns={{
            'column0': 'TIMESTAMP',
            'column1': 'FLOAT',
            'column2': 'FLOAT',
            'column3': 'FLOAT',
            'column4': 'FLOAT',
            'column5': 'INTEGER'
        }},
        filename=true,
        ignore_errors=true
    )
    WHERE replace(string_split(filename, '/')[-1], '{suffix}', '')
        != string_split(filename, '/')[-1]
      AND EXTRACT(HOUR FROM column0) BETWEEN {REGULAR_HOURS_START} AND {REGULAR_HOURS_END}",
        glob = sql_path(&glob),
    ))?;

    let rows: usize = conn.query_row("SELECT COUNT(*) FROM _raw", [], |row| row.get(0))?;
    if rows == 0 {
        warn!("  no valid rows in {}", zip_path.display());
        conn.execute_batch("DROP TABLE _raw")?;
        return Ok(());
    }

    let mut years: Vec<i32> = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT EXTRACT(YEAR FROM ts)::INTEGER AS yr FROM _raw ORDER BY yr",
        )?;
        let mut qrows = stmt.query([])?;
        while let Some(row) = qrows.next()? {
            years.push(row.get(0)?);
        }
    }

    let stem = zip_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let frag_id = format!("{asset_type}_{stem}");

    for year in years {
        let frag_dir = fragments.join(format!("year={year}"));
        fs::create_dir_all(&frag_dir)?;
        let frag_path = frag_dir.join(format!("{frag_id}.parquet"));
        conn.execute_batch(&format!(
            "COPY (
    SELECT ticker, ts, open, high, low, close, volume, _asset_type
    FROM _raw
    WHERE EXTRACT(YEAR FROM ts) = {year}
    ORDER BY ticker, ts
) TO '{out}' ({PARQUET_SETTINGS})",
            out = sql_path(&frag_path),
        ))?;
    }

    conn.execute_batch("DROP TABLE _raw")?;
    Ok(())
}
