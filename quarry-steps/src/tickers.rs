//! Ticker universe: scan the vendor ZIP indexes and write
//! `tickers.parquet`.

use anyhow::Result;
use duckdb::{params, Connection};
use std::collections::BTreeSet;
use std::fs;
use tracing::info;

use quarry_core::{publish, verify_parquet, ConfigError, Registry};

use crate::archive;
use crate::paths::{sql_path, DataPaths, PARQUET_SETTINGS};

pub fn register(registry: &mut Registry, paths: &DataPaths) -> Result<(), ConfigError> {
    let paths = paths.clone();
    registry.register("tickers_v1", "tickers", &[], move |conn| build(conn, &paths))
}

/// ETF wins when a ticker appears in both universes.
fn build(conn: &Connection, paths: &DataPaths) -> Result<()> {
    info!("discovering tickers from stock ZIPs");
    let stocks = archive::discover_tickers(&paths.stocks_zips())?;
    info!("  found {} stock tickers", stocks.len());

    info!("discovering tickers from ETF ZIPs");
    let etfs = archive::discover_tickers(&paths.etfs_zips())?;
    info!("  found {} ETF tickers", etfs.len());

    let mut all: BTreeSet<&String> = stocks.keys().collect();
    all.extend(etfs.keys());

    let mut overlap = 0usize;
    let mut rows: Vec<(String, &str)> = Vec::with_capacity(all.len());
    for ticker in all {
        let asset_type = if etfs.contains_key(ticker.as_str()) {
            if stocks.contains_key(ticker.as_str()) {
                overlap += 1;
            }
            "etf"
        } else {
            "stock"
        };
        rows.push((ticker.clone(), asset_type));
    }
    info!(
        "  total {} tickers ({} overlap, classified as ETF)",
        rows.len(),
        overlap
    );

    fs::create_dir_all(paths.output_dir())?;
    let dest = paths.target_file("tickers");
    let staged = publish::staging_path(&dest);

    conn.execute_batch(
        "CREATE OR REPLACE TABLE _tickers (ticker VARCHAR, asset_type VARCHAR)",
    )?;
    {
        let mut appender = conn.appender("_tickers")?;
        for (ticker, asset_type) in &rows {
            appender.append_row(params![ticker, asset_type])?;
        }
        appender.flush()?;
    }
    conn.execute_batch(&format!(
        "COPY (SELECT * FROM _tickers ORDER BY ticker) TO '{}' ({PARQUET_SETTINGS});\n\
         DROP TABLE _tickers;",
        sql_path(&staged)
    ))?;

    publish::publish(&staged, &dest)?;
    let count = verify_parquet(conn, &dest.to_string_lossy(), 1)?;
    info!("  wrote {} rows to tickers.parquet", count);
    Ok(())
}
