//! Summary command: a human-readable overview of each built table.
//!
//! Prints schemas, row counts, and small breakdowns straight from the
//! Parquet artifacts so you can eyeball whether a build produced
//! reasonable data. Also runs automatically after a successful build.

use anyhow::Result;
use colored::Colorize;
use duckdb::Connection;
use quarry_core::{EngineConfig, Reporter};
use quarry_steps::DataPaths;
use std::fs;
use std::path::Path;

const ALL_TABLES: [&str; 6] = [
    "tickers",
    "prices",
    "daily_aggs",
    "hundred_day_aggs",
    "market_cap",
    "insider_trades",
];

pub fn run(dir: &str, tables: &[String]) -> Result<()> {
    let paths = DataPaths::new(dir);
    print_summaries(&paths, tables)
}

/// Reporter wired into the executor: prints the full summary after a
/// successful build.
pub struct SummaryReporter {
    paths: DataPaths,
}

impl SummaryReporter {
    pub fn new(paths: DataPaths) -> Self {
        Self { paths }
    }
}

impl Reporter for SummaryReporter {
    fn report(&self) -> anyhow::Result<()> {
        println!();
        print_summaries(&self.paths, &[])
    }
}

fn print_summaries(paths: &DataPaths, tables: &[String]) -> Result<()> {
    let conn = EngineConfig::default().connect()?;
    let selected: Vec<&str> = if tables.is_empty() {
        ALL_TABLES.to_vec()
    } else {
        tables.iter().map(String::as_str).collect()
    };

    for table in selected {
        match table {
            "tickers" => summarize_tickers(&conn, paths)?,
            "prices" => summarize_prices(&conn, paths)?,
            "daily_aggs" => summarize_daily(&conn, paths)?,
            "hundred_day_aggs" => summarize_blocks(&conn, paths)?,
            "market_cap" => summarize_market_cap(&conn, paths)?,
            "insider_trades" => summarize_insider_trades(&conn, paths)?,
            other => println!("unknown table: {other}"),
        }
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn section(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("  {}", title.bold());
    println!("{}", "=".repeat(60));
}

/// `read_parquet(...)` expression for a single-file artifact.
fn pq(path: &Path) -> String {
    format!(
        "read_parquet('{}')",
        path.to_string_lossy().replace('\'', "''")
    )
}

/// `read_parquet(...)` expression for a Hive-partitioned directory.
fn pq_hive(dir: &Path) -> String {
    let glob = dir.join("**").join("*.parquet");
    format!(
        "read_parquet('{}', hive_partitioning=true)",
        glob.to_string_lossy().replace('\'', "''")
    )
}

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

/// Thousands separators, e.g. 1234567 -> "1,234,567".
fn fmt_count(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Humanized size of a file or a whole directory tree.
fn file_size(path: &Path) -> String {
    fn dir_size(dir: &Path) -> u64 {
        fs::read_dir(dir)
            .into_iter()
            .flatten()
            .flatten()
            .map(|entry| {
                let path = entry.path();
                if path.is_dir() {
                    dir_size(&path)
                } else {
                    path.metadata().map(|m| m.len()).unwrap_or(0)
                }
            })
            .sum()
    }

    let total = if path.is_dir() {
        dir_size(path)
    } else {
        match path.metadata() {
            Ok(meta) => meta.len(),
            Err(_) => return "N/A".to_string(),
        }
    };

    let mut size = total as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return if unit == "B" {
                format!("{size:.0}{unit}")
            } else {
                format!("{size:.1}{unit}")
            };
        }
        size /= 1024.0;
    }
    format!("{size:.1}TB")
}

fn print_schema(conn: &Connection, parquet_expr: &str) -> Result<()> {
    let mut stmt = conn.prepare(&format!("DESCRIBE SELECT * FROM {parquet_expr}"))?;
    let mut rows = stmt.query([])?;
    let mut parts = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let dtype: String = row.get(1)?;
        parts.push(format!("{name} ({dtype})"));
    }
    println!("  Schema: {}", parts.join(", "));
    Ok(())
}

// ---------------------------------------------------------------------------
// Per-table summaries
// ---------------------------------------------------------------------------

fn summarize_tickers(conn: &Connection, paths: &DataPaths) -> Result<()> {
    let path = paths.target_file("tickers");
    if !path.exists() {
        section("TICKERS — not found");
        return Ok(());
    }
    section("TICKERS");
    let expr = pq(&path);
    print_schema(conn, &expr)?;

    let total = count(conn, &format!("SELECT COUNT(*) FROM {expr}"))?;

    let mut parts = Vec::new();
    let mut stmt = conn.prepare(&format!(
        "SELECT asset_type, COUNT(*) FROM {expr} GROUP BY asset_type ORDER BY asset_type"
    ))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let asset_type: String = row.get(0)?;
        let n: i64 = row.get(1)?;
        parts.push(format!("{} {}", fmt_count(n), asset_type));
    }

    println!("  Rows: {}  ({})", fmt_count(total), parts.join(", "));
    println!("  File: {}", file_size(&path));
    Ok(())
}

fn summarize_prices(conn: &Connection, paths: &DataPaths) -> Result<()> {
    let dir = paths.target_dir("prices");
    if !dir.exists() {
        section("PRICES — not found");
        return Ok(());
    }
    section("PRICES");
    let expr = pq_hive(&dir);
    print_schema(conn, &expr)?;

    let total = count(conn, &format!("SELECT COUNT(*) FROM {expr}"))?;
    let tickers = count(conn, &format!("SELECT COUNT(DISTINCT ticker) FROM {expr}"))?;
    println!(
        "  Rows: {} | Tickers: {}",
        fmt_count(total),
        fmt_count(tickers)
    );
    println!("  Total size: {}", file_size(&dir));

    println!("\n  {:>6} {:>14} {:>9}", "Year", "Rows", "Tickers");
    println!("  {}", "-".repeat(32));
    let mut stmt = conn.prepare(&format!(
        "SELECT year::VARCHAR, COUNT(*), COUNT(DISTINCT ticker)
         FROM {expr} GROUP BY year ORDER BY year"
    ))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let year: String = row.get(0)?;
        let n: i64 = row.get(1)?;
        let t: i64 = row.get(2)?;
        println!("  {:>6} {:>14} {:>9}", year, fmt_count(n), fmt_count(t));
    }
    Ok(())
}

fn summarize_daily(conn: &Connection, paths: &DataPaths) -> Result<()> {
    let dir = paths.target_dir("daily_aggs");
    if !dir.exists() {
        section("DAILY AGGS — not found");
        return Ok(());
    }
    section("DAILY AGGS");
    let expr = pq_hive(&dir);
    print_schema(conn, &expr)?;

    let total = count(conn, &format!("SELECT COUNT(*) FROM {expr}"))?;
    let tickers = count(conn, &format!("SELECT COUNT(DISTINCT ticker) FROM {expr}"))?;
    let (first, last): (String, String) = conn.query_row(
        &format!("SELECT MIN(day)::VARCHAR, MAX(day)::VARCHAR FROM {expr}"),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    println!(
        "  Rows: {} | Tickers: {} | Days: {} to {}",
        fmt_count(total),
        fmt_count(tickers),
        first,
        last
    );
    println!("  Total size: {}", file_size(&dir));
    Ok(())
}

fn summarize_blocks(conn: &Connection, paths: &DataPaths) -> Result<()> {
    let path = paths.target_file("hundred_day_aggs");
    if !path.exists() {
        section("HUNDRED DAY AGGS — not found");
        return Ok(());
    }
    section("HUNDRED DAY AGGS");
    let expr = pq(&path);
    print_schema(conn, &expr)?;

    let total = count(conn, &format!("SELECT COUNT(*) FROM {expr}"))?;
    let tickers = count(conn, &format!("SELECT COUNT(DISTINCT ticker) FROM {expr}"))?;
    let full_blocks = count(
        conn,
        &format!("SELECT COUNT(*) FROM {expr} WHERE day_cnt = 100"),
    )?;
    println!(
        "  Rows: {} | Tickers: {} | Full 100-day blocks: {}",
        fmt_count(total),
        fmt_count(tickers),
        fmt_count(full_blocks)
    );
    println!("  File: {}", file_size(&path));
    Ok(())
}

fn summarize_market_cap(conn: &Connection, paths: &DataPaths) -> Result<()> {
    let path = paths.target_file("market_cap");
    if !path.exists() {
        section("MARKET CAP — not found");
        return Ok(());
    }
    section("MARKET CAP");
    let expr = pq(&path);
    print_schema(conn, &expr)?;

    let total = count(conn, &format!("SELECT COUNT(*) FROM {expr}"))?;
    let tickers = count(conn, &format!("SELECT COUNT(DISTINCT ticker) FROM {expr}"))?;
    let (first, last): (String, String) = conn.query_row(
        &format!("SELECT MIN(day)::VARCHAR, MAX(day)::VARCHAR FROM {expr}"),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    println!(
        "  Rows: {} | Tickers: {} | Days: {} to {}",
        fmt_count(total),
        fmt_count(tickers),
        first,
        last
    );
    println!("  File: {}", file_size(&path));
    Ok(())
}

fn summarize_insider_trades(conn: &Connection, paths: &DataPaths) -> Result<()> {
    let path = paths.target_file("insider_trades");
    if !path.exists() {
        section("INSIDER TRADES — not found");
        return Ok(());
    }
    section("INSIDER TRADES");
    let expr = pq(&path);
    print_schema(conn, &expr)?;

    let total = count(conn, &format!("SELECT COUNT(*) FROM {expr}"))?;
    let tickers = count(conn, &format!("SELECT COUNT(DISTINCT ticker) FROM {expr}"))?;
    let buys = count(conn, &format!("SELECT COUNT(*) FROM {expr} WHERE tx_code = 'P'"))?;
    let sells = count(conn, &format!("SELECT COUNT(*) FROM {expr} WHERE tx_code = 'S'"))?;
    println!(
        "  Rows: {} | Tickers: {} | Buys: {} | Sells: {}",
        fmt_count(total),
        fmt_count(tickers),
        fmt_count(buys),
        fmt_count(sells)
    );
    println!("  File: {}", file_size(&path));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_count_groups_thousands() {
        assert_eq!(fmt_count(0), "0");
        assert_eq!(fmt_count(999), "999");
        assert_eq!(fmt_count(1000), "1,000");
        assert_eq!(fmt_count(1234567), "1,234,567");
        assert_eq!(fmt_count(-4200), "-4,200");
    }
}
