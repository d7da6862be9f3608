//! Insider trades: unnest SEC Form 4 filings (JSONL.GZ) into one row
//! per open-market transaction.

use anyhow::Result;
use duckdb::Connection;
use std::fs;
use tracing::info;

use quarry_core::{publish, verify_parquet, ConfigError, Registry};

use crate::paths::{sql_path, DataPaths, PARQUET_SETTINGS};

pub fn register(registry: &mut Registry, paths: &DataPaths) -> Result<(), ConfigError> {
    let paths = paths.clone();
    registry.register(
        "insider_trades_v2",
        "insider_trades",
        &["tickers"],
        move |conn| build(conn, &paths),
    )
}

fn build(conn: &Connection, paths: &DataPaths) -> Result<()> {
    let jsonl_glob = paths
        .insider_trades_files()
        .join("**")
        .join("*.jsonl.gz");
    let tickers = paths.target_file("tickers");
    let dest = paths.target_file("insider_trades");
    let staged = publish::staging_path(&dest);
    fs::create_dir_all(paths.output_dir())?;

    info!("building insider_trades from JSONL.GZ files");

    // Only P (purchase) and S (sale) codes from the non-derivative
    // table; everything else is grants, exercises, gifts.
    conn.execute_batch(&format!(
        "COPY (
    SELECT
        upper(trim(issuer.tradingSymbol)) AS ticker,
        COALESCE(tx.transactionDate, periodOfReport) AS trade_date,
        tx.coding.code AS tx_code,
        CAST(tx.amounts.shares AS FLOAT) AS shares,
        CAST(tx.amounts.shares * tx.amounts.pricePerShare AS FLOAT) AS total_value,
        CASE
            WHEN tx.amounts.acquiredDisposedCode IN ('A', 'D')
                THEN tx.amounts.acquiredDisposedCode
            WHEN tx.coding.code = 'P' THEN 'A'
            ELSE 'D'
        END AS acquired_disposed,
        CAST(tx.postTransactionAmounts.sharesOwnedFollowingTransaction AS FLOAT) AS shares_after,
        CASE
            WHEN tx.ownershipNature.directOrIndirectOwnership IN ('D', 'I')
                THEN tx.ownershipNature.directOrIndirectOwnership
            ELSE 'D'
        END AS ownership_type,
        COALESCE(reportingOwner.relationship.isDirector, false) AS is_director,
        COALESCE(reportingOwner.relationship.isOfficer, false) AS is_officer,
        COALESCE(reportingOwner.relationship.isTenPercentOwner, false) AS is_ten_pct_owner,
        reportingOwner.name AS insider_name,
        reportingOwner.cik AS insider_cik,
        reportingOwner.relationship.officerTitle AS officer_title
    FROM read_json(
        '{src}',
        format='newline_delimited',
        ignore_errors=true
    )
    , LATERAL UNNEST(nonDerivativeTable.transactions) AS t(tx)
    WHERE tx.coding.code IN ('P', 'S')
      AND tx.amounts.shares IS NOT NULL
      AND upper(trim(issuer.tradingSymbol)) != ''
      AND upper(trim(issuer.tradingSymbol)) IN (SELECT ticker FROM read_parquet('{tickers}'))
      AND COALESCE(tx.transactionDate, periodOfReport) IS NOT NULL
      AND EXTRACT(YEAR FROM COALESCE(tx.transactionDate, periodOfReport)) BETWEEN 2000 AND 2026
    ORDER BY ticker, trade_date
) TO '{out}' ({PARQUET_SETTINGS})",
        src = sql_path(&jsonl_glob),
        tickers = sql_path(&tickers),
        out = sql_path(&staged),
    ))?;

    publish::publish(&staged, &dest)?;
    let count = verify_parquet(conn, &dest.to_string_lossy(), 1)?;
    info!("  wrote {} rows to insider_trades.parquet", count);
    Ok(())
}
