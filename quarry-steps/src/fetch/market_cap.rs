//! Historical daily market cap from the FMP API
//! (financialmodelingprep.com), one CSV per ticker.

use anyhow::{bail, Context, Result};
use chrono::{Duration as Days, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::archive;
use crate::paths::DataPaths;

const FMP_BASE: &str =
    "https://financialmodelingprep.com/stable/historical-market-capitalization";
/// Calendar days per paginated request; FMP caps a page at 5000 records.
const FMP_WINDOW_DAYS: i64 = 5000;
/// Concurrent requests in flight at once.
const WORKERS: usize = 20;

#[derive(Debug, Clone)]
pub struct MarketCapOptions {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Explicit ticker list; default is auto-discovery from the stock
    /// ZIPs.
    pub tickers: Option<Vec<String>>,
    /// Re-download tickers whose CSV already exists.
    pub force: bool,
}

impl Default for MarketCapOptions {
    fn default() -> Self {
        Self {
            from: NaiveDate::from_ymd_opt(1999, 1, 1).expect("valid date"),
            to: Utc::now().date_naive(),
            tickers: None,
            force: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CapRecord {
    date: String,
    #[serde(rename = "marketCap")]
    market_cap: i64,
}

/// Download market-cap history into `data_sources/market_cap/data/`.
/// Individual ticker failures are collected and reported, not fatal.
pub async fn fetch_market_cap(paths: &DataPaths, opts: &MarketCapOptions) -> Result<()> {
    let token = std::env::var("FMP_API_TOKEN")
        .context("FMP_API_TOKEN not set; export it before fetching market cap")?;

    let tickers: Vec<String> = match &opts.tickers {
        Some(list) => list.clone(),
        None => archive::discover_tickers(&paths.stocks_zips())?
            .into_keys()
            .collect(),
    };
    if tickers.is_empty() {
        bail!("no tickers to fetch; populate the stock ZIPs first or pass --tickers");
    }

    let data_dir = paths.market_cap_csvs();
    fs::create_dir_all(&data_dir)?;

    let total = tickers.len();
    let todo: Vec<String> = tickers
        .into_iter()
        .filter(|t| opts.force || !data_dir.join(format!("{t}.csv")).exists())
        .collect();
    info!(
        "fetching market cap for {} tickers ({} already present)",
        todo.len(),
        total - todo.len()
    );

    let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
    let bar = ProgressBar::new(todo.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40} {pos}/{len} {msg}",
    )?);

    let failed: Vec<String> = stream::iter(todo)
        .map(|ticker| {
            let client = client.clone();
            let token = token.clone();
            let data_dir = data_dir.clone();
            let bar = bar.clone();
            let (from, to) = (opts.from, opts.to);
            async move {
                let outcome =
                    fetch_one(&client, &ticker, &token, from, to, &data_dir).await;
                bar.inc(1);
                match outcome {
                    Ok(rows) => {
                        bar.set_message(format!("{ticker}: {rows} days"));
                        None
                    }
                    Err(err) => {
                        warn!("{}: {:#}", ticker, err);
                        Some(ticker)
                    }
                }
            }
        })
        .buffer_unordered(WORKERS)
        .filter_map(|failed_ticker| async move { failed_ticker })
        .collect()
        .await;

    bar.finish_and_clear();
    if failed.is_empty() {
        info!("all downloads succeeded");
    } else {
        warn!("{} tickers failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

/// Full history for one symbol, paginated by date window, deduplicated
/// by date, written as a sorted CSV via a `.tmp` sibling.
async fn fetch_one(
    client: &Client,
    ticker: &str,
    token: &str,
    from: NaiveDate,
    to: NaiveDate,
    data_dir: &Path,
) -> Result<usize> {
    let mut rows: BTreeMap<String, i64> = BTreeMap::new();

    let mut window_start = from;
    while window_start <= to {
        let window_end = (window_start + Days::days(FMP_WINDOW_DAYS)).min(to);
        let url = format!(
            "{FMP_BASE}?symbol={ticker}&from={window_start}&to={window_end}&limit=5000&apikey={token}"
        );
        let resp = super::get_with_retry(client, &url, None).await?;
        let page: Vec<CapRecord> = resp
            .json()
            .await
            .with_context(|| format!("decoding market-cap page for {ticker}"))?;
        for record in page {
            rows.insert(record.date, record.market_cap);
        }
        window_start = window_end + Days::days(1);
    }

    if rows.is_empty() {
        bail!("no data returned");
    }

    let dest = data_dir.join(format!("{ticker}.csv"));
    let tmp = data_dir.join(format!("{ticker}.csv.tmp"));
    let mut csv = String::from("date,market_cap\n");
    for (date, cap) in &rows {
        csv.push_str(&format!("{date},{cap}\n"));
    }
    fs::write(&tmp, csv)?;
    fs::rename(&tmp, &dest)?;
    Ok(rows.len())
}
