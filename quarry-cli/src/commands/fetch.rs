//! Fetch command: download raw source data.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Subcommand;
use quarry_steps::fetch::{
    fetch_insider_trades, fetch_market_cap, InsiderTradesOptions, MarketCapOptions,
};
use quarry_steps::DataPaths;

#[derive(Debug, Subcommand)]
pub enum FetchSource {
    /// Historical daily market cap from the FMP API (needs FMP_API_TOKEN)
    MarketCap {
        /// Start date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        from: Option<NaiveDate>,

        /// End date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        to: Option<NaiveDate>,

        /// File with one ticker per line (default: discover from the stock ZIPs)
        #[arg(long, value_name = "FILE")]
        tickers: Option<String>,

        /// Re-download tickers that already have a CSV
        #[arg(short, long)]
        force: bool,
    },

    /// SEC Form 4 bulk files from sec-api.io (needs SEC_API_TOKEN)
    InsiderTrades {
        /// Earliest month (YYYY-MM)
        #[arg(long, value_name = "MONTH")]
        from: Option<String>,

        /// Latest month (YYYY-MM)
        #[arg(long, value_name = "MONTH")]
        to: Option<String>,

        /// Re-download files that already exist
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run(dir: &str, source: FetchSource) -> Result<()> {
    let paths = DataPaths::new(dir);
    match source {
        FetchSource::MarketCap {
            from,
            to,
            tickers,
            force,
        } => {
            let mut opts = MarketCapOptions {
                force,
                ..MarketCapOptions::default()
            };
            if let Some(from) = from {
                opts.from = from;
            }
            if let Some(to) = to {
                opts.to = to;
            }
            if let Some(file) = tickers {
                opts.tickers = Some(read_tickers(&file)?);
            }
            fetch_market_cap(&paths, &opts).await
        }
        FetchSource::InsiderTrades { from, to, force } => {
            fetch_insider_trades(&paths, &InsiderTradesOptions { from, to, force }).await
        }
    }
}

/// One ticker per line; blank lines and `#` comments are skipped.
fn read_tickers(path: &str) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_uppercase)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_tickers_skips_comments_and_uppercases() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# watchlist\naapl\n\n MSFT ").unwrap();
        let tickers = read_tickers(file.path().to_str().unwrap()).unwrap();
        assert_eq!(tickers, ["AAPL", "MSFT"]);
    }
}
