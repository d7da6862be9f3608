//! Raw-source downloaders.
//!
//! These populate `data_sources/` over HTTP and are the only part of
//! the system that retries: transient failures here are expected, so
//! each request backs off exponentially. The build engine itself never
//! retries. Downloaders never touch `db/` or the manifest.

mod insider_trades;
mod market_cap;

pub use insider_trades::{fetch_insider_trades, InsiderTradesOptions};
pub use market_cap::{fetch_market_cap, MarketCapOptions};

use anyhow::{bail, Result};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::warn;

const MAX_RETRIES: u32 = 5;

/// GET with exponential backoff on transport errors and 429s. HTTP
/// error statuses other than 429 fail immediately.
pub(crate) async fn get_with_retry(
    client: &Client,
    url: &str,
    auth: Option<&str>,
) -> Result<Response> {
    for attempt in 0..MAX_RETRIES {
        let mut request = client.get(url);
        if let Some(token) = auth {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }
        match request.send().await {
            Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                let wait = Duration::from_secs(2u64.pow(attempt) * 2);
                warn!("rate limited, retrying in {}s", wait.as_secs());
                tokio::time::sleep(wait).await;
            }
            Ok(resp) => return Ok(resp.error_for_status()?),
            Err(err) => {
                if attempt + 1 == MAX_RETRIES {
                    return Err(err.into());
                }
                let wait = Duration::from_secs(2u64.pow(attempt + 1));
                warn!("request failed ({}), retrying in {}s", err, wait.as_secs());
                tokio::time::sleep(wait).await;
            }
        }
    }
    bail!("giving up on {url} after {MAX_RETRIES} attempts")
}
