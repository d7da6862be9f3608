//! SEC Form 4 bulk files from sec-api.io, one JSONL.GZ per month under
//! `data/{year}/{YYYY-MM}.jsonl.gz`.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::fs;
use std::time::Duration;
use tracing::{info, warn};

use crate::paths::DataPaths;

const INDEX_URL: &str = "https://api.sec-api.io/bulk/form-4/index.json";
const BASE_URL: &str = "https://api.sec-api.io/bulk/form-4";

#[derive(Debug, Clone, Default)]
pub struct InsiderTradesOptions {
    /// Earliest month to fetch, as `YYYY-MM`.
    pub from: Option<String>,
    /// Latest month to fetch, as `YYYY-MM`.
    pub to: Option<String>,
    /// Re-download months whose file already exists with the right size.
    pub force: bool,
}

#[derive(Debug)]
struct IndexEntry {
    name: String,
    url: String,
    size: Option<u64>,
}

/// Download the monthly Form 4 bulk files into
/// `data_sources/insider_trades/data/`.
pub async fn fetch_insider_trades(
    paths: &DataPaths,
    opts: &InsiderTradesOptions,
) -> Result<()> {
    let token = std::env::var("SEC_API_TOKEN")
        .context("SEC_API_TOKEN not set; export it before fetching insider trades")?;

    let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

    info!("fetching file index from sec-api.io");
    let resp = super::get_with_retry(&client, INDEX_URL, Some(&token)).await?;
    let raw: serde_json::Value = resp.json().await.context("decoding index")?;
    let files = normalize_index(&raw)?;
    info!("index has {} files", files.len());

    let data_dir = paths.insider_trades_files();
    fs::create_dir_all(&data_dir)?;

    let todo: Vec<(IndexEntry, String)> = files
        .into_iter()
        .filter_map(|entry| {
            let ym = year_month(&entry.name)?.to_string();
            if let Some(from) = &opts.from {
                if ym < *from {
                    return None;
                }
            }
            if let Some(to) = &opts.to {
                if ym > *to {
                    return None;
                }
            }
            Some((entry, ym))
        })
        .collect();

    let bar = ProgressBar::new(todo.len() as u64);
    bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")?);

    let mut downloaded = 0usize;
    let mut skipped = 0usize;
    for (entry, ym) in todo {
        bar.inc(1);
        let year = &ym[..4];
        let dest = data_dir.join(year).join(format!("{ym}.jsonl.gz"));

        let up_to_date = !opts.force
            && dest.exists()
            && entry
                .size
                .map(|size| dest.metadata().map(|m| m.len() == size).unwrap_or(false))
                .unwrap_or(true);
        if up_to_date {
            skipped += 1;
            continue;
        }

        bar.set_message(ym.clone());
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = dest.with_extension("gz.tmp");
        let resp = super::get_with_retry(&client, &entry.url, Some(&token)).await?;
        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("downloading {}", entry.name))?;
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &dest)?;
        downloaded += 1;

        // Be polite to the bulk endpoint
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    bar.finish_and_clear();
    info!("downloaded {} files, {} already current", downloaded, skipped);
    Ok(())
}

/// Flatten the index document: the API has shipped both a bare array
/// and a `{"files": [...]}` wrapper, with string or object entries.
fn normalize_index(raw: &serde_json::Value) -> Result<Vec<IndexEntry>> {
    let entries = if let Some(list) = raw.as_array() {
        list
    } else if let Some(list) = raw.get("files").and_then(|f| f.as_array()) {
        list
    } else {
        bail!("unexpected index format from sec-api.io");
    };

    let mut files = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(name) = entry.as_str() {
            files.push(IndexEntry {
                name: name.to_string(),
                url: format!("{BASE_URL}/{name}"),
                size: None,
            });
        } else if let Some(obj) = entry.as_object() {
            let name = ["key", "name", "filename"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(|v| v.as_str()))
                .unwrap_or_default()
                .to_string();
            if name.is_empty() {
                continue;
            }
            let url = ["url", "link"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(|v| v.as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| format!("{BASE_URL}/{name}"));
            let size = obj.get("size").and_then(|v| v.as_u64());
            files.push(IndexEntry { name, url, size });
        } else {
            warn!("ignoring malformed index entry: {}", entry);
        }
    }
    Ok(files)
}

/// Pull `YYYY-MM` out of a name like `2024/2024-01.jsonl.gz`.
fn year_month(name: &str) -> Option<&str> {
    let bytes = name.as_bytes();
    bytes
        .windows(7)
        .position(|w| {
            w[..4].iter().all(|b| b.is_ascii_digit())
                && w[4] == b'-'
                && w[5..].iter().all(|b| b.is_ascii_digit())
        })
        .map(|i| &name[i..i + 7])
}
