//! ZIP handling for the vendor price archives.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::warn;
use zip::ZipArchive;

use crate::paths::BAR_FILE_SUFFIX;

/// ZIP files in a directory, sorted by name. A missing directory is
/// simply an empty source.
pub fn list_zips(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut zips = Vec::new();
    if !dir.exists() {
        return Ok(zips);
    }
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "zip") {
            zips.push(path);
        }
    }
    zips.sort();
    Ok(zips)
}

/// Discover tickers by reading ZIP central directories, no extraction.
/// Returns ticker -> containing ZIP. Unreadable ZIPs are skipped with a
/// warning so one bad archive does not sink the discovery pass.
pub fn discover_tickers(zip_dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut tickers = BTreeMap::new();
    for zip_path in list_zips(zip_dir)? {
        let file =
            File::open(&zip_path).with_context(|| format!("opening {}", zip_path.display()))?;
        let archive = match ZipArchive::new(file) {
            Ok(archive) => archive,
            Err(err) => {
                warn!("skipping bad zip {}: {}", zip_path.display(), err);
                continue;
            }
        };
        for name in archive.file_names() {
            let base = name.rsplit('/').next().unwrap_or(name);
            if let Some(ticker) = base.strip_suffix(BAR_FILE_SUFFIX) {
                if !ticker.is_empty() {
                    tickers.insert(ticker.to_string(), zip_path.clone());
                }
            }
        }
    }
    Ok(tickers)
}

/// Extract a ZIP into `dest`.
pub fn extract_zip(zip_path: &Path, dest: &Path) -> Result<()> {
    let file =
        File::open(zip_path).with_context(|| format!("opening {}", zip_path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("reading {}", zip_path.display()))?;
    archive
        .extract(dest)
        .with_context(|| format!("extracting {}", zip_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn discovers_tickers_from_bar_filenames() {
        let dir = TempDir::new().unwrap();
        write_zip(
            &dir.path().join("batch1.zip"),
            &[
                ("AAPL_full_1hour_adjsplitdiv.txt", "..."),
                ("nested/MSFT_full_1hour_adjsplitdiv.txt", "..."),
                ("README.txt", "not a bar file"),
            ],
        );

        let tickers = discover_tickers(dir.path()).unwrap();
        let names: Vec<_> = tickers.keys().cloned().collect();
        assert_eq!(names, ["AAPL", "MSFT"]);
    }

    #[test]
    fn missing_directory_yields_no_tickers() {
        let dir = TempDir::new().unwrap();
        let tickers = discover_tickers(&dir.path().join("nope")).unwrap();
        assert!(tickers.is_empty());
    }

    #[test]
    fn bad_zip_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("corrupt.zip"), "definitely not a zip").unwrap();
        write_zip(
            &dir.path().join("good.zip"),
            &[("SPY_full_1hour_adjsplitdiv.txt", "...")],
        );

        let tickers = discover_tickers(dir.path()).unwrap();
        assert_eq!(tickers.keys().cloned().collect::<Vec<_>>(), ["SPY"]);
    }

    #[test]
    fn extract_round_trips_contents() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("data.zip");
        write_zip(&zip_path, &[("sub/QQQ_full_1hour_adjsplitdiv.txt", "1,2,3")]);

        let out = dir.path().join("out");
        extract_zip(&zip_path, &out).unwrap();
        let content =
            fs::read_to_string(out.join("sub/QQQ_full_1hour_adjsplitdiv.txt")).unwrap();
        assert_eq!(content, "1,2,3");
    }
}
