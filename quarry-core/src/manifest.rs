//! Persisted build manifest.
//!
//! The manifest is the only durable record of which steps have
//! completed; a step id absent from it is simply pending. The whole
//! document is rewritten atomically after every successful step, so an
//! interrupted run keeps credit for the steps that finished.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::BuildError;

/// Completion record for one step id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub completed_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
}

/// Map from step id to its completion record. BTreeMap keeps the
/// persisted document stable under diffing.
pub type Manifest = BTreeMap<String, ManifestEntry>;

/// Loads and atomically saves the manifest document.
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted manifest; an absent file is an empty manifest
    /// (first run, or after a full rebuild wiped it).
    pub fn load(&self) -> Result<Manifest, BuildError> {
        if !self.path.exists() {
            return Ok(Manifest::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the whole document: serialize to a sibling `.tmp` path,
    /// then rename over the final path. The rename is the only
    /// externally visible mutation, so a crash mid-write never corrupts
    /// an existing manifest.
    pub fn save(&self, manifest: &Manifest) -> Result<(), BuildError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(manifest)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("saved manifest ({} entries)", manifest.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(secs: f64) -> ManifestEntry {
        ManifestEntry {
            completed_at: Utc::now(),
            elapsed_seconds: secs,
        }
    }

    #[test]
    fn load_missing_returns_empty() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));

        let mut manifest = Manifest::new();
        manifest.insert("tickers_v1".into(), entry(1.5));
        manifest.insert("prices_v2".into(), entry(120.0));
        store.save(&manifest).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn save_leaves_no_temporary_file() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));
        store.save(&Manifest::new()).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["manifest.json"]);
    }

    #[test]
    fn save_overwrites_previous_entry() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));

        let mut manifest = Manifest::new();
        manifest.insert("tickers_v1".into(), entry(1.0));
        store.save(&manifest).unwrap();
        manifest.insert("tickers_v1".into(), entry(9.0));
        store.save(&manifest).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["tickers_v1"].elapsed_seconds, 9.0);
    }

    #[test]
    fn save_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("db").join("manifest.json"));
        store.save(&Manifest::new()).unwrap();
        assert!(store.path().exists());
    }
}
