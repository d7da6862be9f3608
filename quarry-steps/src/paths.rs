//! Filesystem layout for raw sources and built artifacts.

use std::path::{Path, PathBuf};

/// DuckDB COPY options used for every Parquet artifact.
pub const PARQUET_SETTINGS: &str = "FORMAT PARQUET, COMPRESSION ZSTD, ROW_GROUP_SIZE 122880";

/// Filename suffix of the hourly bar files inside the vendor ZIPs; the
/// ticker is everything before it.
pub const BAR_FILE_SUFFIX: &str = "_full_1hour_adjsplitdiv.txt";

/// Regular session hours (ET), inclusive. 15 keeps the 3:00-3:59 bar,
/// the last regular one.
pub const REGULAR_HOURS_START: u32 = 9;
pub const REGULAR_HOURS_END: u32 = 15;

/// Well-known paths under a project directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_sources(&self) -> PathBuf {
        self.root.join("data_sources")
    }

    pub fn stocks_zips(&self) -> PathBuf {
        self.data_sources().join("stocks").join("data")
    }

    pub fn etfs_zips(&self) -> PathBuf {
        self.data_sources().join("etfs").join("data")
    }

    pub fn market_cap_csvs(&self) -> PathBuf {
        self.data_sources().join("market_cap").join("data")
    }

    pub fn insider_trades_files(&self) -> PathBuf {
        self.data_sources().join("insider_trades").join("data")
    }

    /// Directory holding the built Parquet artifacts.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("db")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir().join(".build_manifest.json")
    }

    /// Final path of a single-file target.
    pub fn target_file(&self, target: &str) -> PathBuf {
        self.output_dir().join(format!("{target}.parquet"))
    }

    /// Final path of a partitioned directory target.
    pub fn target_dir(&self, target: &str) -> PathBuf {
        self.output_dir().join(target)
    }
}

/// Escape a path for interpolation into single-quoted SQL literals.
pub(crate) fn sql_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "''")
}
