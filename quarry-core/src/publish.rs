//! Atomic artifact publishing.
//!
//! Steps never write their final path directly. A new artifact is built
//! under a staging name (`<dest>.tmp` for files, `<dest>_building` for
//! partitioned directories), then swapped in: any existing artifact is
//! renamed aside to `<dest>_old`, the staged artifact is renamed into
//! place, and the backup is deleted. Residue from an interrupted swap
//! is removed by [`cleanup_stale_artifacts`] at the start of the next
//! run, so the final path always holds either the old artifact or the
//! complete new one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Staging path for a single-file artifact: `<dest>.tmp`.
pub fn staging_path(dest: &Path) -> PathBuf {
    suffixed(dest, ".tmp")
}

/// Staging directory for a partitioned artifact: `<dest>_building`.
pub fn building_dir(dest: &Path) -> PathBuf {
    suffixed(dest, "_building")
}

fn backup_path(dest: &Path) -> PathBuf {
    suffixed(dest, "_old")
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Swap a staged artifact into its final path. Works uniformly for
/// files and directory trees.
pub fn publish(staged: &Path, dest: &Path) -> io::Result<()> {
    if dest.symlink_metadata().is_ok() {
        let backup = backup_path(dest);
        remove_path(&backup)?;
        fs::rename(dest, &backup)?;
        fs::rename(staged, dest)?;
        remove_path(&backup)?;
    } else {
        fs::rename(staged, dest)?;
    }
    Ok(())
}

/// Remove leftover staging/backup residue from interrupted runs: any
/// direct child of the output directory whose name ends in `.tmp`,
/// `_old`, or `_building`, or starts with `_`.
pub fn cleanup_stale_artifacts(output_dir: &Path) -> io::Result<()> {
    if !output_dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(output_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(".tmp")
            || name.ends_with("_old")
            || name.ends_with("_building")
            || name.starts_with('_')
        {
            info!("cleaning stale artifact: {}", name);
            remove_path(&entry.path())?;
        }
    }
    Ok(())
}

fn remove_path(path: &Path) -> io::Result<()> {
    match path.symlink_metadata() {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn publish_file_without_existing_artifact() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("tickers.parquet");
        let staged = staging_path(&dest);
        fs::write(&staged, "new").unwrap();

        publish(&staged, &dest).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
        assert!(!staged.exists());
    }

    #[test]
    fn publish_file_replaces_and_removes_backup() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("tickers.parquet");
        fs::write(&dest, "old").unwrap();
        let staged = staging_path(&dest);
        fs::write(&staged, "new").unwrap();

        publish(&staged, &dest).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
        assert!(!staged.exists());
        assert!(!dir.path().join("tickers.parquet_old").exists());
    }

    #[test]
    fn publish_directory_swaps_partitions() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("prices");
        fs::create_dir_all(dest.join("year=2020")).unwrap();
        fs::write(dest.join("year=2020/data.parquet"), "old").unwrap();

        let building = building_dir(&dest);
        fs::create_dir_all(building.join("year=2021")).unwrap();
        fs::write(building.join("year=2021/data.parquet"), "new").unwrap();

        publish(&building, &dest).unwrap();

        assert!(dest.join("year=2021/data.parquet").exists());
        assert!(!dest.join("year=2020").exists());
        assert!(!building.exists());
        assert!(!dir.path().join("prices_old").exists());
    }

    #[test]
    fn cleanup_removes_all_residue_shapes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("market_cap.parquet.tmp"), "").unwrap();
        fs::create_dir_all(dir.path().join("prices_old")).unwrap();
        fs::create_dir_all(dir.path().join("daily_aggs_building")).unwrap();
        fs::create_dir_all(dir.path().join("_prices_temp_fragments")).unwrap();
        fs::write(dir.path().join("tickers.parquet"), "keep").unwrap();

        cleanup_stale_artifacts(dir.path()).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["tickers.parquet"]);
    }

    #[test]
    fn cleanup_of_missing_directory_is_a_noop() {
        let dir = TempDir::new().unwrap();
        cleanup_stale_artifacts(&dir.path().join("db")).unwrap();
    }

    #[test]
    fn interrupted_publish_recovers_after_cleanup_and_rerun() {
        // Crash simulation: staged artifact present, final missing,
        // backup still around.
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("tickers.parquet");
        fs::write(staging_path(&dest), "half-built").unwrap();
        fs::write(backup_path(&dest), "previous").unwrap();

        cleanup_stale_artifacts(dir.path()).unwrap();
        assert!(!staging_path(&dest).exists());
        assert!(!backup_path(&dest).exists());

        // Rerun: build and publish again.
        let staged = staging_path(&dest);
        fs::write(&staged, "rebuilt").unwrap();
        publish(&staged, &dest).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["tickers.parquet"]);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "rebuilt");
    }
}
