// davbackup/src/utils/mod.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{BackupError, BackupResult};

/// Name of the scratch directory kept next to the executable.
pub const TEMP_DIR_NAME: &str = "tmp";

/// Default temp directory: `tmp` beside the running binary.
pub fn default_temp_dir() -> BackupResult<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| BackupError::config(format!("cannot locate executable: {}", e)))?;
    let parent = exe
        .parent()
        .ok_or_else(|| BackupError::config("executable has no parent directory"))?;
    Ok(parent.join(TEMP_DIR_NAME))
}

/// Creates `dir` with mode 0755 unless it already exists.
pub fn ensure_temp_dir(dir: &Path) -> BackupResult<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir).map_err(|e| {
        BackupError::config(format!(
            "failed to create temp directory {}: {}",
            dir.display(),
            e
        ))
    })?;
    log::debug!("Created temp directory {}", dir.display());
    Ok(())
}

/// Builds the per-job file prefix: the timestamp, optionally followed by the
/// lowercased label. Whitespace, underscores and any other character that is
/// not a letter, digit, `-` or `.` become hyphens, so the prefix is usable as
/// both a file name and a URL path segment.
pub fn derive_prefix(timestamp: i64, label: Option<&str>) -> String {
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(label) => {
            let normalized: String = label
                .to_lowercase()
                .chars()
                .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
                .collect();
            format!("{}-{}", timestamp, normalized)
        }
        None => timestamp.to_string(),
    }
}

/// Deletes a file, ignoring any failure.
pub fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if path.exists() {
            log::warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_defaults_to_timestamp() {
        assert_eq!(derive_prefix(1700000000, None), "1700000000");
        assert_eq!(derive_prefix(1700000000, Some("   ")), "1700000000");
    }

    #[test]
    fn test_prefix_label_is_normalized() {
        assert_eq!(derive_prefix(42, Some("My Backup")), "42-my-backup");
        assert_eq!(derive_prefix(42, Some("Site_DB\tnightly\nrun")), "42-site-db-nightly-run");
    }

    #[test]
    fn test_prefix_label_drops_path_and_url_characters() {
        assert_eq!(derive_prefix(42, Some("Weekly #1")), "42-weekly--1");
        assert_eq!(derive_prefix(42, Some("a/b\\c?d%e:f")), "42-a-b-c-d-e-f");
        assert_eq!(derive_prefix(42, Some("Größe v1.2")), "42-größe-v1.2");
    }

    #[test]
    fn test_ensure_temp_dir_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join(TEMP_DIR_NAME);
        ensure_temp_dir(&dir).unwrap();
        assert!(dir.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
            // umask may only clear bits
            assert_eq!(mode & !0o755, 0);
        }

        // second call is a no-op
        ensure_temp_dir(&dir).unwrap();
    }

    #[test]
    fn test_remove_quietly_ignores_missing_file() {
        let root = tempfile::tempdir().unwrap();
        remove_quietly(&root.path().join("absent.sql"));
    }
}
