// Credential cache reading and matching
pub mod fingerprint;
pub mod matcher;
pub mod record;

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Default AWS CLI credential cache directory (~/.aws/cli/cache).
pub fn default_cache_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".aws").join("cli").join("cache"))
        .ok_or_else(|| Error::Cache("Could not determine home directory".to_string()))
}

/// Remove every .json record under `cache_dir`, returning how many were
/// deleted. The renewal protocol uses this to force the CLI to mint fresh
/// credentials on the next call.
pub fn clear_cache_files(cache_dir: &Path) -> Result<usize> {
    let mut removed = 0;
    if cache_dir.exists() {
        for entry in fs::read_dir(cache_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                fs::remove_file(path)?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clear_cache_files_only_removes_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        assert_eq!(clear_cache_files(dir.path()).unwrap(), 2);
        assert!(dir.path().join("notes.txt").exists());
        assert!(!dir.path().join("a.json").exists());
    }

    #[test]
    fn test_clear_missing_dir_is_noop() {
        let dir = TempDir::new().unwrap();
        assert_eq!(clear_cache_files(&dir.path().join("nope")).unwrap(), 0);
    }
}
