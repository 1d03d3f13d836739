// Remembered profile -> cache-file assignments
use crate::error::Result;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const SAVE_DEBOUNCE: Duration = Duration::from_secs(2);

/// Persistent map of profile name to credential cache file name.
///
/// Entries are recorded opportunistically whenever the matcher confirms a
/// match and evicted when the target file disappears or goes stale. Saves
/// are debounced; connect/disconnect transitions call [`flush`](Self::flush)
/// so the document survives process termination.
pub struct MappingStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
    save_pending: AtomicBool,
}

impl MappingStore {
    /// Load the mapping document, starting empty if it is missing or
    /// unreadable (a corrupt document is not worth failing startup over).
    pub fn load(path: PathBuf) -> Arc<Self> {
        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), %err, "discarding corrupt mapping document");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };

        Arc::new(Self {
            path,
            entries: Mutex::new(entries),
            save_pending: AtomicBool::new(false),
        })
    }

    pub fn get(&self, profile: &str) -> Option<String> {
        self.lock().get(profile).cloned()
    }

    pub fn insert(self: &Arc<Self>, profile: &str, file_name: &str) {
        let changed = self
            .lock()
            .insert(profile.to_string(), file_name.to_string())
            .as_deref()
            != Some(file_name);
        if changed {
            tracing::debug!(profile, file_name, "remembered cache file for profile");
            self.schedule_save();
        }
    }

    pub fn remove(self: &Arc<Self>, profile: &str) {
        if self.lock().remove(profile).is_some() {
            tracing::debug!(profile, "evicted stale cache mapping");
            self.schedule_save();
        }
    }

    /// Write the document out immediately. Used at critical transitions;
    /// routine mutations go through the debounced path instead.
    pub fn flush(&self) -> Result<()> {
        self.save_pending.store(false, Ordering::SeqCst);
        self.persist()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn schedule_save(self: &Arc<Self>) {
        // Without a runtime (sync callers in tests and one-shot commands)
        // there is nothing to debounce against; write through.
        if tokio::runtime::Handle::try_current().is_err() {
            if let Err(err) = self.flush() {
                tracing::warn!(%err, "failed to persist cache mapping");
            }
            return;
        }

        if self.save_pending.swap(true, Ordering::SeqCst) {
            return;
        }

        let store = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(SAVE_DEBOUNCE).await;
            if store.save_pending.swap(false, Ordering::SeqCst) {
                if let Err(err) = store.persist() {
                    tracing::warn!(%err, "failed to persist cache mapping");
                }
            }
        });
    }

    fn persist(&self) -> Result<()> {
        let snapshot = self.lock().clone();
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_get_remove() {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::load(dir.path().join("mappings.json"));

        assert_eq!(store.get("prod"), None);
        store.insert("prod", "abc123.json");
        assert_eq!(store.get("prod"), Some("abc123.json".to_string()));
        store.remove("prod");
        assert_eq!(store.get("prod"), None);
    }

    #[test]
    fn test_flush_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.json");

        let store = MappingStore::load(path.clone());
        store.insert("prod", "abc123.json");
        store.flush().unwrap();

        let reloaded = MappingStore::load(path);
        assert_eq!(reloaded.get("prod"), Some("abc123.json".to_string()));
    }

    #[test]
    fn test_sync_mutations_write_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.json");

        // No tokio runtime here: insert should persist on its own.
        let store = MappingStore::load(path.clone());
        store.insert("prod", "abc123.json");

        let reloaded = MappingStore::load(path);
        assert_eq!(reloaded.get("prod"), Some("abc123.json".to_string()));
    }

    #[test]
    fn test_corrupt_document_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = MappingStore::load(path);
        assert_eq!(store.get("anything"), None);
    }

    #[test]
    fn test_flush_creates_parent_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("mappings.json");

        let store = MappingStore::load(path.clone());
        store.insert("prod", "abc123.json");
        store.flush().unwrap();
        assert!(path.exists());
    }
}
