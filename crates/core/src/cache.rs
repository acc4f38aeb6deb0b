use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// Persisted knowledge about one already-processed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub mod_time: f64,
    pub size: u64,
    pub chunks: u64,
}

/// Path → (mtime, size, chunk count) map backing skip-unchanged-file runs.
///
/// Ownership is single-writer: only the scheduler thread mutates this,
/// regardless of execution mode. A missing or corrupt cache file degrades
/// to an empty map; flush failures degrade to a warning. Entries for files
/// that no longer exist are kept as-is.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

impl CacheStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(error) => {
                    warn!(path = %path.display(), %error, "cache file corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cache file yet");
                HashMap::new()
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "cache file unreadable, starting empty");
                HashMap::new()
            }
        };

        Self { path, entries }
    }

    /// True iff the cached mtime is at least as new as the on-disk one.
    pub fn should_skip(&self, path: &Path, mtime: f64) -> bool {
        self.entries
            .get(&key_for(path))
            .is_some_and(|entry| entry.mod_time >= mtime)
    }

    pub fn record(&mut self, path: &Path, mtime: f64, size: u64, chunks: u64) {
        self.entries.insert(
            key_for(path),
            CacheEntry {
                mod_time: mtime,
                size,
                chunks,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrite the cache file via temp-file-then-rename. Never fatal.
    pub fn flush(&self) {
        if let Err(error) = self.try_flush() {
            warn!(path = %self.path.display(), %error, "cache flush failed");
        }
    }

    fn try_flush(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let payload = serde_json::to_string_pretty(&self.entries)?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, payload)?;
        fs::rename(&staging, &self.path)
    }
}

fn key_for(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Filesystem mtime as epoch seconds; clamps to zero on clock weirdness.
pub fn modified_timestamp(metadata: &fs::Metadata) -> f64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_cache_file_loads_empty() {
        let cache = CacheStore::load("/nonexistent/dir/cache.json");
        assert!(cache.is_empty());
    }

    #[test]
    fn corrupt_cache_file_loads_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json")?;

        let cache = CacheStore::load(&path);
        assert!(cache.is_empty());
        Ok(())
    }

    #[test]
    fn flush_then_load_round_trips_entries() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let cache_path = dir.path().join("cache.json");

        let mut cache = CacheStore::load(&cache_path);
        cache.record(Path::new("/data/a.txt"), 100.5, 42, 3);
        cache.record(Path::new("/data/b.txt"), 200.0, 7, 1);
        cache.flush();

        let reloaded = CacheStore::load(&cache_path);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.should_skip(Path::new("/data/a.txt"), 100.5));
        assert!(reloaded.should_skip(Path::new("/data/a.txt"), 99.0));
        assert!(!reloaded.should_skip(Path::new("/data/a.txt"), 101.0));
        Ok(())
    }

    #[test]
    fn unknown_path_is_never_skipped() {
        let cache = CacheStore::load("/nonexistent/cache.json");
        assert!(!cache.should_skip(Path::new("/data/new.txt"), 1.0));
    }

    #[test]
    fn flush_creates_parent_directories() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let cache_path = dir.path().join("nested").join("deep").join("cache.json");

        let mut cache = CacheStore::load(&cache_path);
        cache.record(Path::new("/data/a.txt"), 1.0, 1, 1);
        cache.flush();

        assert!(cache_path.exists());
        Ok(())
    }
}
