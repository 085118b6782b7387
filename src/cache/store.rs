// Cache store for reading and writing the webmention feed.
// Handles JSON serialization, freshness checks, and atomic filesystem writes.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::error::Result;
use crate::webmention::Feed;

use super::paths::feed_path;

/// Wrapper for cached data with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    /// The cached data.
    pub data: T,
    /// When the data was cached.
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    /// Create a new cached data entry stamped with the current time.
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    /// True while less than `duration` has elapsed since the entry was written.
    /// Timestamps from the future count as fresh.
    pub fn is_valid(&self, duration: Duration) -> bool {
        let elapsed = Utc::now()
            .signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO);

        elapsed < duration
    }
}

/// Filesystem-backed store holding one feed per cache key.
#[derive(Debug, Clone)]
pub struct FeedStore {
    dir: PathBuf,
}

impl FeedStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Read the feed stored under `key`. Missing or unreadable entries are absent.
    pub fn read(&self, key: &str) -> Option<Feed> {
        self.entry(key).map(|cached| cached.data)
    }

    /// Persist `feed` under `key`, stamping it with the current time.
    pub fn write(&self, key: &str, feed: &Feed) -> Result<()> {
        write_cached(&feed_path(&self.dir, key), feed)
    }

    /// Whether an entry exists and was written less than `duration` ago.
    pub fn is_valid(&self, key: &str, duration: Duration) -> bool {
        self.entry(key)
            .is_some_and(|cached| cached.is_valid(duration))
    }

    /// When the entry under `key` was last written.
    pub fn last_written_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entry(key).map(|cached| cached.cached_at)
    }

    /// Delete the entry under `key`.
    pub fn clear(&self, key: &str) -> Result<()> {
        let path = feed_path(&self.dir, key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// The stored entry with its write timestamp, parsed once.
    pub(crate) fn entry(&self, key: &str) -> Option<CachedData<Feed>> {
        let path = feed_path(&self.dir, key);
        match read_cached::<Feed>(&path) {
            Ok(cached) => cached,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable cache entry");
                None
            }
        }
    }
}

/// Read cached JSON data from a file.
pub fn read_cached<T: DeserializeOwned>(path: &Path) -> Result<Option<CachedData<T>>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)?;
    let cached: CachedData<T> = serde_json::from_str(&contents)?;
    Ok(Some(cached))
}

/// Write data to cache as JSON.
pub fn write_cached<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let cached = CachedData::new(data);
    let json = serde_json::to_string(&cached)?;

    // Write atomically via temp file
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webmention::Webmention;
    use tempfile::TempDir;

    fn sample_feed() -> Feed {
        Feed::new(vec![Webmention {
            wm_id: Some(1.into()),
            wm_target: Some("https://example.com/post/".to_string()),
            ..Webmention::default()
        }])
    }

    #[test]
    fn test_write_and_read_feed() {
        let temp_dir = TempDir::new().unwrap();
        let store = FeedStore::new(temp_dir.path());

        store.write("webmentions", &sample_feed()).unwrap();

        assert_eq!(store.read("webmentions"), Some(sample_feed()));
        assert!(store.last_written_at("webmentions").is_some());
        assert!(store.is_valid("webmentions", Duration::from_secs(60)));
    }

    #[test]
    fn test_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FeedStore::new(temp_dir.path().join("missing"));

        assert!(store.read("webmentions").is_none());
        assert!(store.last_written_at("webmentions").is_none());
        assert!(!store.is_valid("webmentions", Duration::MAX));
    }

    #[test]
    fn test_corrupt_entry_reads_as_absent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FeedStore::new(temp_dir.path());
        fs::write(feed_path(temp_dir.path(), "webmentions"), "{ not json").unwrap();

        assert!(store.read("webmentions").is_none());
        assert!(!store.is_valid("webmentions", Duration::MAX));
    }

    #[test]
    fn test_expired_entry() {
        let mut data = CachedData::new("test");

        // Set cached_at to the past
        data.cached_at = Utc::now() - chrono::Duration::seconds(600);

        assert!(!data.is_valid(Duration::from_secs(300)));
        assert!(data.is_valid(Duration::from_secs(3600)));
    }

    #[test]
    fn test_zero_duration_is_never_valid() {
        let data = CachedData::new("test");
        assert!(!data.is_valid(Duration::ZERO));
    }

    #[test]
    fn test_keys_are_independent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FeedStore::new(temp_dir.path());

        store.write("site-a", &sample_feed()).unwrap();

        assert!(store.read("site-a").is_some());
        assert!(store.read("site-b").is_none());
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = FeedStore::new(temp_dir.path());

        store.write("webmentions", &sample_feed()).unwrap();
        store.clear("webmentions").unwrap();
        store.clear("webmentions").unwrap();

        assert!(store.read("webmentions").is_none());
    }
}
