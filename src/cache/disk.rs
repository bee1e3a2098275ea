// Persistent disk cache.
// One JSON file per key, each entry carrying its own TTL and a format version.
// Best-effort by contract: every I/O failure downgrades to a miss or no-op,
// so this tier can never surface an error to a caller.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Format tag written into every entry. Bump to invalidate all existing files
/// after an incompatible change to a cached type.
pub const CACHE_VERSION: &str = "1";

/// Fraction of entries removed (oldest first) when the size ceiling is hit.
const EVICTION_FRACTION: f64 = 0.2;

/// On-disk serialization of a cached value. TTLs are stored in milliseconds
/// so sub-second values survive the round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
    pub ttl_ms: u64,
    pub version: String,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
            ttl_ms: ttl.as_millis() as u64,
            version: CACHE_VERSION.to_string(),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.timestamp)
            .to_std()
            .unwrap_or(Duration::MAX)
    }

    /// Remaining logical life, or `None` once expired. The entry's own TTL
    /// is authoritative; a read-time `max_age` can only shorten the effective
    /// window, never extend it.
    pub fn remaining(&self, max_age: Option<Duration>) -> Option<Duration> {
        if self.version != CACHE_VERSION {
            return None;
        }
        let effective = match max_age {
            Some(cap) => self.ttl().min(cap),
            None => self.ttl(),
        };
        effective.checked_sub(self.age()).filter(|left| !left.is_zero())
    }

    pub fn is_expired(&self, max_age: Option<Duration>) -> bool {
        self.remaining(max_age).is_none()
    }
}

/// Aggregate statistics over the cache directory.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size_bytes: u64,
    pub oldest: Option<SystemTime>,
    pub newest: Option<SystemTime>,
}

/// Size-bounded key-value store, one file per key under `dir`.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    max_size_bytes: u64,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>, max_size_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_size_bytes,
        }
    }

    /// Filename derived from a SHA-256 of the key: filesystem-safe by
    /// construction, and two distinct keys can never collide.
    pub(crate) fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{:x}.json", digest))
    }

    /// Read an entry, returning `None` on miss, expiry, or any I/O problem.
    /// An expired entry's file is deleted on the way out.
    pub fn get<T: DeserializeOwned>(&self, key: &str, max_age: Option<Duration>) -> Option<T> {
        self.get_with_remaining(key, max_age).map(|(data, _)| data)
    }

    /// Like [`get`](Self::get), but also reports how much of the entry's TTL
    /// is left, so a warmer tier can adopt the residual life instead of
    /// restarting the clock.
    pub fn get_with_remaining<T: DeserializeOwned>(
        &self,
        key: &str,
        max_age: Option<Duration>,
    ) -> Option<(T, Duration)> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(key, error = %e, "failed to read cache entry");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "corrupt cache entry, discarding");
                remove_quietly(&path);
                return None;
            }
        };

        match entry.remaining(max_age) {
            Some(remaining) => Some((entry.data, remaining)),
            None => {
                debug!(key, "cache entry expired");
                remove_quietly(&path);
                None
            }
        }
    }

    /// Write an entry with the given TTL, evicting old entries first if the
    /// directory has outgrown its ceiling.
    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!(error = %e, "failed to create cache directory");
            return;
        }

        self.evict_if_needed();

        let entry = CacheEntry::new(data, ttl);
        let json = match serde_json::to_string_pretty(&entry) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize cache entry");
                return;
            }
        };

        let path = self.entry_path(key);
        if let Err(e) = write_atomic(&path, json.as_bytes()) {
            warn!(key, error = %e, "failed to write cache entry");
        }
    }

    pub fn delete(&self, key: &str) {
        remove_quietly(&self.entry_path(key));
    }

    /// Remove every entry file. The directory itself is kept.
    pub fn clear(&self) {
        for path in self.entry_files() {
            remove_quietly(&path);
        }
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for path in self.entry_files() {
            let Ok(meta) = fs::metadata(&path) else {
                continue;
            };
            stats.entries += 1;
            stats.total_size_bytes += meta.len();
            if let Ok(modified) = meta.modified() {
                stats.oldest = Some(match stats.oldest {
                    Some(oldest) => oldest.min(modified),
                    None => modified,
                });
                stats.newest = Some(match stats.newest {
                    Some(newest) => newest.max(modified),
                    None => modified,
                });
            }
        }
        stats
    }

    /// Size-triggered batch eviction: when the directory exceeds the ceiling,
    /// delete the oldest fifth of entries by modification time. Coarser than
    /// LRU, but writes are rare relative to reads.
    fn evict_if_needed(&self) {
        let mut files: Vec<(PathBuf, SystemTime, u64)> = Vec::new();
        let mut total: u64 = 0;

        for path in self.entry_files() {
            let Ok(meta) = fs::metadata(&path) else {
                continue;
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            total += meta.len();
            files.push((path, modified, meta.len()));
        }

        if total <= self.max_size_bytes || files.is_empty() {
            return;
        }

        files.sort_by_key(|(_, modified, _)| *modified);
        let evict_count = ((files.len() as f64 * EVICTION_FRACTION).ceil() as usize).max(1);

        let mut freed: u64 = 0;
        for (path, _, size) in files.into_iter().take(evict_count) {
            remove_quietly(&path);
            freed += size;
        }
        debug!(
            evicted = evict_count,
            freed_bytes = freed,
            total_bytes = total,
            "evicted oldest cache entries"
        );
    }

    fn entry_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect()
    }
}

/// Write atomically via temp file so a crash never leaves a torn entry.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove cache file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        x: i32,
    }

    fn cache_in(dir: &TempDir) -> DiskCache {
        DiskCache::new(dir.path(), 100 * 1024 * 1024)
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.set("abc", &TestData { x: 1 }, Duration::from_secs(60));
        let read: Option<TestData> = cache.get("abc", None);
        assert_eq!(read, Some(TestData { x: 1 }));
    }

    #[test]
    fn subsecond_ttl_survives_the_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        // A 900 ms TTL must not truncate to zero on write.
        cache.set("k", &TestData { x: 42 }, Duration::from_millis(900));
        assert_eq!(cache.get::<TestData>("k", None), Some(TestData { x: 42 }));
    }

    #[test]
    fn remaining_life_shrinks_with_age() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.set("k", &TestData { x: 1 }, Duration::from_secs(10));
        std::thread::sleep(Duration::from_millis(100));

        let (_, remaining) = cache.get_with_remaining::<TestData>("k", None).unwrap();
        assert!(remaining < Duration::from_secs(10));
        assert!(remaining > Duration::from_secs(9));
    }

    #[test]
    fn expired_entry_is_deleted_on_read() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.set("abc", &TestData { x: 1 }, Duration::from_millis(20));
        assert_eq!(cache.get::<TestData>("abc", None), Some(TestData { x: 1 }));

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get::<TestData>("abc", None), None);
        assert!(!cache.entry_path("abc").exists());
    }

    #[test]
    fn max_age_only_shortens() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        // A generous stored TTL can be capped at read time...
        cache.set("short", &TestData { x: 1 }, Duration::from_secs(3600));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(
            cache.get::<TestData>("short", Some(Duration::from_millis(1))),
            None
        );

        // ...but an expired entry cannot be revived by a longer max_age.
        cache.set("long", &TestData { x: 2 }, Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(
            cache.get::<TestData>("long", Some(Duration::from_secs(3600))),
            None
        );
    }

    #[test]
    fn version_mismatch_treated_as_expired() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.set("abc", &TestData { x: 1 }, Duration::from_secs(60));
        let path = cache.entry_path("abc");
        let mut entry: CacheEntry<TestData> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        entry.version = "0".to_string();
        fs::write(&path, serde_json::to_string(&entry).unwrap()).unwrap();

        assert_eq!(cache.get::<TestData>("abc", None), None);
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.set("abc", &TestData { x: 1 }, Duration::from_secs(60));
        fs::write(cache.entry_path("abc"), b"{not json").unwrap();

        assert_eq!(cache.get::<TestData>("abc", None), None);
    }

    #[test]
    fn distinct_keys_never_collide_on_disk() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        // These would collide under naive character sanitization.
        assert_ne!(cache.entry_path("cards/a"), cache.entry_path("cards_a"));
        assert_ne!(cache.entry_path("a:b"), cache.entry_path("a_b"));
    }

    #[test]
    fn eviction_removes_oldest_entries() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path(), 2048);

        let payload = "x".repeat(400);
        for i in 0..12 {
            cache.set(&format!("key-{}", i), &payload, Duration::from_secs(60));
            // Distinct mtimes so the oldest-first ordering is deterministic.
            std::thread::sleep(Duration::from_millis(10));
        }

        let stats = cache.stats();
        assert!(stats.entries < 12, "eviction never ran");

        // The survivors are the newest writes.
        assert_eq!(cache.get::<String>("key-11", None), Some(payload));
        assert_eq!(cache.get::<String>("key-0", None), None);
    }

    #[test]
    fn eviction_shrinks_total_size() {
        let dir = TempDir::new().unwrap();
        let payload = "y".repeat(400);

        // Fill well past 1 KiB with a generous ceiling so nothing is evicted.
        let roomy = DiskCache::new(dir.path(), 100 * 1024 * 1024);
        for i in 0..10 {
            roomy.set(&format!("key-{}", i), &payload, Duration::from_secs(60));
            std::thread::sleep(Duration::from_millis(10));
        }
        let before = roomy.stats().total_size_bytes;
        assert!(before > 1024, "fixture never exceeded the ceiling");

        // A write under a small ceiling sweeps the oldest fifth first.
        let bounded = DiskCache::new(dir.path(), 1024);
        bounded.set("one-more", &payload, Duration::from_secs(60));
        let after = bounded.stats().total_size_bytes;

        assert!(after < before, "eviction should shrink the directory");
    }

    #[test]
    fn clear_and_delete() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.set("a", &TestData { x: 1 }, Duration::from_secs(60));
        cache.set("b", &TestData { x: 2 }, Duration::from_secs(60));

        cache.delete("a");
        assert_eq!(cache.get::<TestData>("a", None), None);
        assert_eq!(cache.get::<TestData>("b", None), Some(TestData { x: 2 }));

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn stats_reports_counts_and_sizes() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        assert_eq!(cache.stats().entries, 0);

        cache.set("a", &TestData { x: 1 }, Duration::from_secs(60));
        cache.set("b", &TestData { x: 2 }, Duration::from_secs(60));

        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert!(stats.total_size_bytes > 0);
        assert!(stats.oldest.is_some());
        assert!(stats.newest.is_some());
        assert!(stats.oldest <= stats.newest);
    }

    #[test]
    fn missing_directory_is_a_miss_not_an_error() {
        let cache = DiskCache::new("/nonexistent/hubcache-test", 1024);
        assert_eq!(cache.get::<TestData>("abc", None), None);
        assert_eq!(cache.stats().entries, 0);
        cache.delete("abc");
        cache.clear();
    }
}
