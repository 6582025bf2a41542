//! Disk Cache Module
//!
//! Persistent tier: one bincode blob per entry plus a SQLite metadata index.
//! Every file insertion or removal is paired with its index update under the
//! same lock, and the index is authoritative for sizes and recency.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cache::entry::{resolve_expiry, EntryInfo, Metadata};
use crate::cache::index::{BlobRef, MetadataIndex};
use crate::cache::stats::{ratio, CacheCounters, DiskStats};
use crate::error::{CacheError, Result};

/// File name of the metadata index inside the cache root.
pub const INDEX_FILENAME: &str = "cache_index.sqlite3";

const BLOB_EXTENSION: &str = "bin";
const TMP_SUFFIX: &str = ".tmp";

/// Blob file name for `key`: hex SHA-256 of the key.
pub fn blob_filename(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{}.{}", hex::encode(digest), BLOB_EXTENSION)
}

fn is_blob_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext == BLOB_EXTENSION)
}

/// Removes a file, treating "already gone" as success.
fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

// == Repair Report ==
/// What `DiskCache::repair` had to fix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Index rows dropped because their blob was missing
    pub missing_files: usize,
    /// Blob files deleted because no row referenced them
    pub orphan_files: usize,
    /// Interrupted writes cleaned up
    pub temp_files: usize,
    /// Rows whose recorded size disagreed with the file
    pub sizes_corrected: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug)]
struct DiskState {
    index: MetadataIndex,
    counters: CacheCounters,
}

// == Disk Cache ==
/// Thread-safe persistent cache tier rooted at a directory.
///
/// The whole check, evict and write sequence of each call runs under one
/// mutex; SQLite transactions alone would not keep concurrent callers from
/// interleaving between those steps.
#[derive(Debug)]
pub struct DiskCache {
    root: PathBuf,
    max_size_bytes: u64,
    default_ttl: Option<Duration>,
    state: Mutex<DiskState>,
}

impl DiskCache {
    // == Constructor ==
    /// Opens the disk tier at `root`, creating it if needed.
    ///
    /// Runs [`DiskCache::repair`] once so that state left by a crash or by
    /// out-of-band edits is reconciled before the first lookup.
    pub fn open(
        root: impl AsRef<Path>,
        max_size_bytes: u64,
        default_ttl: Option<Duration>,
    ) -> Result<Self> {
        if max_size_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "disk cache max_size_bytes must be non-zero".to_string(),
            ));
        }

        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let index = MetadataIndex::open(&root.join(INDEX_FILENAME))?;

        let cache = Self {
            root,
            max_size_bytes,
            default_ttl,
            state: Mutex::new(DiskState {
                index,
                counters: CacheCounters::new(),
            }),
        };

        let report = cache.repair()?;
        info!(
            dir = %cache.root.display(),
            max_size_bytes,
            repaired = !report.is_clean(),
            "disk cache opened"
        );
        Ok(cache)
    }

    // == Get ==
    /// Reads and decodes the value stored under `key`.
    ///
    /// Expired rows are purged first. A row whose blob is missing or fails to
    /// decode is removed along with the blob and reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self.get_with_info(key)?.map(|(value, _)| value))
    }

    /// Like [`DiskCache::get`], also returning the entry's bookkeeping as it
    /// was before this read.
    pub fn get_with_info<T: DeserializeOwned>(&self, key: &str) -> Result<Option<(T, EntryInfo)>> {
        let now = Utc::now();
        let mut state = self.state.lock();
        self.purge_expired_locked(&mut state, now)?;

        let Some(row) = state.index.get(key)? else {
            state.counters.record_miss();
            return Ok(None);
        };

        let path = self.root.join(&row.filename);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(key = %key, file = %row.filename, "disk cache blob missing, dropping index row");
                state.index.remove(key)?;
                state.counters.record_miss();
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        match bincode::deserialize::<T>(&bytes) {
            Ok(value) => {
                state.index.touch(key, now)?;
                state.counters.record_hit();
                debug!(key = %key, "disk cache hit");
                Ok(Some((value, row.info)))
            }
            Err(err) => {
                warn!(key = %key, error = %err, "disk cache blob corrupted, removing entry");
                self.remove_locked(&state, &row.filename, key)?;
                state.counters.record_miss();
                Ok(None)
            }
        }
    }

    // == Set ==
    /// Encodes `value` and stores it under `key`, replacing any existing entry.
    ///
    /// Returns `Ok(false)` when the encoded value is larger than the whole
    /// tier. On any error the previous blob and row for `key` are untouched.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        metadata: Option<Metadata>,
    ) -> Result<bool> {
        let bytes = match bincode::serialize(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to encode value for disk cache");
                return Err(err.into());
            }
        };
        let size_bytes = bytes.len() as u64;
        if size_bytes > self.max_size_bytes {
            debug!(
                key = %key,
                size = size_bytes,
                limit = self.max_size_bytes,
                "value larger than disk cache, not caching"
            );
            return Ok(false);
        }

        let filename = blob_filename(key);
        let final_path = self.root.join(&filename);
        let tmp_path = self.root.join(format!("{}{}", filename, TMP_SUFFIX));

        let now = Utc::now();
        let info = EntryInfo::new(
            key.to_string(),
            size_bytes,
            now,
            resolve_expiry(now, ttl, self.default_ttl),
            metadata.unwrap_or_default(),
        );

        let mut state = self.state.lock();
        if let Err(err) = fs::write(&tmp_path, &bytes) {
            let _ = remove_if_exists(&tmp_path);
            return Err(err.into());
        }

        if let Err(err) = state
            .index
            .upsert_with(&info, &filename, || fs::rename(&tmp_path, &final_path))
        {
            let _ = remove_if_exists(&tmp_path);
            return Err(err);
        }

        self.evict_locked(&mut state)?;
        debug!(key = %key, size = size_bytes, "disk cache stored entry");
        Ok(true)
    }

    // == Delete ==
    /// Removes the blob and row for `key`. Returns true if an entry existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let state = self.state.lock();
        match state.index.get(key)? {
            Some(row) => {
                self.remove_locked(&state, &row.filename, key)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // == Clear ==
    /// Removes every blob and every index row.
    pub fn clear(&self) -> Result<()> {
        let state = self.state.lock();
        for blob in state.index.by_recency()? {
            remove_if_exists(&self.root.join(&blob.filename))?;
        }
        state.index.clear()?;
        for name in self.blob_files()? {
            remove_if_exists(&self.root.join(name))?;
        }
        info!(dir = %self.root.display(), "disk cache cleared");
        Ok(())
    }

    // == Purge Expired ==
    /// Removes every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let mut state = self.state.lock();
        self.purge_expired_locked(&mut state, Utc::now())
    }

    /// True if `key` has an unexpired row. Does not affect recency.
    pub fn contains(&self, key: &str) -> Result<bool> {
        let now = Utc::now();
        let state = self.state.lock();
        Ok(state
            .index
            .get(key)?
            .is_some_and(|row| !row.info.is_expired_at(now)))
    }

    /// Bookkeeping for `key` without counting as an access.
    pub fn entry_info(&self, key: &str) -> Result<Option<EntryInfo>> {
        Ok(self.state.lock().index.get(key)?.map(|row| row.info))
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.state.lock().index.keys()
    }

    pub fn len(&self) -> Result<usize> {
        self.state.lock().index.count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the blob that holds (or would hold) `key`.
    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(blob_filename(key))
    }

    // == Stats ==
    /// Returns current disk tier statistics.
    pub fn stats(&self) -> Result<DiskStats> {
        let state = self.state.lock();
        let total_size_bytes = state.index.total_size()?;
        Ok(DiskStats {
            entry_count: state.index.count()?,
            file_count: self.blob_files()?.len(),
            total_size_bytes,
            max_size_bytes: self.max_size_bytes,
            size_utilization: ratio(total_size_bytes, self.max_size_bytes),
            cache_dir: self.root.clone(),
            counters: state.counters,
        })
    }

    // == Repair ==
    /// Reconciles the index with the directory contents.
    ///
    /// Drops rows whose blob is gone, deletes blobs no row references,
    /// deletes leftover temporary files and re-syncs recorded sizes with
    /// file lengths. Not part of the steady-state path.
    pub fn repair(&self) -> Result<RepairReport> {
        let mut state = self.state.lock();
        let mut report = RepairReport::default();
        let mut referenced = HashSet::new();

        for blob in state.index.by_recency()? {
            match fs::metadata(self.root.join(&blob.filename)) {
                Ok(meta) => {
                    if meta.len() != blob.size_bytes {
                        state.index.set_size(&blob.key, meta.len())?;
                        report.sizes_corrected += 1;
                    }
                    referenced.insert(blob.filename);
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    state.index.remove(&blob.key)?;
                    report.missing_files += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }

        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.ends_with(TMP_SUFFIX) {
                remove_if_exists(&self.root.join(&name))?;
                report.temp_files += 1;
            } else if is_blob_file(&name) && !referenced.contains(&name) {
                remove_if_exists(&self.root.join(&name))?;
                report.orphan_files += 1;
            }
        }

        self.evict_locked(&mut state)?;

        if !report.is_clean() {
            info!(dir = %self.root.display(), ?report, "disk cache repaired");
        }
        Ok(report)
    }

    // == Internal Helpers ==

    /// Blob file and its row go together. The file is removed first so a
    /// failed removal leaves the row pointing at a file that still exists.
    fn remove_locked(&self, state: &DiskState, filename: &str, key: &str) -> Result<()> {
        remove_if_exists(&self.root.join(filename))?;
        state.index.remove(key)?;
        Ok(())
    }

    fn purge_expired_locked(&self, state: &mut DiskState, now: DateTime<Utc>) -> Result<usize> {
        let expired = state.index.expired(now)?;
        for BlobRef { key, filename, .. } in &expired {
            self.remove_locked(state, filename, key)?;
        }
        if !expired.is_empty() {
            state.counters.record_expirations(expired.len() as u64);
            debug!(count = expired.len(), "disk cache purged expired entries");
        }
        Ok(expired.len())
    }

    /// Drops least recently used entries until the indexed total fits.
    fn evict_locked(&self, state: &mut DiskState) -> Result<()> {
        let mut total = state.index.total_size()?;
        if total <= self.max_size_bytes {
            return Ok(());
        }

        for blob in state.index.by_recency()? {
            if total <= self.max_size_bytes {
                break;
            }
            self.remove_locked(state, &blob.filename, &blob.key)?;
            total -= blob.size_bytes;
            state.counters.record_eviction();
            debug!(key = %blob.key, size = blob.size_bytes, "disk cache evicted entry");
        }
        Ok(())
    }

    fn blob_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if is_blob_file(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir, max: u64) -> DiskCache {
        DiskCache::open(dir.path(), max, None).unwrap()
    }

    #[test]
    fn test_open_rejects_zero_limit() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            DiskCache::open(dir.path(), 0, None),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_blob_filename_is_deterministic() {
        let a = blob_filename("df:s1:load");
        assert_eq!(a, blob_filename("df:s1:load"));
        assert_ne!(a, blob_filename("df:s2:load"));
        assert_eq!(a.len(), 64 + 4);
        assert!(a.ends_with(".bin"));
    }

    #[test]
    fn test_set_and_get() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);

        assert!(cache.set("k", &vec![1.5f64, 2.5], None, None).unwrap());
        let value: Option<Vec<f64>> = cache.get("k").unwrap();

        assert_eq!(value, Some(vec![1.5, 2.5]));
        assert!(cache.blob_path("k").exists());
        assert_eq!(cache.entry_info("k").unwrap().unwrap().access_count, 2);
    }

    #[test]
    fn test_get_with_info_reports_expiry() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);
        cache.set("k", "v", Some(Duration::from_secs(60)), None).unwrap();

        let (value, info) = cache.get_with_info::<String>("k").unwrap().unwrap();

        assert_eq!(value, "v");
        assert_eq!(info.access_count, 1);
        let remaining = info.ttl_remaining().unwrap();
        assert!(remaining > Duration::from_secs(50));
        assert!(remaining <= Duration::from_secs(60));
    }

    #[test]
    fn test_unencodable_value_is_an_error_and_keeps_entry() {
        struct Unencodable;

        impl Serialize for Unencodable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("cannot encode"))
            }
        }

        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);
        cache.set("k", "kept", None, None).unwrap();

        let result = cache.set("k", &Unencodable, None, None);

        assert!(matches!(result, Err(CacheError::Serialization(_))));
        assert_eq!(cache.get::<String>("k").unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn test_get_missing_key() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);

        let value: Option<String> = cache.get("absent").unwrap();
        assert!(value.is_none());
        assert_eq!(cache.stats().unwrap().counters.misses, 1);
    }

    #[test]
    fn test_overwrite_replaces_blob_and_size() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);

        cache.set("k", "short", None, None).unwrap();
        cache.set("k", "considerably longer", None, None).unwrap();

        assert_eq!(cache.get::<String>("k").unwrap().as_deref(), Some("considerably longer"));
        assert_eq!(cache.len().unwrap(), 1);
        let stats = cache.stats().unwrap();
        assert_eq!(stats.file_count, 1);
        assert_eq!(
            stats.total_size_bytes,
            fs::metadata(cache.blob_path("k")).unwrap().len()
        );
    }

    #[test]
    fn test_zero_ttl_is_a_miss_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);

        cache.set("k", "v", Some(Duration::ZERO), None).unwrap();

        assert!(cache.get::<String>("k").unwrap().is_none());
        assert!(!cache.blob_path("k").exists());
        assert_eq!(cache.len().unwrap(), 0);
        assert_eq!(cache.stats().unwrap().counters.expirations, 1);
    }

    #[test]
    fn test_get_purges_other_expired_entries() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);
        cache.set("stale", "v", Some(Duration::ZERO), None).unwrap();
        cache.set("fresh", "v", None, None).unwrap();

        assert!(cache.get::<String>("fresh").unwrap().is_some());

        assert_eq!(cache.keys().unwrap(), vec!["fresh".to_string()]);
        assert!(!cache.blob_path("stale").exists());
    }

    #[test]
    fn test_oversize_value_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 16);

        assert!(!cache.set("big", &vec![0u8; 64], None, None).unwrap());
        assert_eq!(cache.len().unwrap(), 0);
        assert_eq!(cache.stats().unwrap().file_count, 0);
    }

    #[test]
    fn test_lru_eviction() {
        let dir = TempDir::new().unwrap();
        // Each Vec<u8> of 12 bytes encodes to 8 (length) + 12 = 20 bytes
        let cache = open(&dir, 60);

        cache.set("a", &vec![0u8; 12], None, None).unwrap();
        cache.set("b", &vec![0u8; 12], None, None).unwrap();
        cache.set("c", &vec![0u8; 12], None, None).unwrap();
        cache.get::<Vec<u8>>("a").unwrap();
        cache.set("d", &vec![0u8; 12], None, None).unwrap();

        assert!(cache.contains("a").unwrap());
        assert!(!cache.contains("b").unwrap());
        assert!(!cache.blob_path("b").exists());
        assert!(cache.contains("c").unwrap());
        assert!(cache.contains("d").unwrap());
        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_size_bytes, 60);
        assert_eq!(stats.counters.evictions, 1);
    }

    #[test]
    fn test_corrupted_blob_self_heals() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);
        cache.set("k", &vec![1u64, 2, 3], None, None).unwrap();

        fs::write(cache.blob_path("k"), b"\xff").unwrap();

        assert!(cache.get::<Vec<u64>>("k").unwrap().is_none());
        assert!(cache.entry_info("k").unwrap().is_none());
        assert!(!cache.blob_path("k").exists());
    }

    #[test]
    fn test_missing_blob_self_heals() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);
        cache.set("k", "v", None, None).unwrap();

        fs::remove_file(cache.blob_path("k")).unwrap();

        assert!(cache.get::<String>("k").unwrap().is_none());
        assert!(cache.entry_info("k").unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);
        cache.set("k", "v", None, None).unwrap();

        assert!(cache.delete("k").unwrap());
        assert!(!cache.delete("k").unwrap());
        assert!(!cache.blob_path("k").exists());
    }

    #[test]
    fn test_clear_removes_files_and_rows() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);
        cache.set("a", "1", None, None).unwrap();
        cache.set("b", "2", None, None).unwrap();

        cache.clear().unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.file_count, 0);
        assert_eq!(stats.total_size_bytes, 0);
        assert!(dir.path().join(INDEX_FILENAME).exists());
    }

    #[test]
    fn test_repair_reconciles_directory() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);
        cache.set("kept", "value", None, None).unwrap();
        cache.set("lost", "value", None, None).unwrap();

        fs::remove_file(cache.blob_path("lost")).unwrap();
        fs::write(dir.path().join(blob_filename("stray")), b"junk").unwrap();
        fs::write(dir.path().join("half-written.bin.tmp"), b"junk").unwrap();
        fs::write(cache.blob_path("kept"), b"resized blob").unwrap();

        let report = cache.repair().unwrap();

        assert_eq!(
            report,
            RepairReport {
                missing_files: 1,
                orphan_files: 1,
                temp_files: 1,
                sizes_corrected: 1,
            }
        );
        assert_eq!(cache.keys().unwrap(), vec!["kept".to_string()]);
        assert_eq!(cache.stats().unwrap().total_size_bytes, 12);
        assert!(cache.repair().unwrap().is_clean());
    }

    #[test]
    fn test_metadata_persists() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, 1 << 20);
        let mut metadata = Metadata::new();
        metadata.insert("rows".to_string(), serde_json::json!(1200));

        cache.set("k", "v", None, Some(metadata.clone())).unwrap();

        assert_eq!(cache.entry_info("k").unwrap().unwrap().metadata, metadata);
    }
}
