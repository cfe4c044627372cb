// Local mirror: persisted key-value copies of the remote collections
// Used as the fallback data source whenever the remote API is unreachable

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::{Mutex, RwLock};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Collection;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid mirror key: {0}")]
    InvalidKey(String),
}

// Stats for the mirror
#[derive(Debug, Default, Clone)]
pub struct MirrorStats {
    pub size_bytes: usize,
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub write_count: usize,
    pub remove_count: usize,
    pub average_lookup_time_ns: u128,
    pub total_lookups: usize,
}

// Mirror configuration options
#[derive(Debug, Clone, Default)]
pub struct MirrorConfig {
    // Directory for the file-backed mirror; None keeps everything in memory
    pub dir: Option<PathBuf>,
}

impl MirrorConfig {
    pub fn in_memory() -> Self {
        Self { dir: None }
    }

    pub fn on_disk(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    // Open the store this configuration describes
    pub fn open(&self) -> Result<Arc<dyn MirrorStore>, MirrorError> {
        match &self.dir {
            Some(dir) => Ok(Arc::new(FileMirror::open(dir)?)),
            None => Ok(Arc::new(MemoryMirror::new())),
        }
    }
}

// Raw key-value store behind the mirror. Values are JSON documents.
pub trait MirrorStore: Send + Sync + 'static {
    // Fetch the raw JSON stored under key
    fn get(&self, key: &str) -> Option<String>;

    // Store (overwrite) the raw JSON under key
    fn put(&self, key: &str, value: String) -> Result<(), MirrorError>;

    // Remove a key, returns true if it existed
    fn remove(&self, key: &str) -> Result<bool, MirrorError>;

    // All keys currently stored
    fn keys(&self) -> Vec<String>;

    fn stats(&self) -> MirrorStats;

    // Remove every key starting with prefix (all keys for None)
    fn invalidate(&self, prefix: Option<&str>) -> Result<usize, MirrorError> {
        let mut removed = 0;
        for key in self.keys() {
            if prefix.map_or(true, |p| key.starts_with(p)) && self.remove(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// Mirror key for a collection, with the language for translations
pub fn create_mirror_key(collection: Collection, language: Option<&str>) -> String {
    match language {
        Some(lang) => format!("{}:{}", collection.path(), lang),
        None => collection.path().to_string(),
    }
}

pub fn calculate_item_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

fn validate_key(key: &str) -> Result<(), MirrorError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(MirrorError::InvalidKey(key.to_string()))
    }
}

// Shared bookkeeping for both store kinds
#[derive(Default)]
struct StatsTracker {
    stats: RwLock<MirrorStats>,
}

impl StatsTracker {
    fn record_lookup(&self, started: Instant, hit: bool) {
        let elapsed = started.elapsed().as_nanos();
        let mut stats = self.stats.write();
        stats.total_lookups += 1;
        if hit {
            stats.hit_count += 1;
        } else {
            stats.miss_count += 1;
        }
        let n = stats.total_lookups as u128;
        stats.average_lookup_time_ns = (stats.average_lookup_time_ns * (n - 1) + elapsed) / n;
    }

    fn record_put(&self, key: &str, old: Option<&str>, new: &str) {
        let mut stats = self.stats.write();
        stats.write_count += 1;
        match old {
            Some(old) => {
                stats.size_bytes = stats.size_bytes.saturating_sub(calculate_item_size(key, old));
            }
            None => stats.items_count += 1,
        }
        stats.size_bytes += calculate_item_size(key, new);
    }

    fn record_remove(&self, key: &str, old: &str) {
        let mut stats = self.stats.write();
        stats.remove_count += 1;
        stats.items_count = stats.items_count.saturating_sub(1);
        stats.size_bytes = stats.size_bytes.saturating_sub(calculate_item_size(key, old));
    }

    fn snapshot(&self) -> MirrorStats {
        self.stats.read().clone()
    }
}

// In-memory mirror, lost on drop. Used for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryMirror {
    store: DashMap<String, String>,
    tracker: StatsTracker,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MirrorStore for MemoryMirror {
    fn get(&self, key: &str) -> Option<String> {
        let start = Instant::now();
        let value = self.store.get(key).map(|v| v.value().clone());
        self.tracker.record_lookup(start, value.is_some());
        value
    }

    fn put(&self, key: &str, value: String) -> Result<(), MirrorError> {
        validate_key(key)?;
        // stats are updated under the entry's shard lock
        match self.store.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let old = entry.insert(value.clone());
                self.tracker.record_put(key, Some(&old), &value);
            }
            Entry::Vacant(entry) => {
                self.tracker.record_put(key, None, &value);
                entry.insert(value);
            }
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, MirrorError> {
        match self.store.remove(key) {
            Some((k, old)) => {
                self.tracker.record_remove(&k, &old);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn keys(&self) -> Vec<String> {
        self.store.iter().map(|e| e.key().clone()).collect()
    }

    fn stats(&self) -> MirrorStats {
        self.tracker.snapshot()
    }
}

// File-backed mirror: one JSON file per key inside a directory.
// Reads are served from an in-memory index loaded at open.
pub struct FileMirror {
    dir: PathBuf,
    index: DashMap<String, String>,
    write_lock: Mutex<()>,
    tracker: StatsTracker,
}

impl FileMirror {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, MirrorError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mirror = Self {
            dir,
            index: DashMap::new(),
            write_lock: Mutex::new(()),
            tracker: StatsTracker::default(),
        };

        for entry in fs::read_dir(&mirror.dir)? {
            let path = entry?.path();
            let Some(key) = Self::key_for(&path) else {
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(content) => {
                    mirror.tracker.record_put(&key, None, &content);
                    mirror.index.insert(key, content);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable mirror file"),
            }
        }

        debug!(dir = %mirror.dir.display(), items = mirror.index.len(), "opened file mirror");
        Ok(mirror)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key.replace(':', ".")))
    }

    fn key_for(path: &Path) -> Option<String> {
        if path.extension()? != "json" {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let key = stem.replace('.', ":");
        validate_key(&key).ok().map(|_| key)
    }
}

impl MirrorStore for FileMirror {
    fn get(&self, key: &str) -> Option<String> {
        let start = Instant::now();
        let value = self.index.get(key).map(|v| v.value().clone());
        self.tracker.record_lookup(start, value.is_some());
        value
    }

    fn put(&self, key: &str, value: String) -> Result<(), MirrorError> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        // write a sibling temp file and rename over the target
        let target = self.path_for(key);
        let tmp = target.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &target)?;

        let old = self.index.insert(key.to_string(), value.clone());
        self.tracker.record_put(key, old.as_deref(), &value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, MirrorError> {
        let _guard = self.write_lock.lock();
        let Some((k, old)) = self.index.remove(key) else {
            return Ok(false);
        };
        match fs::remove_file(self.path_for(&k)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.tracker.record_remove(&k, &old);
        Ok(true)
    }

    fn keys(&self) -> Vec<String> {
        self.index.iter().map(|e| e.key().clone()).collect()
    }

    fn stats(&self) -> MirrorStats {
        self.tracker.snapshot()
    }
}

// Typed view over a MirrorStore
#[derive(Clone)]
pub struct LocalMirror {
    store: Arc<dyn MirrorStore>,
}

impl LocalMirror {
    pub fn new(store: Arc<dyn MirrorStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryMirror::new()))
    }

    pub fn store(&self) -> &Arc<dyn MirrorStore> {
        &self.store
    }

    // Decode whatever is stored under key; Ok(None) when nothing is
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, MirrorError> {
        match self.store.get(key) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), MirrorError> {
        let raw = serde_json::to_string(value)?;
        self.store.put(key, raw)
    }

    pub fn remove(&self, key: &str) -> Result<bool, MirrorError> {
        self.store.remove(key)
    }

    pub fn read_collection<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Option<Vec<T>>, MirrorError> {
        self.read(&create_mirror_key(collection, None))
    }

    pub fn write_collection<T: Serialize>(
        &self,
        collection: Collection,
        records: &[T],
    ) -> Result<(), MirrorError> {
        self.write(&create_mirror_key(collection, None), records)
    }

    pub fn invalidate(&self, prefix: Option<&str>) -> Result<usize, MirrorError> {
        self.store.invalidate(prefix)
    }

    pub fn stats(&self) -> MirrorStats {
        self.store.stats()
    }
}
