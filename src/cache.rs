//! Persistent company cache
//!
//! Holds the merged set of company records behind a staleness policy. The
//! in-memory store is an `Arc` snapshot swapped on every merge, so readers
//! never observe a half-applied merge. Durable state goes through the
//! [`CacheStorage`] seam: a JSON file for the proxy server, an in-memory
//! slot for session-scoped clients.

use crate::company::{fold, CompanyRecord};
use crate::error::AppError;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default time-to-live for a cache: 7 days
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Fraction of the TTL after which clients refresh in the background
pub const REFRESH_FRACTION: f64 = 0.8;

/// Durable cache contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStore {
    pub cached_companies: Vec<CompanyRecord>,
    /// Epoch milliseconds of the last successful merge
    pub last_updated: i64,
}

impl CacheStore {
    /// Non-empty and younger than `ttl` at `now_ms`
    pub fn is_valid_at(&self, now_ms: i64, ttl: Duration) -> bool {
        !self.cached_companies.is_empty() && now_ms.saturating_sub(self.last_updated) < ttl_millis(ttl)
    }

    /// Time since the last merge; zero if the clock went backwards
    pub fn age_at(&self, now_ms: i64) -> Duration {
        let age = now_ms.saturating_sub(self.last_updated).max(0);
        Duration::from_millis(age as u64)
    }

    /// Drop records whose name key was already seen, returning how many went
    fn dedup(&mut self) -> usize {
        let before = self.cached_companies.len();
        let mut seen = HashSet::with_capacity(before);
        self.cached_companies
            .retain(|record| !record.name.trim().is_empty() && seen.insert(record.key()));
        before - self.cached_companies.len()
    }
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Durable backing for a cache
pub trait CacheStorage: Send + Sync {
    /// Read the stored document, `None` if nothing has been stored yet
    fn read(&self) -> Result<Option<String>, AppError>;
    /// Replace the stored document; readers see the old or the new one, never a mix
    fn write(&self, contents: &str) -> Result<(), AppError>;
    /// Human-readable location for logs
    fn location(&self) -> String;
}

/// JSON file on disk, replaced atomically via temp file + rename
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

}

impl CacheStorage for FileStorage {
    fn read(&self) -> Result<Option<String>, AppError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(Some(contents))
    }

    fn write(&self, contents: &str) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let lock_path = self.path.with_extension("json.lock");

        // Serialize writers across processes sharing the file
        let lock_file = fs::File::create(&lock_path)?;
        lock_file.lock_exclusive()?;

        let result = (|| -> Result<(), AppError> {
            let mut tmp = fs::File::create(&tmp_path)?;
            tmp.write_all(contents.as_bytes())?;
            tmp.sync_all()?;
            fs::rename(&tmp_path, &self.path)?;
            Ok(())
        })();

        // The lock file stays so every writer locks the same inode
        lock_file.unlock()?;

        result
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Session-scoped key/value slot; contents live as long as the value
#[derive(Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(contents.into())),
        }
    }
}

impl CacheStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, AppError> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn write(&self, contents: &str) -> Result<(), AppError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Company cache with dedup-on-insert merge and a staleness policy
pub struct CompanyCache {
    storage: Box<dyn CacheStorage>,
    ttl: Duration,
    snapshot: RwLock<Arc<CacheStore>>,
    /// Single-writer section for merges
    writer: Mutex<()>,
}

impl CompanyCache {
    /// Open a cache, loading whatever the storage holds
    pub fn open(storage: Box<dyn CacheStorage>, ttl: Duration) -> Self {
        let (store, dropped) = Self::load(storage.as_ref());
        let cache = Self {
            storage,
            ttl,
            snapshot: RwLock::new(Arc::new(store)),
            writer: Mutex::new(()),
        };

        if dropped > 0 {
            warn!(
                "Dropped {} duplicate companies from {}",
                dropped,
                cache.storage.location()
            );
            if let Err(e) = cache.save() {
                warn!("Failed to rewrite deduplicated cache: {}", e);
            }
        }

        cache
    }

    /// Read durable state; a missing or unreadable store is empty
    ///
    /// Also returns how many duplicate records were dropped while loading.
    pub fn load(storage: &dyn CacheStorage) -> (CacheStore, usize) {
        let contents = match storage.read() {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                debug!("No cache at {}, starting empty", storage.location());
                return (CacheStore::default(), 0);
            }
            Err(e) => {
                warn!("Error loading cache from {}: {}", storage.location(), e);
                return (CacheStore::default(), 0);
            }
        };

        match serde_json::from_str::<CacheStore>(&contents) {
            Ok(mut store) => {
                let dropped = store.dedup();
                info!(
                    "Loaded {} companies from cache at {}",
                    store.cached_companies.len(),
                    storage.location()
                );
                (store, dropped)
            }
            Err(e) => {
                warn!("Ignoring corrupt cache at {}: {}", storage.location(), e);
                (CacheStore::default(), 0)
            }
        }
    }

    /// Write the current snapshot to storage unchanged
    pub fn save(&self) -> Result<(), AppError> {
        let store = self.snapshot();
        let json = serde_json::to_string_pretty(store.as_ref())?;
        self.storage.write(&json)?;
        debug!(
            "Saved {} companies to {}",
            store.cached_companies.len(),
            self.storage.location()
        );
        Ok(())
    }

    /// Current contents; later merges do not affect the returned value
    pub fn snapshot(&self) -> Arc<CacheStore> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().cached_companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_updated(&self) -> i64 {
        self.snapshot().last_updated
    }

    pub fn all_records(&self) -> Vec<CompanyRecord> {
        self.snapshot().cached_companies.clone()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_millis())
    }

    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.snapshot().is_valid_at(now_ms, self.ttl)
    }

    pub fn age(&self) -> Duration {
        self.snapshot().age_at(now_millis())
    }

    /// Whether a populated store is past its refresh point but not yet expired
    ///
    /// An expired store is reloaded in the foreground instead.
    pub fn needs_refresh_at(&self, now_ms: i64) -> bool {
        let store = self.snapshot();
        let threshold = self.ttl.mul_f64(REFRESH_FRACTION);
        let age = store.age_at(now_ms);
        !store.cached_companies.is_empty() && age > threshold && age <= self.ttl
    }

    /// Cheap precheck: names containing the query, or with a word starting with it
    pub fn search(&self, query: &str) -> Vec<CompanyRecord> {
        let q = fold(query);
        if q.is_empty() {
            return Vec::new();
        }

        self.snapshot()
            .cached_companies
            .iter()
            .filter(|record| {
                let name = record.key();
                name.contains(&q) || name.split_whitespace().any(|word| word.starts_with(&q))
            })
            .cloned()
            .collect()
    }

    /// Add records whose names are not cached yet; returns how many were added
    pub fn merge(&self, records: &[CompanyRecord]) -> usize {
        self.merge_at(records, now_millis())
    }

    pub fn merge_at(&self, records: &[CompanyRecord], now_ms: i64) -> usize {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.snapshot();
        let mut existing: HashSet<String> =
            current.cached_companies.iter().map(CompanyRecord::key).collect();

        let mut merged = current.cached_companies.clone();
        for record in records {
            if record.name.trim().is_empty() {
                continue;
            }
            if existing.insert(record.key()) {
                merged.push(record.clone());
            }
        }

        let added = merged.len() - current.cached_companies.len();
        if added == 0 {
            return 0;
        }

        let store = Arc::new(CacheStore {
            cached_companies: merged,
            last_updated: now_ms,
        });
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = store;
        info!("Added {} new companies to cache", added);

        // The in-memory store stays authoritative; the next merge retries the write
        if let Err(e) = self.save() {
            warn!("Error saving cache to {}: {}", self.storage.location(), e);
        }

        added
    }
}
