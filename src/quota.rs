//! Daily request quotas shared by concurrent dispatch calls.
//!
//! Counters live behind a [`QuotaStore`] so the reset/persistence policy is a
//! configuration choice: [`MemoryQuotaStore`] forgets everything on restart,
//! [`FileQuotaStore`] keeps today's counts in a JSON file. Both roll counters
//! over at the UTC day boundary.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AdapterError, QuotaError};

const SECS_PER_DAY: u64 = 86_400;

/// Source of the current day number.
pub type DayClock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Days since the Unix epoch, UTC.
pub fn utc_day() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() / SECS_PER_DAY)
        .unwrap_or(0)
}

/// Backend holding per-key daily usage counters.
pub trait QuotaStore: Send + Sync {
    /// Requests already spent today under `key`. Must not perform I/O.
    fn used(&self, key: &str) -> u64;

    /// Atomically reserves one request under `key` if today's usage is below
    /// `limit`. Returns `Ok(false)` when the quota is spent.
    fn try_reserve(&self, key: &str, limit: u64) -> Result<bool, QuotaError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct DayCount {
    day: u64,
    used: u64,
}

impl DayCount {
    fn used_on(&self, today: u64) -> u64 {
        if self.day == today {
            self.used
        } else {
            0
        }
    }
}

fn reserve(counts: &mut HashMap<String, DayCount>, key: &str, limit: u64, today: u64) -> bool {
    let entry = counts.entry(key.to_string()).or_default();
    if entry.day != today {
        *entry = DayCount { day: today, used: 0 };
    }
    if entry.used >= limit {
        return false;
    }
    entry.used += 1;
    true
}

/// In-process quota store; counts reset when the process exits.
pub struct MemoryQuotaStore {
    counts: Mutex<HashMap<String, DayCount>>,
    clock: DayClock,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(utc_day))
    }

    /// Creates a store with a custom day source.
    pub fn with_clock(clock: DayClock) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for MemoryQuotaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaStore for MemoryQuotaStore {
    fn used(&self, key: &str) -> u64 {
        let today = (self.clock)();
        match self.counts.lock() {
            Ok(counts) => counts.get(key).map(|c| c.used_on(today)).unwrap_or(0),
            Err(_) => u64::MAX,
        }
    }

    fn try_reserve(&self, key: &str, limit: u64) -> Result<bool, QuotaError> {
        let today = (self.clock)();
        let mut counts = self.counts.lock().map_err(|_| QuotaError::Poisoned)?;
        Ok(reserve(&mut counts, key, limit, today))
    }
}

/// Quota store persisted as JSON so counts survive restarts within a day.
///
/// Counts are loaded once at open; every reservation rewrites the file while
/// holding the lock. A reservation whose write fails is rolled back.
///
/// The store assumes a single owning process: two processes sharing one file
/// each keep their own in-memory counts and overwrite each other's writes.
pub struct FileQuotaStore {
    path: PathBuf,
    counts: Mutex<HashMap<String, DayCount>>,
    clock: DayClock,
}

impl FileQuotaStore {
    /// Opens (or lazily creates) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QuotaError> {
        Self::open_with_clock(path, Arc::new(utc_day))
    }

    pub fn open_with_clock(path: impl AsRef<Path>, clock: DayClock) -> Result<Self, QuotaError> {
        let path = path.as_ref().to_path_buf();
        let counts = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            HashMap::new()
        };
        debug!("Loaded {} quota counters from {}", counts.len(), path.display());
        Ok(Self {
            path,
            counts: Mutex::new(counts),
            clock,
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, counts: &HashMap<String, DayCount>) -> Result<(), QuotaError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(counts)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl QuotaStore for FileQuotaStore {
    fn used(&self, key: &str) -> u64 {
        let today = (self.clock)();
        match self.counts.lock() {
            Ok(counts) => counts.get(key).map(|c| c.used_on(today)).unwrap_or(0),
            Err(_) => u64::MAX,
        }
    }

    fn try_reserve(&self, key: &str, limit: u64) -> Result<bool, QuotaError> {
        let today = (self.clock)();
        let mut counts = self.counts.lock().map_err(|_| QuotaError::Poisoned)?;
        let previous = counts.get(key).copied();
        if !reserve(&mut counts, key, limit, today) {
            return Ok(false);
        }
        if let Err(e) = self.persist(&counts) {
            match previous {
                Some(count) => counts.insert(key.to_string(), count),
                None => counts.remove(key),
            };
            return Err(e);
        }
        Ok(true)
    }
}

/// A daily limit bound to one key in a shared store.
#[derive(Clone)]
pub struct Quota {
    key: String,
    limit: u64,
    store: Arc<dyn QuotaStore>,
}

impl Quota {
    pub fn new(key: impl Into<String>, limit: u64, store: Arc<dyn QuotaStore>) -> Self {
        Self {
            key: key.into(),
            limit,
            store,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Requests left today.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.store.used(&self.key))
    }

    /// Side-effect-free check used by availability predicates.
    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// Reserves one request or fails with [`AdapterError::QuotaExhausted`].
    pub fn acquire(&self) -> Result<(), AdapterError> {
        if self.store.try_reserve(&self.key, self.limit)? {
            Ok(())
        } else {
            Err(AdapterError::QuotaExhausted(self.limit))
        }
    }
}

impl std::fmt::Debug for Quota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quota")
            .field("key", &self.key)
            .field("limit", &self.limit)
            .field("remaining", &self.remaining())
            .finish()
    }
}
