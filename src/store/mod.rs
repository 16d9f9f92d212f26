// src/store/mod.rs
//! Dataset repository. The collector appends through `append_and_save`, the digest
//! sender only calls `load`. Implementations must never expose a half-written dataset.

pub mod json_file;

pub use json_file::JsonFileStore;

use crate::error::StoreError;
use crate::record::{Dataset, Record};

#[async_trait::async_trait]
pub trait DatasetStore: Send + Sync {
    /// Current dataset. A store that was never written yields an empty dataset.
    async fn load(&self) -> Result<Dataset, StoreError>;

    /// Merge `candidates` into the stored dataset (first occurrence of a link wins) and
    /// persist atomically. Returns the records that were appended. On error the stored
    /// dataset is unchanged.
    async fn append_and_save(&self, candidates: Vec<Record>) -> Result<Vec<Record>, StoreError>;
}

/// In-process store. Writes can be made to fail to exercise the collector's error path.
pub struct MemoryStore {
    inner: std::sync::Mutex<Dataset>,
    fail_writes: std::sync::atomic::AtomicBool,
    pub saves: std::sync::atomic::AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_dataset(Dataset::new())
    }

    pub fn with_dataset(ds: Dataset) -> Self {
        Self {
            inner: std::sync::Mutex::new(ds),
            fail_writes: std::sync::atomic::AtomicBool::new(false),
            saves: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Dataset {
        self.inner.lock().expect("memory store mutex poisoned").clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DatasetStore for MemoryStore {
    async fn load(&self) -> Result<Dataset, StoreError> {
        Ok(self.snapshot())
    }

    async fn append_and_save(&self, candidates: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store mutex poisoned".into()))?;
        // Merge into a copy so a failed write leaves the stored dataset untouched.
        let mut next = guard.clone();
        let appended = next.merge(candidates);
        if appended.is_empty() {
            return Ok(appended);
        }
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        *guard = next;
        self.saves
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(appended)
    }
}
