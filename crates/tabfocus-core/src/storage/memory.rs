//! In-process storage for tests and throwaway sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::Storage;
use crate::error::StorageError;

/// HashMap-backed [`Storage`] with switchable failures.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, u64>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    /// Writes still allowed before every `set` fails.
    write_budget: Mutex<Option<usize>>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail until turned off again.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set` fail until turned off again.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Let `n` more writes through, then fail every `set`.
    pub fn fail_writes_after(&self, n: usize) {
        if let Ok(mut budget) = self.write_budget.lock() {
            *budget = Some(n);
        }
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Synchronous peek, bypassing failure injection.
    pub fn value(&self, key: &str) -> Option<u64> {
        self.values.lock().ok()?.get(key).copied()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str, default: u64) -> Result<u64, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Read {
                key: key.to_string(),
                message: "injected read failure".into(),
            });
        }
        let values = self
            .values
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(values.get(key).copied().unwrap_or(default))
    }

    async fn set(&self, key: &str, value: u64) -> Result<(), StorageError> {
        let over_budget = {
            let mut budget = self
                .write_budget
                .lock()
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            match budget.as_mut() {
                Some(0) => true,
                Some(left) => {
                    *left -= 1;
                    false
                }
                None => false,
            }
        };
        if over_budget || self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                key: key.to_string(),
                message: "injected write failure".into(),
            });
        }
        self.values
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
