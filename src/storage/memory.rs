//! In-memory state store
//!
//! Used for ephemeral runs and as the fake store in tests. Writes can be
//! made to fail on demand, and every successful write is recorded so tests
//! can assert on persistence order.

use crate::error::{KeyquizError, Result};
use crate::storage::StateStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Value>>,
    write_log: RwLock<Vec<Vec<String>>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Keys written by each successful `set`, oldest first
    pub fn write_log(&self) -> Vec<Vec<String>> {
        self.write_log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current raw value of a key
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeyquizError::Store("simulated write failure".to_string()));
        }

        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(entries);
        self.write_log
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(keys);
        Ok(())
    }
}
