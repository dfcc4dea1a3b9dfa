//! Bonds — the name → dependency map built-in checks consult.
//!
//! A bond is any shared handle registered under a string key, typically an
//! `Arc<dyn Trait>`. Lookups are typed: asking for the wrong type behaves
//! like asking for a missing key.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::BoxFuture;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BondError {
    #[error("Bond '{0}' is not registered")]
    Missing(String),
}

/// Shared dependency map.
#[derive(Default)]
pub struct Bonds {
    entries: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Bonds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a bond under `key`.
    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.into(), Arc::new(value));
    }

    /// Typed lookup. `None` if absent or registered with a different type.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Any + Send + Sync + Clone,
    {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key)?.downcast_ref::<T>().cloned()
    }

    pub fn require<T>(&self, key: &str) -> Result<T, BondError>
    where
        T: Any + Send + Sync + Clone,
    {
        self.get(key).ok_or_else(|| BondError::Missing(key.to_string()))
    }

    pub fn has(&self, key: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(key)
    }

    /// Remove a bond. Returns true if it existed.
    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for Bonds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bonds").field("keys", &self.keys()).finish()
    }
}

/// Connection pool counters reported by a database bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub size: u32,
    pub idle: u32,
}

/// Database connection as seen by the database check.
pub trait DatabaseBond: Send + Sync {
    /// Query the pool. An error means the pool itself is unavailable.
    fn pool_status(&self) -> BoxFuture<'_, anyhow::Result<PoolStatus>>;

    /// Run a trivial liveness query (`SELECT 1` or equivalent).
    fn ping(&self) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// Cache provider as seen by the cache check.
pub trait CacheBond: Send + Sync {
    fn ping(&self) -> BoxFuture<'_, anyhow::Result<()>>;
}
