//! In-memory state backend
//!
//! DashMap gives per-key atomicity, which is what lets a
//! [`StoreReader`](super::StoreReader) do point lookups from another task while
//! the driver writes.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::backend::StateBackend;
use crate::core::DisplayKey;
use crate::error::StateResult;

/// Operation counters of a [`MemoryStateBackend`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBackendStats {
    pub entries: usize,
    pub gets: u64,
    pub hits: u64,
    pub puts: u64,
    pub deletes: u64,
}

impl MemoryBackendStats {
    pub fn misses(&self) -> u64 {
        self.gets - self.hits
    }
}

#[derive(Debug, Default)]
struct Counters {
    gets: AtomicU64,
    hits: AtomicU64,
    puts: AtomicU64,
    deletes: AtomicU64,
}

/// DashMap-backed state backend; clones share the same map
///
/// ```rust
/// use processor::state::{MemoryStateBackend, StateBackend};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let backend = MemoryStateBackend::new();
/// backend.put(b"city-stats\0Mumbai", b"agg").await?;
/// assert!(backend.contains(b"city-stats\0Mumbai").await?);
/// assert_eq!(backend.stats().puts, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryStateBackend {
    data: Arc<DashMap<Vec<u8>, Vec<u8>>>,
    counters: Arc<Counters>,
}

impl MemoryStateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> MemoryBackendStats {
        MemoryBackendStats {
            entries: self.data.len(),
            gets: self.counters.gets.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            puts: self.counters.puts.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for MemoryStateBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStateBackend")
            .field("entries", &self.data.len())
            .finish()
    }
}

#[async_trait]
impl StateBackend for MemoryStateBackend {
    async fn get(&self, key: &[u8]) -> StateResult<Option<Vec<u8>>> {
        let value = self.data.get(key).map(|entry| entry.value().clone());

        self.counters.gets.fetch_add(1, Ordering::Relaxed);
        if value.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        trace!(key = %DisplayKey(Some(key)), hit = value.is_some(), "State get");

        Ok(value)
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StateResult<()> {
        self.data.insert(key.to_vec(), value.to_vec());
        self.counters.puts.fetch_add(1, Ordering::Relaxed);
        trace!(key = %DisplayKey(Some(key)), bytes = value.len(), "State put");
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> StateResult<()> {
        self.data.remove(key);
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn list_keys(&self, prefix: &[u8]) -> StateResult<Vec<Vec<u8>>> {
        Ok(self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn clear(&self) -> StateResult<()> {
        debug!(entries = self.data.len(), "Clearing in-memory state");
        self.data.clear();
        Ok(())
    }

    async fn count(&self) -> StateResult<usize> {
        Ok(self.data.len())
    }

    async fn contains(&self, key: &[u8]) -> StateResult<bool> {
        Ok(self.data.contains_key(key))
    }
}
