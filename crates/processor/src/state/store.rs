//! Typed aggregation state
//!
//! [`AggregationStore`] maps keys to accumulators on top of a [`StateBackend`].
//! Each store lives in its own namespace, so several aggregate operators can share
//! one backend without seeing each other's keys. A store has a single writer, the
//! aggregate operator that owns it. Other tasks read through a [`StoreReader`].

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::backend::StateBackend;
use super::memory::MemoryStateBackend;
use crate::error::{StateError, StateResult};

/// Key-to-accumulator map owned by one aggregate operator
pub struct AggregationStore<K, A> {
    name: String,
    namespace: Vec<u8>,
    backend: Arc<dyn StateBackend>,
    _phantom: PhantomData<fn() -> (K, A)>,
}

impl<K, A> AggregationStore<K, A> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<K, A> AggregationStore<K, A>
where
    K: Serialize + DeserializeOwned + Ord,
    A: Serialize + DeserializeOwned,
{
    /// Create a store named `name` on a shared backend
    pub fn new<S: Into<String>>(name: S, backend: Arc<dyn StateBackend>) -> StateResult<Self> {
        let name = name.into();
        // Length-prefixed, so no namespace is a byte prefix of another.
        let namespace = bincode::serialize(&name).map_err(|e| StateError::SerializationFailed {
            key: name.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            name,
            namespace,
            backend,
            _phantom: PhantomData,
        })
    }

    /// Create a store on a fresh in-memory backend
    pub fn in_memory<S: Into<String>>(name: S) -> StateResult<Self> {
        Self::new(name, Arc::new(MemoryStateBackend::new()))
    }

    fn state_key(&self, key: &K) -> StateResult<Vec<u8>> {
        let encoded = bincode::serialize(key).map_err(|e| StateError::SerializationFailed {
            key: self.name.clone(),
            reason: e.to_string(),
        })?;

        let mut state_key = Vec::with_capacity(self.namespace.len() + encoded.len());
        state_key.extend_from_slice(&self.namespace);
        state_key.extend_from_slice(&encoded);
        Ok(state_key)
    }

    fn decode_value(&self, bytes: &[u8]) -> StateResult<A> {
        bincode::deserialize(bytes).map_err(|e| StateError::DeserializationFailed {
            key: self.name.clone(),
            reason: e.to_string(),
        })
    }

    /// Current accumulator for `key`
    pub async fn get(&self, key: &K) -> StateResult<Option<A>> {
        let state_key = self.state_key(key)?;
        match self.backend.get(&state_key).await? {
            Some(bytes) => Ok(Some(self.decode_value(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Replace the accumulator for `key`
    pub async fn put(&self, key: &K, value: &A) -> StateResult<()> {
        let state_key = self.state_key(key)?;
        let bytes = bincode::serialize(value).map_err(|e| StateError::SerializationFailed {
            key: self.name.clone(),
            reason: e.to_string(),
        })?;
        self.backend.put(&state_key, &bytes).await
    }

    pub async fn delete(&self, key: &K) -> StateResult<()> {
        let state_key = self.state_key(key)?;
        self.backend.delete(&state_key).await
    }

    /// Number of keys in this store
    pub async fn len(&self) -> StateResult<usize> {
        Ok(self.backend.list_keys(&self.namespace).await?.len())
    }

    pub async fn is_empty(&self) -> StateResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Every key and accumulator, ordered by key.
    ///
    /// Each value is read atomically; the map as a whole is not a consistent cut
    /// if the owning operator writes concurrently.
    pub async fn snapshot(&self) -> StateResult<BTreeMap<K, A>> {
        let mut snapshot = BTreeMap::new();

        for state_key in self.backend.list_keys(&self.namespace).await? {
            let key: K = bincode::deserialize(&state_key[self.namespace.len()..]).map_err(|e| {
                StateError::DeserializationFailed {
                    key: self.name.clone(),
                    reason: e.to_string(),
                }
            })?;

            // deleted between list and get
            if let Some(bytes) = self.backend.get(&state_key).await? {
                snapshot.insert(key, self.decode_value(&bytes)?);
            }
        }

        Ok(snapshot)
    }

    /// Read-only handle for lookups from outside the driver task
    pub fn reader(&self) -> StoreReader<K, A> {
        StoreReader {
            store: self.clone(),
        }
    }
}

impl<K, A> Clone for AggregationStore<K, A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            backend: Arc::clone(&self.backend),
            _phantom: PhantomData,
        }
    }
}

impl<K, A> fmt::Debug for AggregationStore<K, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregationStore")
            .field("name", &self.name)
            .finish()
    }
}

/// Read-only view of an [`AggregationStore`]
pub struct StoreReader<K, A> {
    store: AggregationStore<K, A>,
}

impl<K, A> StoreReader<K, A>
where
    K: Serialize + DeserializeOwned + Ord,
    A: Serialize + DeserializeOwned,
{
    /// Point lookup
    pub async fn get(&self, key: &K) -> StateResult<Option<A>> {
        self.store.get(key).await
    }

    pub async fn snapshot(&self) -> StateResult<BTreeMap<K, A>> {
        self.store.snapshot().await
    }

    pub async fn len(&self) -> StateResult<usize> {
        self.store.len().await
    }
}

impl<K, A> Clone for StoreReader<K, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<K, A> fmt::Debug for StoreReader<K, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreReader")
            .field("store", &self.store.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = AggregationStore::<String, (u64, f64)>::in_memory("city-stats").unwrap();

        assert_eq!(store.get(&"Mumbai".to_string()).await.unwrap(), None);

        store.put(&"Mumbai".to_string(), &(1, 100.0)).await.unwrap();
        assert_eq!(
            store.get(&"Mumbai".to_string()).await.unwrap(),
            Some((1, 100.0))
        );
        assert_eq!(store.len().await.unwrap(), 1);

        store.delete(&"Mumbai".to_string()).await.unwrap();
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_is_ordered_by_key() {
        let store = AggregationStore::<String, u64>::in_memory("counts").unwrap();
        store.put(&"Pune".to_string(), &1).await.unwrap();
        store.put(&"Delhi".to_string(), &3).await.unwrap();
        store.put(&"Mumbai".to_string(), &2).await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        let keys: Vec<&String> = snapshot.keys().collect();
        assert_eq!(keys, vec!["Delhi", "Mumbai", "Pune"]);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let backend: Arc<dyn StateBackend> = Arc::new(MemoryStateBackend::new());
        let a = AggregationStore::<String, u64>::new("city", backend.clone()).unwrap();
        let b = AggregationStore::<String, u64>::new("city:x", backend.clone()).unwrap();

        a.put(&"k".to_string(), &1).await.unwrap();
        b.put(&"k".to_string(), &2).await.unwrap();

        assert_eq!(a.len().await.unwrap(), 1);
        assert_eq!(a.snapshot().await.unwrap().get("k"), Some(&1));
        assert_eq!(b.snapshot().await.unwrap().get("k"), Some(&2));
        assert_eq!(backend.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reader_sees_writes() {
        let store = AggregationStore::<String, u64>::in_memory("counts").unwrap();
        let reader = store.reader();

        store.put(&"Pune".to_string(), &5).await.unwrap();
        assert_eq!(reader.get(&"Pune".to_string()).await.unwrap(), Some(5));
        assert_eq!(reader.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reader_from_another_task() {
        let store = AggregationStore::<String, u64>::in_memory("counts").unwrap();
        store.put(&"Delhi".to_string(), &9).await.unwrap();

        let reader = store.reader();
        let handle = tokio::spawn(async move { reader.snapshot().await.unwrap() });
        let snapshot = handle.await.unwrap();
        assert_eq!(snapshot.get("Delhi"), Some(&9));
    }

    #[tokio::test]
    async fn test_corrupt_value_is_state_error() {
        let backend: Arc<dyn StateBackend> = Arc::new(MemoryStateBackend::new());
        let store = AggregationStore::<String, (u64, f64)>::new("stats", backend.clone()).unwrap();
        store.put(&"k".to_string(), &(1, 1.0)).await.unwrap();

        let raw_key = backend.list_keys(b"").await.unwrap().remove(0);
        backend.put(&raw_key, &[1, 2]).await.unwrap();

        assert!(matches!(
            store.get(&"k".to_string()).await,
            Err(StateError::DeserializationFailed { .. })
        ));
    }
}
