//! Byte-level state backend
//!
//! Keys and values are opaque bytes. [`AggregationStore`](super::AggregationStore)
//! adds typing and namespacing on top, so one backend can hold the stores of
//! every aggregate operator in a topology.

use async_trait::async_trait;

use crate::error::StateResult;

/// Key-value storage used by aggregation stores
///
/// Each call is atomic per key: a concurrent reader observes the old value or
/// the new one. A backend error means the store is unavailable; the driver
/// treats it as fatal rather than skipping the record.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Value stored under `key`, `None` when absent
    async fn get(&self, key: &[u8]) -> StateResult<Option<Vec<u8>>>;

    /// Insert or overwrite `key`
    async fn put(&self, key: &[u8], value: &[u8]) -> StateResult<()>;

    /// Remove `key`; removing an absent key succeeds
    async fn delete(&self, key: &[u8]) -> StateResult<()>;

    /// Every key starting with `prefix`, in no particular order
    async fn list_keys(&self, prefix: &[u8]) -> StateResult<Vec<Vec<u8>>>;

    async fn clear(&self) -> StateResult<()> {
        for key in self.list_keys(&[]).await? {
            self.delete(&key).await?;
        }
        Ok(())
    }

    async fn count(&self) -> StateResult<usize> {
        Ok(self.list_keys(&[]).await?.len())
    }

    async fn contains(&self, key: &[u8]) -> StateResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Behaviour every backend must share; run from each implementation's tests
#[cfg(test)]
pub(crate) async fn assert_backend_contract<B: StateBackend>(backend: &B) {
    backend.clear().await.unwrap();

    // overwrite and idempotent delete
    backend.put(b"orders\0Mumbai", b"1").await.unwrap();
    backend.put(b"orders\0Mumbai", b"2").await.unwrap();
    assert_eq!(backend.get(b"orders\0Mumbai").await.unwrap(), Some(b"2".to_vec()));
    backend.delete(b"orders\0Nowhere").await.unwrap();

    // prefix listing keeps namespaces apart
    backend.put(b"orders\0Pune", b"1").await.unwrap();
    backend.put(b"windows\0Pune", b"1").await.unwrap();
    let mut orders = backend.list_keys(b"orders\0").await.unwrap();
    orders.sort();
    assert_eq!(orders, vec![b"orders\0Mumbai".to_vec(), b"orders\0Pune".to_vec()]);
    assert_eq!(backend.count().await.unwrap(), 3);

    assert!(backend.contains(b"windows\0Pune").await.unwrap());
    backend.delete(b"windows\0Pune").await.unwrap();
    assert!(!backend.contains(b"windows\0Pune").await.unwrap());

    backend.clear().await.unwrap();
    assert_eq!(backend.count().await.unwrap(), 0);
    assert_eq!(backend.get(b"orders\0Mumbai").await.unwrap(), None);
}
