//! Stateful operators: keyed aggregation and tumbling-window aggregation
//!
//! Both operators require keyed input and fold each value into a per-key
//! accumulator with an `(initializer, updater)` pair. Updates are all-or-nothing:
//! if the updater fails or the result cannot be encoded, the stored accumulator
//! is left as it was.
//!
//! - [`AggregateOperator`] keeps one accumulator per key in an
//!   [`AggregationStore`] and re-emits the full aggregate on every update
//!   (changelog emission).
//! - [`WindowOperator`] keeps one accumulator per `(window, key)` in a
//!   [`WindowManager`], emits nothing while a window is open and emits each
//!   window once when the watermark closes it.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::operator::{Output, OperatorContext, StreamOperator};
use crate::codec::Codec;
use crate::core::{RawRecord, Record};
use crate::error::{ProcessorError, Result, TransformResult};
use crate::state::{AggregationStore, StoreReader};
use crate::window::{LateRecordDropped, WindowManager, WindowManagerStats, Windowed};

/// Codecs used by a stateful operator
pub struct AggregateCodecs<K, V, O> {
    pub key: Arc<dyn Codec<K>>,
    pub value: Arc<dyn Codec<V>>,
    pub output: Arc<dyn Codec<O>>,
}

impl<K, V, O> AggregateCodecs<K, V, O> {
    pub fn new(key: Arc<dyn Codec<K>>, value: Arc<dyn Codec<V>>, output: Arc<dyn Codec<O>>) -> Self {
        Self { key, value, output }
    }
}

fn require_key<'a>(operator: &str, record: &'a RawRecord) -> Result<&'a [u8]> {
    record.key_bytes().ok_or_else(|| ProcessorError::MissingKey {
        operator: operator.to_string(),
    })
}

/// Keyed aggregate with table-changelog output
///
/// For every input `{key, value, ts}` the operator emits `{key, aggregate, ts}`
/// where `aggregate = updater(key, value, previous or initializer())`.
pub struct AggregateOperator<K, V, A, I, F> {
    name: String,
    codecs: AggregateCodecs<K, V, A>,
    store: AggregationStore<K, A>,
    initializer: I,
    updater: F,
}

impl<K, V, A, I, F> AggregateOperator<K, V, A, I, F>
where
    K: Serialize + DeserializeOwned + Ord,
    A: Serialize + DeserializeOwned,
    I: Fn() -> A + Send + Sync,
    F: Fn(&K, V, A) -> TransformResult<A> + Send + Sync,
{
    pub fn new<S: Into<String>>(
        name: S,
        codecs: AggregateCodecs<K, V, A>,
        store: AggregationStore<K, A>,
        initializer: I,
        updater: F,
    ) -> Self {
        Self {
            name: name.into(),
            codecs,
            store,
            initializer,
            updater,
        }
    }

    /// Read-only handle to the aggregation state
    pub fn reader(&self) -> StoreReader<K, A> {
        self.store.reader()
    }
}

impl<K, V, A, I, F> Debug for AggregateOperator<K, V, A, I, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateOperator")
            .field("name", &self.name)
            .field("store", &self.store.name())
            .finish()
    }
}

#[async_trait]
impl<K, V, A, I, F> StreamOperator for AggregateOperator<K, V, A, I, F>
where
    K: Serialize + DeserializeOwned + Ord + Send + Sync + 'static,
    V: Send + Sync + 'static,
    A: Serialize + DeserializeOwned + Send + Sync + 'static,
    I: Fn() -> A + Send + Sync,
    F: Fn(&K, V, A) -> TransformResult<A> + Send + Sync,
{
    async fn process(&self, record: RawRecord, _ctx: &OperatorContext) -> Result<Vec<Output>> {
        let key_bytes = require_key(&self.name, &record)?.to_vec();
        let key = self.codecs.key.decode(&key_bytes)?;
        let value = self.codecs.value.decode(record.value())?;

        let current = match self.store.get(&key).await? {
            Some(aggregate) => aggregate,
            None => (self.initializer)(),
        };
        let next = (self.updater)(&key, value, current)
            .map_err(|e| ProcessorError::transform(&self.name, e))?;
        let encoded = self.codecs.output.encode(&next)?;

        self.store.put(&key, &next).await?;

        Ok(vec![Output::Forward(Record::new(
            Some(key_bytes),
            encoded,
            record.timestamp(),
        ))])
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Tumbling-window aggregate
///
/// Emits `{key, Windowed { window, value }, window.start}` once per closed
/// window. Records for a window that has already closed produce
/// [`Output::Late`] and do not touch state.
pub struct WindowOperator<K, V, A, I, F> {
    name: String,
    codecs: AggregateCodecs<K, V, Windowed<A>>,
    manager: Mutex<WindowManager<K, A>>,
    initializer: I,
    updater: F,
}

impl<K, V, A, I, F> WindowOperator<K, V, A, I, F>
where
    K: Ord + Clone,
    A: Clone,
    I: Fn() -> A + Send + Sync,
    F: Fn(&K, V, A) -> TransformResult<A> + Send + Sync,
{
    pub fn new<S: Into<String>>(
        name: S,
        codecs: AggregateCodecs<K, V, Windowed<A>>,
        manager: WindowManager<K, A>,
        initializer: I,
        updater: F,
    ) -> Self {
        Self {
            name: name.into(),
            codecs,
            manager: Mutex::new(manager),
            initializer,
            updater,
        }
    }

    /// Number of open `(window, key)` accumulators
    pub fn open_windows(&self) -> usize {
        self.manager.lock().open_windows()
    }

    pub fn stats(&self) -> WindowManagerStats {
        self.manager.lock().stats()
    }
}

impl<K, V, A, I, F> Debug for WindowOperator<K, V, A, I, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowOperator")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<K, V, A, I, F> StreamOperator for WindowOperator<K, V, A, I, F>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
    I: Fn() -> A + Send + Sync,
    F: Fn(&K, V, A) -> TransformResult<A> + Send + Sync,
{
    async fn process(&self, record: RawRecord, _ctx: &OperatorContext) -> Result<Vec<Output>> {
        let key_bytes = require_key(&self.name, &record)?;
        let key = self.codecs.key.decode(key_bytes)?;
        let value = self.codecs.value.decode(record.value())?;
        let timestamp = record.timestamp();

        let mut manager = self.manager.lock();
        let window = manager.assign(timestamp)?;

        if manager.is_late(&window) {
            return Ok(vec![Output::Late(LateRecordDropped {
                operator: self.name.clone(),
                key: Some(key_bytes.to_vec()),
                timestamp,
                window,
                watermark: manager.watermark().timestamp,
            })]);
        }

        manager
            .update(window, key.clone(), &self.initializer, |aggregate| {
                (self.updater)(&key, value, aggregate)
            })
            .map_err(|e| ProcessorError::transform(&self.name, e))?;

        Ok(vec![])
    }

    async fn on_watermark(&self, ctx: &OperatorContext) -> Result<Vec<Output>> {
        let closed = self
            .manager
            .lock()
            .advance_watermark(ctx.watermark.timestamp);

        let mut outputs = Vec::with_capacity(closed.len());
        for window in closed {
            let key_bytes = self.codecs.key.encode(&window.key)?;
            let value = self
                .codecs
                .output
                .encode(&Windowed::new(window.window, window.value))?;

            debug!(
                operator = %self.name,
                window = %window.window,
                "Emitting closed window"
            );
            outputs.push(Output::Forward(Record::new(
                Some(key_bytes),
                value,
                window.window.start,
            )));
        }

        Ok(outputs)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{JsonCodec, StringCodec};
    use crate::error::StateError;
    use crate::state::{MemoryStateBackend, StateBackend};
    use crate::watermark::Watermark;
    use crate::window::WindowBounds;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Stats {
        count: u64,
        sum: i64,
    }

    fn ctx(watermark: i64) -> OperatorContext {
        OperatorContext::new(Watermark::new(watermark), 0)
    }

    fn keyed(key: &str, value: i64, ts: i64) -> RawRecord {
        Record::new(
            Some(key.as_bytes().to_vec()),
            serde_json::to_vec(&value).unwrap(),
            ts,
        )
    }

    fn json<T: Serialize + DeserializeOwned>() -> Arc<dyn Codec<T>> {
        Arc::new(JsonCodec)
    }

    fn string() -> Arc<dyn Codec<String>> {
        Arc::new(StringCodec)
    }

    fn stats_codecs() -> AggregateCodecs<String, i64, Stats> {
        AggregateCodecs::new(string(), json::<i64>(), json::<Stats>())
    }

    fn count_sum(_key: &String, value: i64, agg: Stats) -> TransformResult<Stats> {
        Ok(Stats {
            count: agg.count + 1,
            sum: agg.sum + value,
        })
    }

    fn zero() -> Stats {
        Stats { count: 0, sum: 0 }
    }

    #[tokio::test]
    async fn test_aggregate_emits_changelog() {
        let store = AggregationStore::in_memory("stats").unwrap();
        let op = AggregateOperator::new("count-sum", stats_codecs(), store, zero, count_sum);

        let mut emitted = Vec::new();
        for (key, value, ts) in [("Mumbai", 100, 0), ("Pune", 200, 1), ("Mumbai", 50, 2)] {
            let outputs = op.process(keyed(key, value, ts), &ctx(0)).await.unwrap();
            for output in outputs {
                if let Output::Forward(record) = output {
                    let stats: Stats = serde_json::from_slice(record.value()).unwrap();
                    emitted.push((
                        String::from_utf8(record.key_bytes().unwrap().to_vec()).unwrap(),
                        stats,
                        record.timestamp(),
                    ));
                }
            }
        }

        // every update re-emits the full aggregate
        assert_eq!(
            emitted,
            vec![
                ("Mumbai".to_string(), Stats { count: 1, sum: 100 }, 0),
                ("Pune".to_string(), Stats { count: 1, sum: 200 }, 1),
                ("Mumbai".to_string(), Stats { count: 2, sum: 150 }, 2),
            ]
        );

        let state = op.reader().snapshot().await.unwrap();
        assert_eq!(state.get("Mumbai"), Some(&Stats { count: 2, sum: 150 }));
        assert_eq!(state.get("Pune"), Some(&Stats { count: 1, sum: 200 }));
    }

    #[tokio::test]
    async fn test_aggregate_requires_key() {
        let store = AggregationStore::in_memory("stats").unwrap();
        let op = AggregateOperator::new("count-sum", stats_codecs(), store, zero, count_sum);

        let unkeyed = Record::new(None, b"1".to_vec(), 0);
        let err = op.process(unkeyed, &ctx(0)).await.unwrap_err();
        assert!(matches!(err, ProcessorError::MissingKey { .. }));
    }

    #[tokio::test]
    async fn test_aggregate_failure_leaves_state() {
        let store = AggregationStore::in_memory("stats").unwrap();
        let reader = store.reader();
        let op = AggregateOperator::new("count-sum", stats_codecs(), store, zero, |_k: &String, v: i64, agg: Stats| {
            if v < 0 {
                return Err("negative amount".into());
            }
            count_sum(&String::new(), v, agg)
        });

        op.process(keyed("Delhi", 10, 0), &ctx(0)).await.unwrap();
        let err = op.process(keyed("Delhi", -5, 1), &ctx(0)).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Transform { .. }));

        assert_eq!(
            reader.get(&"Delhi".to_string()).await.unwrap(),
            Some(Stats { count: 1, sum: 10 })
        );
    }

    #[derive(Debug, Default)]
    struct UnavailableBackend;

    #[async_trait]
    impl StateBackend for UnavailableBackend {
        async fn get(&self, _key: &[u8]) -> crate::error::StateResult<Option<Vec<u8>>> {
            Err(StateError::StorageError {
                backend_type: "test".to_string(),
                details: "unavailable".to_string(),
            })
        }

        async fn put(&self, _key: &[u8], _value: &[u8]) -> crate::error::StateResult<()> {
            Ok(())
        }

        async fn delete(&self, _key: &[u8]) -> crate::error::StateResult<()> {
            Ok(())
        }

        async fn list_keys(&self, _prefix: &[u8]) -> crate::error::StateResult<Vec<Vec<u8>>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_fatal() {
        let store = AggregationStore::new("stats", Arc::new(UnavailableBackend)).unwrap();
        let op = AggregateOperator::new("count-sum", stats_codecs(), store, zero, count_sum);

        let err = op.process(keyed("Pune", 1, 0), &ctx(0)).await.unwrap_err();
        assert!(matches!(err, ProcessorError::State(_)));
        assert!(!err.is_record_error());
    }

    #[tokio::test]
    async fn test_shared_backend_separate_stores() {
        let backend: Arc<dyn StateBackend> = Arc::new(MemoryStateBackend::new());
        let a = AggregateOperator::new(
            "a",
            stats_codecs(),
            AggregationStore::new("a", backend.clone()).unwrap(),
            zero,
            count_sum,
        );
        let b = AggregateOperator::new(
            "b",
            stats_codecs(),
            AggregationStore::new("b", backend.clone()).unwrap(),
            zero,
            count_sum,
        );

        a.process(keyed("k", 1, 0), &ctx(0)).await.unwrap();
        b.process(keyed("k", 5, 0), &ctx(0)).await.unwrap();
        b.process(keyed("k", 5, 0), &ctx(0)).await.unwrap();

        assert_eq!(a.reader().get(&"k".to_string()).await.unwrap().unwrap().count, 1);
        assert_eq!(b.reader().get(&"k".to_string()).await.unwrap().unwrap().count, 2);
    }

    #[test]
    fn test_aggregate_debug_names_store() {
        let store = AggregationStore::in_memory("city-stats").unwrap();
        let op = AggregateOperator::new("count-sum", stats_codecs(), store, zero, count_sum);

        let debug = format!("{:?}", op);
        assert!(debug.contains("count-sum"));
        assert!(debug.contains("city-stats"));
    }

    fn window_op(size: u64) -> WindowOperator<String, i64, u64, fn() -> u64, fn(&String, i64, u64) -> TransformResult<u64>> {
        fn init() -> u64 {
            0
        }
        fn count(_key: &String, _value: i64, acc: u64) -> TransformResult<u64> {
            Ok(acc + 1)
        }
        WindowOperator::new(
            "windowed-count",
            AggregateCodecs::new(string(), json::<i64>(), json::<Windowed<u64>>()),
            WindowManager::tumbling(size, 0).unwrap(),
            init as fn() -> u64,
            count as fn(&String, i64, u64) -> TransformResult<u64>,
        )
    }

    #[tokio::test]
    async fn test_window_emits_on_close() {
        let op = window_op(5);

        for ts in [0, 3] {
            assert!(op.process(keyed("Mumbai", 1, ts), &ctx(ts)).await.unwrap().is_empty());
            assert!(op.on_watermark(&ctx(ts)).await.unwrap().is_empty());
        }

        assert!(op.process(keyed("Mumbai", 1, 7), &ctx(3)).await.unwrap().is_empty());
        let outputs = op.on_watermark(&ctx(7)).await.unwrap();
        assert_eq!(outputs.len(), 1);

        let Output::Forward(record) = &outputs[0] else {
            panic!("expected forwarded window");
        };
        let windowed: Windowed<u64> = serde_json::from_slice(record.value()).unwrap();
        assert_eq!(windowed, Windowed::new(WindowBounds::new(0, 5), 2));
        assert_eq!(record.key_bytes(), Some(&b"Mumbai"[..]));
        assert_eq!(record.timestamp(), 0);

        // [5, 10) still open
        assert_eq!(op.open_windows(), 1);
    }

    #[tokio::test]
    async fn test_window_late_record() {
        let op = window_op(5);
        op.process(keyed("Mumbai", 1, 1), &ctx(1)).await.unwrap();
        op.process(keyed("Mumbai", 1, 9), &ctx(1)).await.unwrap();
        assert_eq!(op.on_watermark(&ctx(9)).await.unwrap().len(), 1);

        let outputs = op.process(keyed("Mumbai", 1, 2), &ctx(9)).await.unwrap();
        match outputs.as_slice() {
            [Output::Late(late)] => {
                assert_eq!(late.window, WindowBounds::new(0, 5));
                assert_eq!(late.timestamp, 2);
                assert_eq!(late.watermark, 9);
                assert_eq!(late.key, Some(b"Mumbai".to_vec()));
            }
            other => panic!("expected a late drop, got {:?}", other),
        }

        // not reopened, not re-emitted
        assert!(op.on_watermark(&ctx(9)).await.unwrap().is_empty());
        assert_eq!(op.stats().windows_emitted, 1);
    }

    #[tokio::test]
    async fn test_window_requires_key() {
        let op = window_op(5);
        let err = op
            .process(Record::new(None, b"1".to_vec(), 0), &ctx(0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::MissingKey { .. }));
    }
}
