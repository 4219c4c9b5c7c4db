//! Stream operators for transforming and routing records
//!
//! This module provides the operator trait and the stateless operators:
//! - Map: transform the value one-to-one, optionally seeing the key
//! - Filter: keep records whose value satisfies a predicate
//! - Branch: route each record to the first matching of several ordered paths
//! - Rekey: replace the key with one derived from the value
//! - Sink: deliver records to a topic (terminal)
//!
//! The stateful operators live in [`super::aggregate`].

use crate::codec::Codec;
use crate::config::DeliveryGuarantee;
use crate::core::{RawRecord, Record};
use crate::error::{ProcessorError, Result, TransformResult};
use crate::io::Sink;
use crate::watermark::Watermark;
use crate::window::LateRecordDropped;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{trace, warn};

/// Context provided to operators during execution
#[derive(Debug, Clone)]
pub struct OperatorContext {
    /// Current watermark
    pub watermark: Watermark,

    /// Partition group ID
    pub partition: u32,

    /// Processing timestamp
    pub processing_time: i64,
}

impl OperatorContext {
    /// Create a new operator context
    pub fn new(watermark: Watermark, partition: u32) -> Self {
        Self {
            watermark,
            partition,
            processing_time: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// What an operator emits for one input
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Send to every child
    Forward(RawRecord),
    /// Send to the child connected at this port only
    Port(usize, RawRecord),
    /// The record was dropped because its window had closed
    Late(LateRecordDropped),
}

/// Trait for stream operators
///
/// All operators exchange encoded records; each decodes what it needs through
/// its codecs. `process` is called once per input record, `on_watermark` every
/// time the driver's watermark advances.
#[async_trait]
pub trait StreamOperator: Send + Sync + Debug {
    /// Process a record and return what to emit downstream
    async fn process(&self, record: RawRecord, ctx: &OperatorContext) -> Result<Vec<Output>>;

    /// Called after the watermark advanced to `ctx.watermark`
    async fn on_watermark(&self, _ctx: &OperatorContext) -> Result<Vec<Output>> {
        Ok(Vec::new())
    }

    /// Get the operator name
    fn name(&self) -> &str;

    /// Number of addressable output ports, `None` when output is broadcast
    fn output_ports(&self) -> Option<usize> {
        None
    }

    /// Terminal operators (sinks) cannot have children
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Map operator - transforms the value, keeping key and timestamp
///
/// # Example
///
/// ```rust
/// use processor::codec::{Codec, JsonCodec};
/// use processor::pipeline::operator::MapOperator;
/// use std::sync::Arc;
///
/// let codec: Arc<dyn Codec<i64>> = Arc::new(JsonCodec);
/// let double = MapOperator::new("double", codec.clone(), codec, |x: i64| Ok(x * 2));
/// ```
pub struct MapOperator<V, U, F> {
    name: String,
    input: Arc<dyn Codec<V>>,
    output: Arc<dyn Codec<U>>,
    func: F,
}

impl<V, U, F> MapOperator<V, U, F>
where
    F: Fn(V) -> TransformResult<U> + Send + Sync,
{
    /// Create a new map operator
    pub fn new<S: Into<String>>(
        name: S,
        input: Arc<dyn Codec<V>>,
        output: Arc<dyn Codec<U>>,
        func: F,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            output,
            func,
        }
    }
}

impl<V, U, F> Debug for MapOperator<V, U, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapOperator")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<V, U, F> StreamOperator for MapOperator<V, U, F>
where
    V: Send + Sync + 'static,
    U: Send + Sync + 'static,
    F: Fn(V) -> TransformResult<U> + Send + Sync,
{
    async fn process(&self, record: RawRecord, _ctx: &OperatorContext) -> Result<Vec<Output>> {
        let value = self.input.decode(record.value())?;
        let mapped = (self.func)(value).map_err(|e| ProcessorError::transform(&self.name, e))?;
        let encoded = self.output.encode(&mapped)?;
        Ok(vec![Output::Forward(record.with_value(encoded))])
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Keyed map operator - like [`MapOperator`] but the function also sees the key.
///
/// Records without a key are rejected with [`ProcessorError::MissingKey`].
pub struct KeyedMapOperator<K, V, U, F> {
    name: String,
    key: Arc<dyn Codec<K>>,
    input: Arc<dyn Codec<V>>,
    output: Arc<dyn Codec<U>>,
    func: F,
}

impl<K, V, U, F> KeyedMapOperator<K, V, U, F>
where
    F: Fn(&K, V) -> TransformResult<U> + Send + Sync,
{
    pub fn new<S: Into<String>>(
        name: S,
        key: Arc<dyn Codec<K>>,
        input: Arc<dyn Codec<V>>,
        output: Arc<dyn Codec<U>>,
        func: F,
    ) -> Self {
        Self {
            name: name.into(),
            key,
            input,
            output,
            func,
        }
    }
}

impl<K, V, U, F> Debug for KeyedMapOperator<K, V, U, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedMapOperator")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<K, V, U, F> StreamOperator for KeyedMapOperator<K, V, U, F>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    U: Send + Sync + 'static,
    F: Fn(&K, V) -> TransformResult<U> + Send + Sync,
{
    async fn process(&self, record: RawRecord, _ctx: &OperatorContext) -> Result<Vec<Output>> {
        let key_bytes = record.key_bytes().ok_or_else(|| ProcessorError::MissingKey {
            operator: self.name.clone(),
        })?;
        let key = self.key.decode(key_bytes)?;
        let value = self.input.decode(record.value())?;
        let mapped = (self.func)(&key, value).map_err(|e| ProcessorError::transform(&self.name, e))?;
        let encoded = self.output.encode(&mapped)?;
        Ok(vec![Output::Forward(record.with_value(encoded))])
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Filter operator - passes a record unchanged iff the predicate holds
pub struct FilterOperator<V, F> {
    name: String,
    codec: Arc<dyn Codec<V>>,
    predicate: F,
}

impl<V, F> FilterOperator<V, F>
where
    F: Fn(&V) -> bool + Send + Sync,
{
    /// Create a new filter operator
    pub fn new<S: Into<String>>(name: S, codec: Arc<dyn Codec<V>>, predicate: F) -> Self {
        Self {
            name: name.into(),
            codec,
            predicate,
        }
    }
}

impl<V, F> Debug for FilterOperator<V, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterOperator")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<V, F> StreamOperator for FilterOperator<V, F>
where
    V: Send + Sync + 'static,
    F: Fn(&V) -> bool + Send + Sync,
{
    async fn process(&self, record: RawRecord, _ctx: &OperatorContext) -> Result<Vec<Output>> {
        let value = self.codec.decode(record.value())?;
        if (self.predicate)(&value) {
            Ok(vec![Output::Forward(record)])
        } else {
            Ok(vec![])
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

type BranchPredicate<V> = Box<dyn Fn(&V) -> bool + Send + Sync>;

/// Branch operator - ordered predicates, first match wins.
///
/// Port `i` is the i-th branch in declaration order; the default branch, when
/// configured, is the last port. A record matching no predicate goes to the
/// default branch, or is dropped silently when there is none.
///
/// # Example
///
/// ```rust
/// use processor::codec::JsonCodec;
/// use processor::pipeline::operator::BranchOperator;
/// use std::sync::Arc;
///
/// let by_amount = BranchOperator::<f64>::new("by-amount", Arc::new(JsonCodec))
///     .branch("high", |amount| *amount >= 5000.0)
///     .branch("medium", |amount| *amount >= 1000.0)
///     .default_branch("low");
/// assert_eq!(by_amount.port_of("low"), Some(2));
/// ```
pub struct BranchOperator<V> {
    name: String,
    codec: Arc<dyn Codec<V>>,
    branches: Vec<(String, BranchPredicate<V>)>,
    default: Option<String>,
}

impl<V> BranchOperator<V> {
    pub fn new<S: Into<String>>(name: S, codec: Arc<dyn Codec<V>>) -> Self {
        Self {
            name: name.into(),
            codec,
            branches: Vec::new(),
            default: None,
        }
    }

    /// Append a branch; earlier branches take precedence
    pub fn branch<S, P>(mut self, name: S, predicate: P) -> Self
    where
        S: Into<String>,
        P: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.branches.push((name.into(), Box::new(predicate)));
        self
    }

    /// Route records matching no branch to this port
    pub fn default_branch<S: Into<String>>(mut self, name: S) -> Self {
        self.default = Some(name.into());
        self
    }

    /// Branch names in port order
    pub fn branch_names(&self) -> Vec<&str> {
        self.branches
            .iter()
            .map(|(name, _)| name.as_str())
            .chain(self.default.as_deref())
            .collect()
    }

    /// Port index of a named branch
    pub fn port_of(&self, branch: &str) -> Option<usize> {
        self.branch_names().iter().position(|name| *name == branch)
    }

    fn select(&self, value: &V) -> Option<usize> {
        self.branches
            .iter()
            .position(|(_, predicate)| predicate(value))
            .or_else(|| self.default.as_ref().map(|_| self.branches.len()))
    }
}

impl<V> Debug for BranchOperator<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchOperator")
            .field("name", &self.name)
            .field("branches", &self.branch_names())
            .finish()
    }
}

#[async_trait]
impl<V> StreamOperator for BranchOperator<V>
where
    V: Send + Sync + 'static,
{
    async fn process(&self, record: RawRecord, _ctx: &OperatorContext) -> Result<Vec<Output>> {
        let value = self.codec.decode(record.value())?;
        match self.select(&value) {
            Some(port) => Ok(vec![Output::Port(port, record)]),
            None => {
                trace!(operator = %self.name, key = %record.display_key(), "No branch matched, dropping record");
                Ok(vec![])
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn output_ports(&self) -> Option<usize> {
        Some(self.branches.len() + usize::from(self.default.is_some()))
    }
}

/// Rekey operator - emits a new record keyed by a value-derived key
pub struct RekeyOperator<V, K, F> {
    name: String,
    value_codec: Arc<dyn Codec<V>>,
    key_codec: Arc<dyn Codec<K>>,
    selector: F,
}

impl<V, K, F> RekeyOperator<V, K, F>
where
    F: Fn(&V) -> TransformResult<K> + Send + Sync,
{
    pub fn new<S: Into<String>>(
        name: S,
        value_codec: Arc<dyn Codec<V>>,
        key_codec: Arc<dyn Codec<K>>,
        selector: F,
    ) -> Self {
        Self {
            name: name.into(),
            value_codec,
            key_codec,
            selector,
        }
    }
}

impl<V, K, F> Debug for RekeyOperator<V, K, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RekeyOperator")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<V, K, F> StreamOperator for RekeyOperator<V, K, F>
where
    V: Send + Sync + 'static,
    K: Send + Sync + 'static,
    F: Fn(&V) -> TransformResult<K> + Send + Sync,
{
    async fn process(&self, record: RawRecord, _ctx: &OperatorContext) -> Result<Vec<Output>> {
        let value = self.value_codec.decode(record.value())?;
        let key = (self.selector)(&value).map_err(|e| ProcessorError::transform(&self.name, e))?;
        let key_bytes = self.key_codec.encode(&key)?;
        Ok(vec![Output::Forward(record.with_key(Some(key_bytes)))])
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Sink operator - delivers each record to a topic
pub struct SinkOperator {
    name: String,
    topic: String,
    sink: Arc<dyn Sink>,
    delivery: DeliveryGuarantee,
}

impl SinkOperator {
    /// Create a sink operator with at-least-once delivery
    pub fn new<S: Into<String>, T: Into<String>>(name: S, topic: T, sink: Arc<dyn Sink>) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            sink,
            delivery: DeliveryGuarantee::AtLeastOnce,
        }
    }

    pub fn with_delivery(mut self, delivery: DeliveryGuarantee) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Debug for SinkOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkOperator")
            .field("name", &self.name)
            .field("topic", &self.topic)
            .field("delivery", &self.delivery)
            .finish()
    }
}

#[async_trait]
impl StreamOperator for SinkOperator {
    async fn process(&self, record: RawRecord, _ctx: &OperatorContext) -> Result<Vec<Output>> {
        let sent = self
            .sink
            .send(&self.topic, record.key_bytes(), record.value())
            .await;

        match (sent, self.delivery) {
            (Ok(()), _) => Ok(vec![]),
            (Err(e), DeliveryGuarantee::AtMostOnce) => {
                warn!(
                    topic = %self.topic,
                    key = %record.display_key(),
                    error = %e,
                    "Delivery failed, dropping record"
                );
                Ok(vec![])
            }
            (Err(e), DeliveryGuarantee::AtLeastOnce) => Err(ProcessorError::Delivery {
                topic: self.topic.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

/// Shorthand for building the encoded record a source would emit
pub fn raw_record(key: Option<&[u8]>, value: Vec<u8>, timestamp: i64) -> RawRecord {
    Record::new(key.map(<[u8]>::to_vec), value, timestamp)
}
