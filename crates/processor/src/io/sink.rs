//! Record sinks
//!
//! A [`Sink`] is the push side of the transport. Sink operators at the leaves of
//! a topology hand it encoded records addressed to a topic. How a failed send is
//! treated is decided by the operator's
//! [`DeliveryGuarantee`](crate::config::DeliveryGuarantee), not by the sink.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::info;

use crate::core::DisplayKey;
use crate::error::Result;

/// Push-based record sink
#[async_trait]
pub trait Sink: Send + Sync + Debug {
    /// Deliver one record to `topic`
    async fn send(&self, topic: &str, key: Option<&[u8]>, value: &[u8]) -> Result<()>;

    /// Block until buffered records are delivered
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// A record as received by a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
}

impl SinkRecord {
    /// Key as UTF-8 text
    pub fn key_str(&self) -> Option<String> {
        self.key
            .as_deref()
            .map(|key| String::from_utf8_lossy(key).into_owned())
    }
}

/// Sink that keeps every record in memory, per topic and in delivery order.
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    topics: Arc<Mutex<BTreeMap<String, Vec<SinkRecord>>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records delivered to `topic`
    pub fn records(&self, topic: &str) -> Vec<SinkRecord> {
        self.topics.lock().get(topic).cloned().unwrap_or_default()
    }

    /// Number of records delivered to `topic`
    pub fn count(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map_or(0, Vec::len)
    }

    /// Topics that received at least one record
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().keys().cloned().collect()
    }

    pub fn total(&self) -> usize {
        self.topics.lock().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn send(&self, topic: &str, key: Option<&[u8]>, value: &[u8]) -> Result<()> {
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(SinkRecord {
                topic: topic.to_string(),
                key: key.map(<[u8]>::to_vec),
                value: value.to_vec(),
            });
        Ok(())
    }
}

/// Sink that writes each record to the log at info level
#[derive(Debug, Clone)]
pub struct TracingSink {
    label: String,
}

impl TracingSink {
    pub fn new<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[async_trait]
impl Sink for TracingSink {
    async fn send(&self, topic: &str, key: Option<&[u8]>, value: &[u8]) -> Result<()> {
        info!(
            label = %self.label,
            topic = %topic,
            key = %DisplayKey(key),
            value = %String::from_utf8_lossy(value),
            "{}", self.label
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_sink_groups_by_topic() {
        let sink = InMemorySink::new();
        sink.send("transactions.high", Some(b"CUST1001"), b"{}")
            .await
            .unwrap();
        sink.send("transactions.medium", None, b"a").await.unwrap();
        sink.send("transactions.high", Some(b"CUST1002"), b"[]")
            .await
            .unwrap();

        assert_eq!(sink.count("transactions.high"), 2);
        assert_eq!(sink.count("transactions.low"), 0);
        assert_eq!(sink.total(), 3);
        assert_eq!(
            sink.topics(),
            vec!["transactions.high".to_string(), "transactions.medium".to_string()]
        );

        let high = sink.records("transactions.high");
        assert_eq!(high[0].key_str().as_deref(), Some("CUST1001"));
        assert_eq!(high[1].value, b"[]".to_vec());
    }

    #[tokio::test]
    async fn test_clones_share_buffer() {
        let sink = InMemorySink::new();
        let handle = sink.clone();
        sink.send("out", None, b"x").await.unwrap();
        assert_eq!(handle.count("out"), 1);
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_records() {
        let sink = TracingSink::new("Masked Transaction");
        assert!(sink.send("masked", Some(b"k"), b"v").await.is_ok());
        assert!(sink.flush().await.is_ok());
    }
}
