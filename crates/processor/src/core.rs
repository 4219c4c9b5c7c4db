//! Core record type flowing through a topology
//!
//! A [`Record`] is an immutable `(key, value, timestamp)` triple. Operators never
//! mutate a record in place; rekeying or mapping consumes the record and returns a
//! new one. Between operators records travel in their encoded form, [`RawRecord`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable keyed, timestamped payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<K, V> {
    key: K,
    value: V,
    timestamp: i64,
}

/// Encoded record as exchanged between operators, sources and sinks
pub type RawRecord = Record<Option<Vec<u8>>, Vec<u8>>;

impl<K, V> Record<K, V> {
    /// Create a new record
    pub fn new(key: K, value: V, timestamp: i64) -> Self {
        Self {
            key,
            value,
            timestamp,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    /// Event time in milliseconds since epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Rebind the key, keeping value and timestamp
    pub fn with_key<K2>(self, key: K2) -> Record<K2, V> {
        Record {
            key,
            value: self.value,
            timestamp: self.timestamp,
        }
    }

    /// Replace the value, keeping key and timestamp
    pub fn with_value<V2>(self, value: V2) -> Record<K, V2> {
        Record {
            key: self.key,
            value,
            timestamp: self.timestamp,
        }
    }

    /// Transform the value, keeping key and timestamp
    pub fn map_value<V2, F>(self, f: F) -> Record<K, V2>
    where
        F: FnOnce(V) -> V2,
    {
        Record {
            key: self.key,
            value: f(self.value),
            timestamp: self.timestamp,
        }
    }

    /// Split the record into its parts
    pub fn into_parts(self) -> (K, V, i64) {
        (self.key, self.value, self.timestamp)
    }
}

impl RawRecord {
    /// Create an encoded record
    pub fn raw(key: Option<Vec<u8>>, value: Vec<u8>, timestamp: i64) -> Self {
        Record::new(key, value, timestamp)
    }

    /// Key bytes, if the record carries a key
    pub fn key_bytes(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    /// Human readable key for log lines
    pub fn display_key(&self) -> DisplayKey<'_> {
        DisplayKey(self.key.as_deref())
    }
}

/// Lossy UTF-8 rendering of an optional key
#[derive(Debug, Clone, Copy)]
pub struct DisplayKey<'a>(pub Option<&'a [u8]>);

impl fmt::Display for DisplayKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            None => write!(f, "<none>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let record = Record::new("Mumbai".to_string(), 100.0, 0);
        assert_eq!(record.key(), "Mumbai");
        assert_eq!(*record.value(), 100.0);
        assert_eq!(record.timestamp(), 0);
    }

    #[test]
    fn test_with_key_keeps_value_and_timestamp() {
        let record = Record::new(None::<String>, 42u32, 1_000);
        let rekeyed = record.clone().with_key(Some("Pune".to_string()));

        assert_eq!(rekeyed.key().as_deref(), Some("Pune"));
        assert_eq!(*rekeyed.value(), 42);
        assert_eq!(rekeyed.timestamp(), 1_000);
        // original is untouched
        assert!(record.key().is_none());
    }

    #[test]
    fn test_map_value() {
        let record = Record::new("k", 2, 7).map_value(|v| v * 10);
        assert_eq!(record.into_parts(), ("k", 20, 7));
    }

    #[test]
    fn test_display_key() {
        let keyed = RawRecord::raw(Some(b"Delhi".to_vec()), vec![], 0);
        assert_eq!(keyed.display_key().to_string(), "Delhi");

        let unkeyed = RawRecord::raw(None, vec![], 0);
        assert_eq!(unkeyed.display_key().to_string(), "<none>");
    }
}
