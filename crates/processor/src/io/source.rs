//! Record sources
//!
//! A [`Source`] is the pull side of the transport: it hands out batches of
//! offset-stamped records and accepts commits of processed offsets. Topic reads,
//! partition assignment and durable offset storage belong to the transport; the
//! engine only needs this interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

use crate::core::{RawRecord, Record};
use crate::error::{ProcessorError, Result};

/// A polled record with its position in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Position of the record; strictly increasing within a source
    pub offset: u64,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
    /// Event time in milliseconds since epoch
    pub timestamp: i64,
}

impl SourceRecord {
    pub fn new(offset: u64, key: Option<Vec<u8>>, value: Vec<u8>, timestamp: i64) -> Self {
        Self {
            offset,
            key,
            value,
            timestamp,
        }
    }

    /// Drop the offset and keep the record
    pub fn into_record(self) -> RawRecord {
        Record::new(self.key, self.value, self.timestamp)
    }
}

/// Pull-based record source
#[async_trait]
pub trait Source: Send {
    /// Fetch up to `max_records` records in arrival order.
    ///
    /// An empty batch means nothing is available right now.
    async fn poll(&mut self, max_records: usize) -> Result<Vec<SourceRecord>>;

    /// Record that every offset up to and including `offset` is processed
    async fn commit(&mut self, offset: u64) -> Result<()>;

    /// True when no further records will ever arrive
    fn is_exhausted(&self) -> bool;
}

/// One commit as seen by a [`CommitLog`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub offset: u64,
    pub committed_at: DateTime<Utc>,
}

/// Shared record of the offsets committed by a source.
///
/// Clones share state, so a test or supervisor can keep a handle while the
/// driver owns the source, and a restarted source can resume from it.
#[derive(Debug, Clone, Default)]
pub struct CommitLog {
    inner: Arc<Mutex<Vec<CommitInfo>>>,
}

impl CommitLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest committed offset
    pub fn committed(&self) -> Option<u64> {
        self.inner.lock().last().map(|info| info.offset)
    }

    /// Every commit in order
    pub fn history(&self) -> Vec<u64> {
        self.inner.lock().iter().map(|info| info.offset).collect()
    }

    pub fn last_commit(&self) -> Option<CommitInfo> {
        self.inner.lock().last().cloned()
    }

    fn record(&self, offset: u64) -> Result<()> {
        let mut commits = self.inner.lock();
        if let Some(last) = commits.last() {
            if offset < last.offset {
                return Err(ProcessorError::Source(format!(
                    "commit of offset {} is behind committed offset {}",
                    offset, last.offset
                )));
            }
        }
        commits.push(CommitInfo {
            offset,
            committed_at: Utc::now(),
        });
        Ok(())
    }
}

/// Bounded source over an in-memory list of records
#[derive(Debug, Default)]
pub struct InMemorySource {
    pending: VecDeque<SourceRecord>,
    next_offset: u64,
    commit_log: CommitLog,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source over `records`, numbered from offset 0
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut source = Self::new();
        for record in records {
            source.push(record);
        }
        source
    }

    /// Replay `records` after a restart: only offsets above `committed` are
    /// delivered again.
    pub fn resume_from(records: Vec<SourceRecord>, committed: Option<u64>) -> Self {
        let pending: VecDeque<SourceRecord> = records
            .into_iter()
            .filter(|record| committed.map_or(true, |c| record.offset > c))
            .collect();
        let next_offset = pending.back().map_or(0, |record| record.offset + 1);

        Self {
            pending,
            next_offset,
            commit_log: CommitLog::new(),
        }
    }

    /// Share an existing commit log
    pub fn with_commit_log(mut self, commit_log: CommitLog) -> Self {
        self.commit_log = commit_log;
        self
    }

    /// Append a record with the next offset
    pub fn push(&mut self, record: RawRecord) -> u64 {
        let offset = self.next_offset;
        let (key, value, timestamp) = record.into_parts();
        self.pending
            .push_back(SourceRecord::new(offset, key, value, timestamp));
        self.next_offset += 1;
        offset
    }

    pub fn commit_log(&self) -> CommitLog {
        self.commit_log.clone()
    }

    /// Records not yet polled
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn poll(&mut self, max_records: usize) -> Result<Vec<SourceRecord>> {
        let count = max_records.min(self.pending.len());
        let batch: Vec<SourceRecord> = self.pending.drain(..count).collect();
        trace!(records = batch.len(), remaining = self.pending.len(), "Polled records");
        Ok(batch)
    }

    async fn commit(&mut self, offset: u64) -> Result<()> {
        self.commit_log.record(offset)
    }

    fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<RawRecord> {
        (0..n)
            .map(|i| Record::new(Some(b"k".to_vec()), vec![i as u8], i as i64))
            .collect()
    }

    #[tokio::test]
    async fn test_poll_in_batches() {
        let mut source = InMemorySource::from_records(records(5));

        let batch = source.poll(2).await.unwrap();
        assert_eq!(batch.iter().map(|r| r.offset).collect::<Vec<_>>(), vec![0, 1]);
        assert!(!source.is_exhausted());

        let batch = source.poll(10).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert!(source.is_exhausted());
        assert!(source.poll(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_log_is_shared() {
        let mut source = InMemorySource::from_records(records(3));
        let log = source.commit_log();

        source.commit(0).await.unwrap();
        source.commit(2).await.unwrap();

        assert_eq!(log.committed(), Some(2));
        assert_eq!(log.history(), vec![0, 2]);
        assert!(log.last_commit().is_some());
    }

    #[tokio::test]
    async fn test_commit_cannot_go_backwards() {
        let mut source = InMemorySource::from_records(records(3));
        source.commit(2).await.unwrap();
        assert!(matches!(
            source.commit(1).await,
            Err(ProcessorError::Source(_))
        ));
    }

    #[tokio::test]
    async fn test_resume_from_committed() {
        let all: Vec<SourceRecord> = records(4)
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let (key, value, ts) = r.into_parts();
                SourceRecord::new(i as u64, key, value, ts)
            })
            .collect();

        let mut source = InMemorySource::resume_from(all.clone(), Some(1));
        let batch = source.poll(10).await.unwrap();
        assert_eq!(batch.iter().map(|r| r.offset).collect::<Vec<_>>(), vec![2, 3]);

        let mut fresh = InMemorySource::resume_from(all, None);
        assert_eq!(fresh.poll(10).await.unwrap().len(), 4);
    }
}
