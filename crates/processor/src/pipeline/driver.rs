//! Stream driver: the poll, route, advance, commit loop
//!
//! A [`StreamDriver`] owns one topology instance and one source and runs them
//! single-threaded. For every polled record it:
//!
//! 1. routes the record through the topology,
//! 2. applies the `on_record_error` policy if routing failed with a record error
//!    (a skipped record keeps whatever the roots before the failure already
//!    did, see [`Topology::route`]),
//! 3. advances the watermark to the record timestamp and routes closed windows,
//! 4. commits the record offset (immediately, or on the commit interval).
//!
//! Delivery is at-least-once: an offset is committed only after everything the
//! record produced has been handed to the sinks, so a crash between sending and
//! committing replays the record on restart. Fatal errors return without
//! committing the failed record.
//!
//! Parallelism is across partition groups: [`run_partition_groups`] spawns one
//! driver per group, each with its own topology and state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::config::{EngineConfig, RecordErrorPolicy};
use crate::core::DisplayKey;
use crate::error::{ProcessorError, Result};
use crate::io::{Source, SourceRecord};
use crate::metrics::DriverMetrics;
use crate::pipeline::operator::OperatorContext;
use crate::pipeline::topology::{RouteReport, Topology};
use crate::watermark::{MaxTimestampWatermark, Watermark, WatermarkGenerator};

/// Statistics for one driver run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStats {
    /// Records returned by the source
    pub records_polled: u64,

    /// Records routed without error
    pub records_processed: u64,

    /// Records dropped under the skip policy
    pub records_skipped: u64,

    /// Records dropped because their window had closed
    pub late_records_dropped: u64,

    /// Windows emitted on watermark advance
    pub windows_emitted: u64,

    /// Offset commits sent to the source
    pub commits: u64,

    /// Highest offset committed so far
    pub last_committed_offset: Option<u64>,

    /// Current watermark timestamp
    pub current_watermark: i64,

    /// Errors seen, skipped or not
    pub errors: u64,
}

impl Default for DriverStats {
    fn default() -> Self {
        Self {
            records_polled: 0,
            records_processed: 0,
            records_skipped: 0,
            late_records_dropped: 0,
            windows_emitted: 0,
            commits: 0,
            last_committed_offset: None,
            current_watermark: Watermark::min().timestamp,
            errors: 0,
        }
    }
}

impl DriverStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_records_processed(&mut self) {
        self.records_processed += 1;
    }

    pub fn inc_records_skipped(&mut self) {
        self.records_skipped += 1;
    }

    pub fn inc_errors(&mut self) {
        self.errors += 1;
    }

    /// Records per second over `elapsed_seconds`
    pub fn records_per_second(&self, elapsed_seconds: f64) -> f64 {
        if elapsed_seconds > 0.0 {
            self.records_processed as f64 / elapsed_seconds
        } else {
            0.0
        }
    }

    /// Sum of per-group statistics; the watermark is the lowest of the groups
    pub fn combine<'a, I>(stats: I) -> DriverStats
    where
        I: IntoIterator<Item = &'a DriverStats>,
    {
        let mut total = DriverStats::default();
        let mut watermark: Option<i64> = None;
        for s in stats {
            total.records_polled += s.records_polled;
            total.records_processed += s.records_processed;
            total.records_skipped += s.records_skipped;
            total.late_records_dropped += s.late_records_dropped;
            total.windows_emitted += s.windows_emitted;
            total.commits += s.commits;
            total.errors += s.errors;
            watermark = Some(watermark.map_or(s.current_watermark, |w| w.min(s.current_watermark)));
        }
        if let Some(watermark) = watermark {
            total.current_watermark = watermark;
        }
        total
    }
}

/// Cooperative stop signal for a running driver.
///
/// Checked between records; the record in flight is finished and its offset
/// committed before the driver returns.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Runs a topology against a source
pub struct StreamDriver {
    topology: Topology,
    source: Box<dyn Source>,
    config: EngineConfig,
    partition: u32,
    watermark: MaxTimestampWatermark,
    stop: StopHandle,
    stats: DriverStats,
    metrics: Option<DriverMetrics>,
    pending_offset: Option<u64>,
    last_commit: Instant,
}

impl StreamDriver {
    /// Create a driver for partition group 0
    pub fn new<S: Source + 'static>(topology: Topology, source: S, config: EngineConfig) -> Self {
        Self {
            topology,
            source: Box::new(source),
            config,
            partition: 0,
            watermark: MaxTimestampWatermark::new(),
            stop: StopHandle::new(),
            stats: DriverStats::new(),
            metrics: None,
            pending_offset: None,
            last_commit: Instant::now(),
        }
    }

    pub fn with_partition(mut self, partition: u32) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_metrics(mut self, metrics: DriverMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Use an existing stop signal, e.g. one shared by several drivers
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Handle that stops this driver from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stats(&self) -> DriverStats {
        self.stats.clone()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Run until the source is exhausted, a stop is requested or a fatal
    /// error occurs.
    pub async fn run(&mut self) -> Result<DriverStats> {
        self.config.validate()?;

        info!(
            topology = %self.topology.name(),
            partition = self.partition,
            on_record_error = %self.config.on_record_error,
            "Starting stream driver"
        );

        match self.run_loop().await {
            Ok(()) => {
                info!(
                    topology = %self.topology.name(),
                    partition = self.partition,
                    records_processed = self.stats.records_processed,
                    records_skipped = self.stats.records_skipped,
                    commits = self.stats.commits,
                    "Stream driver stopped"
                );
                Ok(self.stats.clone())
            }
            Err(e) => {
                error!(
                    topology = %self.topology.name(),
                    partition = self.partition,
                    error_type = e.error_type(),
                    error = %e,
                    "Stream driver failed"
                );
                Err(e)
            }
        }
    }

    async fn run_loop(&mut self) -> Result<()> {
        loop {
            if self.stop.is_stopped() {
                debug!(partition = self.partition, "Stop requested");
                break;
            }

            let batch = self.source.poll(self.config.max_poll_records).await?;
            if batch.is_empty() {
                if self.source.is_exhausted() {
                    debug!(partition = self.partition, "Source exhausted");
                    break;
                }
                self.maybe_commit().await?;
                tokio::time::sleep(self.config.poll_timeout()).await;
                continue;
            }

            self.stats.records_polled += batch.len() as u64;
            for record in batch {
                if self.stop.is_stopped() {
                    break;
                }
                self.process_record(record).await?;
            }
        }

        self.commit_pending().await
    }

    async fn process_record(&mut self, source_record: SourceRecord) -> Result<()> {
        let offset = source_record.offset;
        let record = source_record.into_record();
        let timestamp = record.timestamp();
        let key = record.key_bytes().map(<[u8]>::to_vec);

        let ctx = OperatorContext::new(self.watermark.current_watermark(), self.partition);
        match self.topology.route(record, &ctx).await {
            Ok(report) => {
                self.stats.inc_records_processed();
                if let Some(metrics) = &self.metrics {
                    metrics.records_processed.inc();
                }
                self.observe(report);
            }
            Err(e) => self.on_error(e, key.as_deref(), timestamp, offset)?,
        }

        if let Some(watermark) = self.watermark.on_event(timestamp) {
            self.stats.current_watermark = watermark.timestamp;
            if let Some(metrics) = &self.metrics {
                metrics.set_watermark(self.partition, watermark.timestamp);
            }

            let ctx = OperatorContext::new(watermark, self.partition);
            match self.topology.advance_watermark(&ctx).await {
                Ok(report) => self.observe(report),
                Err(e) => self.on_error(e, None, timestamp, offset)?,
            }
        }

        self.pending_offset = Some(offset);
        self.maybe_commit().await
    }

    /// Apply the error policy; returns the error when the driver must stop
    fn on_error(&mut self, err: ProcessorError, key: Option<&[u8]>, timestamp: i64, offset: u64) -> Result<()> {
        self.stats.inc_errors();

        if !err.is_record_error() {
            return Err(err);
        }

        match self.config.on_record_error {
            RecordErrorPolicy::Skip => {
                warn!(
                    partition = self.partition,
                    offset,
                    key = %DisplayKey(key),
                    timestamp,
                    error_type = err.error_type(),
                    reason = %err,
                    "Skipping record"
                );
                self.stats.inc_records_skipped();
                if let Some(metrics) = &self.metrics {
                    metrics.record_skipped(err.error_type());
                }
                Ok(())
            }
            RecordErrorPolicy::Halt => {
                error!(
                    partition = self.partition,
                    offset,
                    key = %DisplayKey(key),
                    timestamp,
                    "Halting on record error"
                );
                Err(err)
            }
        }
    }

    fn observe(&mut self, report: RouteReport) {
        for late in &report.late_dropped {
            debug!(
                operator = %late.operator,
                key = %DisplayKey(late.key.as_deref()),
                timestamp = late.timestamp,
                window = %late.window.id(),
                watermark = late.watermark,
                "Dropped late record"
            );
        }

        let late = report.late_dropped.len() as u64;
        let windows = report.windows_emitted as u64;
        self.stats.late_records_dropped += late;
        self.stats.windows_emitted += windows;

        if let Some(metrics) = &self.metrics {
            metrics.late_records_dropped.inc_by(late);
            metrics.windows_emitted.inc_by(windows);
        }
    }

    async fn maybe_commit(&mut self) -> Result<()> {
        match self.config.commit_interval() {
            None => self.commit_pending().await,
            Some(interval) if self.last_commit.elapsed() >= interval => self.commit_pending().await,
            Some(_) => Ok(()),
        }
    }

    async fn commit_pending(&mut self) -> Result<()> {
        let Some(offset) = self.pending_offset else {
            return Ok(());
        };

        self.source.commit(offset).await?;
        self.pending_offset = None;
        self.last_commit = Instant::now();

        self.stats.commits += 1;
        self.stats.last_committed_offset = Some(offset);
        if let Some(metrics) = &self.metrics {
            metrics.offsets_committed.inc();
        }

        trace!(partition = self.partition, offset, "Committed offset");
        Ok(())
    }
}

impl std::fmt::Debug for StreamDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDriver")
            .field("topology", &self.topology.name())
            .field("partition", &self.partition)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Run each driver on its own task and collect their statistics in order.
///
/// When one group fails the others are asked to stop, and the first error is
/// returned once every group has finished.
pub async fn run_partition_groups(drivers: Vec<StreamDriver>) -> Result<Vec<DriverStats>> {
    let stops: Vec<StopHandle> = drivers.iter().map(StreamDriver::stop_handle).collect();
    let handles: Vec<_> = drivers
        .into_iter()
        .map(|mut driver| tokio::spawn(async move { driver.run().await }))
        .collect();

    let mut all_stats = Vec::with_capacity(handles.len());
    let mut first_error = None;

    for handle in handles {
        let result = handle
            .await
            .map_err(|e| ProcessorError::Unexpected(format!("partition group task failed: {}", e)))
            .and_then(|result| result);

        match result {
            Ok(stats) => all_stats.push(stats),
            Err(e) => {
                if first_error.is_none() {
                    stops.iter().for_each(StopHandle::stop);
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(all_stats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, JsonCodec};
    use crate::core::Record;
    use crate::io::{InMemorySink, InMemorySource};
    use crate::pipeline::builder::TopologyBuilder;
    use crate::pipeline::operator::{MapOperator, SinkOperator};

    fn codec() -> Arc<dyn Codec<i64>> {
        Arc::new(JsonCodec)
    }

    fn checked_topology(sink: &InMemorySink) -> Topology {
        let mut builder = TopologyBuilder::new("checked");
        let map = builder.add_root(MapOperator::new("non-negative", codec(), codec(), |x: i64| {
            if x < 0 {
                Err(format!("negative value {}", x).into())
            } else {
                Ok(x)
            }
        }));
        builder
            .add_child(map, SinkOperator::new("out", "out", Arc::new(sink.clone())))
            .unwrap();
        builder.build().unwrap()
    }

    fn source(values: &[i64]) -> InMemorySource {
        InMemorySource::from_records(values.iter().enumerate().map(|(i, v)| {
            Record::new(Some(b"k".to_vec()), serde_json::to_vec(v).unwrap(), i as i64)
        }))
    }

    #[tokio::test]
    async fn test_driver_commits_every_record() {
        let sink = InMemorySink::new();
        let source = source(&[1, 2, 3]);
        let log = source.commit_log();

        let mut driver = StreamDriver::new(checked_topology(&sink), source, EngineConfig::default());
        let stats = driver.run().await.unwrap();

        assert_eq!(stats.records_polled, 3);
        assert_eq!(stats.records_processed, 3);
        assert_eq!(stats.commits, 3);
        assert_eq!(stats.last_committed_offset, Some(2));
        assert_eq!(stats.current_watermark, 2);
        assert_eq!(log.history(), vec![0, 1, 2]);
        assert_eq!(sink.count("out"), 3);
    }

    #[tokio::test]
    async fn test_driver_skips_record_errors() {
        let sink = InMemorySink::new();
        let source = source(&[1, -2, 3]);
        let log = source.commit_log();

        let mut driver = StreamDriver::new(checked_topology(&sink), source, EngineConfig::default());
        let stats = driver.run().await.unwrap();

        assert_eq!(stats.records_processed, 2);
        assert_eq!(stats.records_skipped, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(log.committed(), Some(2));
        assert_eq!(sink.count("out"), 2);
    }

    #[tokio::test]
    async fn test_driver_halts_on_record_error() {
        let sink = InMemorySink::new();
        let source = source(&[1, -2, 3]);
        let log = source.commit_log();

        let config = EngineConfig::default().with_record_error_policy(RecordErrorPolicy::Halt);
        let mut driver = StreamDriver::new(checked_topology(&sink), source, config);
        let err = driver.run().await.unwrap_err();

        assert!(matches!(err, ProcessorError::Transform { .. }));
        // the failing record is not committed
        assert_eq!(log.committed(), Some(0));
        assert_eq!(sink.count("out"), 1);
    }

    #[tokio::test]
    async fn test_driver_interval_commit() {
        let sink = InMemorySink::new();
        let source = source(&[1, 2, 3, 4]);
        let log = source.commit_log();

        let config = EngineConfig::default().with_commit_interval_ms(60_000);
        let mut driver = StreamDriver::new(checked_topology(&sink), source, config);
        let stats = driver.run().await.unwrap();

        // nothing is due within the interval; the final offset is committed on exhaustion
        assert_eq!(log.history(), vec![3]);
        assert_eq!(stats.commits, 1);
    }

    #[tokio::test]
    async fn test_driver_rejects_invalid_config() {
        let sink = InMemorySink::new();
        let config = EngineConfig::default().with_max_poll_records(0);
        let mut driver = StreamDriver::new(checked_topology(&sink), source(&[1]), config);
        assert!(matches!(
            driver.run().await,
            Err(ProcessorError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_driver_stopped_before_start() {
        let sink = InMemorySink::new();
        let source = source(&[1, 2]);
        let log = source.commit_log();

        let mut driver = StreamDriver::new(checked_topology(&sink), source, EngineConfig::default());
        driver.stop_handle().stop();
        let stats = driver.run().await.unwrap();

        assert_eq!(stats.records_processed, 0);
        assert_eq!(log.committed(), None);
    }

    #[tokio::test]
    async fn test_driver_metrics() {
        let registry = crate::metrics::MetricsRegistry::new();
        let metrics = DriverMetrics::register(&registry);
        let sink = InMemorySink::new();

        let mut driver = StreamDriver::new(checked_topology(&sink), source(&[1, -1, 2]), EngineConfig::default())
            .with_partition(4)
            .with_metrics(metrics.clone());
        driver.run().await.unwrap();

        assert_eq!(metrics.records_processed.get(), 2);
        assert_eq!(metrics.offsets_committed.get(), 3);
        let text = registry.encode().unwrap();
        assert!(text.contains(r#"rivulet_records_skipped_total{error_type="transform"} 1"#));
        assert!(text.contains(r#"rivulet_watermark_ms{partition="4"} 2"#));
    }

    #[tokio::test]
    async fn test_run_partition_groups() {
        let sink = InMemorySink::new();
        let drivers = vec![
            StreamDriver::new(checked_topology(&sink), source(&[1, 2]), EngineConfig::default()),
            StreamDriver::new(checked_topology(&sink), source(&[3]), EngineConfig::default())
                .with_partition(1),
        ];

        let stats = run_partition_groups(drivers).await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].records_processed, 2);
        assert_eq!(stats[1].records_processed, 1);
        assert_eq!(DriverStats::combine(&stats).records_processed, 3);
        assert_eq!(sink.count("out"), 3);
    }

    #[test]
    fn test_stats_combine_uses_lowest_watermark() {
        let a = DriverStats {
            current_watermark: 10,
            commits: 2,
            ..DriverStats::default()
        };
        let b = DriverStats {
            current_watermark: 4,
            commits: 1,
            ..DriverStats::default()
        };
        let total = DriverStats::combine([&a, &b]);
        assert_eq!(total.current_watermark, 4);
        assert_eq!(total.commits, 3);
        assert_eq!(DriverStats::combine(std::iter::empty()).current_watermark, Watermark::min().timestamp);
    }
}
