//! Driver metrics

use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;

use super::labels::{ErrorLabels, PartitionLabels};
use super::registry::MetricsRegistry;

/// Counters and gauges updated by [`StreamDriver`](crate::pipeline::StreamDriver).
///
/// Handles are cheap to clone and share their values, so several partition
/// groups can report into one set of series.
#[derive(Debug, Clone, Default)]
pub struct DriverMetrics {
    pub records_processed: Counter,
    pub records_skipped: Family<ErrorLabels, Counter>,
    pub late_records_dropped: Counter,
    pub windows_emitted: Counter,
    pub offsets_committed: Counter,
    pub watermark: Family<PartitionLabels, Gauge>,
}

impl DriverMetrics {
    /// Create the metrics and register them with `registry`
    pub fn register(registry: &MetricsRegistry) -> Self {
        let metrics = Self::default();

        registry.register(
            "records_processed",
            "Records routed through the topology without error",
            metrics.records_processed.clone(),
        );
        registry.register(
            "records_skipped",
            "Records skipped after a per-record error",
            metrics.records_skipped.clone(),
        );
        registry.register(
            "late_records_dropped",
            "Records dropped because their window had already closed",
            metrics.late_records_dropped.clone(),
        );
        registry.register(
            "windows_emitted",
            "Windows emitted after the watermark passed their end",
            metrics.windows_emitted.clone(),
        );
        registry.register(
            "offsets_committed",
            "Offset commits sent to the source",
            metrics.offsets_committed.clone(),
        );
        registry.register(
            "watermark_ms",
            "Current event-time watermark in epoch milliseconds",
            metrics.watermark.clone(),
        );

        metrics
    }

    pub fn record_skipped(&self, error_type: &str) {
        self.records_skipped
            .get_or_create(&ErrorLabels::new(error_type))
            .inc();
    }

    pub fn set_watermark(&self, partition: u32, watermark: i64) {
        self.watermark
            .get_or_create(&PartitionLabels::new(partition))
            .set(watermark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_metrics_exposition() {
        let registry = MetricsRegistry::new();
        let metrics = DriverMetrics::register(&registry);

        metrics.records_processed.inc_by(5);
        metrics.record_skipped("decode");
        metrics.record_skipped("decode");
        metrics.late_records_dropped.inc();
        metrics.windows_emitted.inc_by(2);
        metrics.offsets_committed.inc_by(5);
        metrics.set_watermark(0, 7);

        let text = registry.encode().unwrap();
        assert!(text.contains("rivulet_records_processed_total 5"));
        assert!(text.contains(r#"rivulet_records_skipped_total{error_type="decode"} 2"#));
        assert!(text.contains("rivulet_late_records_dropped_total 1"));
        assert!(text.contains("rivulet_windows_emitted_total 2"));
        assert!(text.contains("rivulet_offsets_committed_total 5"));
        assert!(text.contains(r#"rivulet_watermark_ms{partition="0"} 7"#));
    }

    #[test]
    fn test_clones_share_values() {
        let metrics = DriverMetrics::default();
        let clone = metrics.clone();
        clone.records_processed.inc();
        assert_eq!(metrics.records_processed.get(), 1);
    }
}
