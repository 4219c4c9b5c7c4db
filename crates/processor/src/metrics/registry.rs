//! Prometheus registry shared by the drivers of one run

use parking_lot::RwLock;
use prometheus_client::registry::{Metric, Registry};
use std::sync::Arc;

use super::{MetricsError, Result};

/// Thread-safe registry for Prometheus metrics
///
/// Clones share the same underlying registry.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<RwLock<Registry>>,
}

impl MetricsRegistry {
    /// Create a new metrics registry with the `rivulet` prefix
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::with_prefix("rivulet"))),
        }
    }

    /// Register a metric under `name`
    pub fn register<M: Metric>(&self, name: &str, help: &str, metric: M) {
        self.registry.write().register(name, help, metric);
    }

    /// Encode metrics in Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let registry = self.registry.read();
        let mut buffer = String::new();

        prometheus_client::encoding::text::encode(&mut buffer, &registry)
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

        Ok(buffer)
    }

    #[cfg(test)]
    fn shares_registry_with(&self, other: &MetricsRegistry) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::metrics::counter::Counter;

    #[test]
    fn test_empty_registry_encodes() {
        let registry = MetricsRegistry::new();
        let text = registry.encode().unwrap();
        assert!(text.contains("# EOF"));
    }

    #[test]
    fn test_registered_metric_is_prefixed() {
        let registry = MetricsRegistry::new();
        let counter = Counter::<u64>::default();
        registry.register("test_events", "Events seen", counter.clone());
        counter.inc_by(3);

        let text = registry.encode().unwrap();
        assert!(text.contains("rivulet_test_events_total 3"));
    }

    #[test]
    fn test_registry_clone() {
        let registry1 = MetricsRegistry::new();
        let registry2 = registry1.clone();
        assert!(registry1.shares_registry_with(&registry2));
    }
}
