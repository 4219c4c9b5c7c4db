//! Real-time transaction monitoring
//!
//! Seven independent sub-topologies read the same `raw.transactions` stream:
//!
//! | root | output |
//! |---|---|
//! | branch by amount | `transactions.high`, `transactions.medium` (low is dropped) |
//! | city statistics | `city.transaction.stats` |
//! | windowed count per city | `city.transaction.windowed` |
//! | scrutiny flag | `transactions.scrutiny` |
//! | risk level | `transactions.enriched` |
//! | masked customer id | logged as "Masked Transaction" |
//! | rekey by channel | `transactions.by.channel` |

use std::sync::Arc;

use processor::{
    AggregateCodecs, AggregateOperator, AggregationStore, BranchOperator, EngineConfig,
    FilterOperator, MapOperator, ProcessorResult, RekeyOperator, SinkOperator, Sink,
    StateBackend, Topology, TopologyBuilder, TransformResult, WindowManager, WindowOperator,
    Windowed,
};
use rivulet_types::{CityStats, EnrichedTransaction, ScrutinizedTransaction, Transaction};

use super::{json, store_name, text};

pub const INPUT_TOPIC: &str = "raw.transactions";
pub const HIGH_TOPIC: &str = "transactions.high";
pub const MEDIUM_TOPIC: &str = "transactions.medium";
pub const CITY_STATS_TOPIC: &str = "city.transaction.stats";
pub const WINDOWED_TOPIC: &str = "city.transaction.windowed";
pub const SCRUTINY_TOPIC: &str = "transactions.scrutiny";
pub const ENRICHED_TOPIC: &str = "transactions.enriched";
pub const MASKED_TOPIC: &str = "transactions.masked";
pub const BY_CHANNEL_TOPIC: &str = "transactions.by.channel";

pub const CITY_STATS_STORE: &str = "city-transaction-stats";

/// Label of the masked transaction log
pub const MASKED_LABEL: &str = "Masked Transaction";

/// Commit interval used when the configuration leaves it at per-record
pub const DEFAULT_COMMIT_INTERVAL_MS: u64 = 1000;

const HIGH_AMOUNT: f64 = 5000.0;
const MEDIUM_AMOUNT: f64 = 1000.0;

/// Where each sub-topology delivers
#[derive(Debug, Clone)]
pub struct TransactionSinks {
    /// Every published topic
    pub output: Arc<dyn Sink>,
    /// Masked transactions
    pub masked: Arc<dyn Sink>,
}

/// Build the monitoring topology.
///
/// The window size and grace come from `config`. Per-city statistics live in
/// the store named [`store_name(application_id, CITY_STATS_STORE)`](super::store_name).
pub fn build(
    sinks: TransactionSinks,
    backend: Arc<dyn StateBackend>,
    application_id: &str,
    config: &EngineConfig,
) -> ProcessorResult<Topology> {
    let mut builder = TopologyBuilder::new("transactions")
        .with_description(format!("{} monitoring", INPUT_TOPIC));

    // Branch by amount
    let branch = builder.add_root(
        BranchOperator::new("amount-branch", json::<Transaction>())
            .branch("high", |tx: &Transaction| tx.amount >= HIGH_AMOUNT)
            .branch("medium", |tx: &Transaction| tx.amount >= MEDIUM_AMOUNT)
            .default_branch("low"),
    );
    builder.add_child(branch, SinkOperator::new("high-sink", HIGH_TOPIC, sinks.output.clone()))?;
    builder.add_child(branch, SinkOperator::new("medium-sink", MEDIUM_TOPIC, sinks.output.clone()))?;

    // City statistics
    let store: AggregationStore<String, CityStats> =
        AggregationStore::new(store_name(application_id, CITY_STATS_STORE), backend)?;
    let stats_by_city = builder.add_root(rekey_by_city("stats-by-city"));
    let stats = builder.add_child(
        stats_by_city,
        AggregateOperator::new(
            "city-transaction-stats",
            AggregateCodecs::new(text(), json::<Transaction>(), json::<CityStats>()),
            store,
            CityStats::default,
            |_city: &String, tx: Transaction, stats: CityStats| Ok(stats.record(tx.amount)),
        ),
    )?;
    builder.add_child(stats, SinkOperator::new("city-stats-sink", CITY_STATS_TOPIC, sinks.output.clone()))?;

    // Windowed count per city
    let windows = WindowManager::tumbling(config.window_size_ms, config.grace_ms)?;
    let windowed_by_city = builder.add_root(rekey_by_city("windowed-by-city"));
    let counts = builder.add_child(
        windowed_by_city,
        WindowOperator::new(
            "city-transaction-windowed",
            AggregateCodecs::new(text(), json::<Transaction>(), json::<Windowed<u64>>()),
            windows,
            || 0u64,
            |_city: &String, _tx: Transaction, count: u64| Ok(count + 1),
        ),
    )?;
    let labelled = builder.add_child(
        counts,
        MapOperator::new(
            "windowed-count-label",
            json::<Windowed<u64>>(),
            text(),
            |windowed: Windowed<u64>| Ok(format!("WindowedCount: {}", windowed.value)),
        ),
    )?;
    builder.add_child(labelled, SinkOperator::new("windowed-sink", WINDOWED_TOPIC, sinks.output.clone()))?;

    // Scrutiny
    let suspicious = builder.add_root(FilterOperator::new(
        "scrutiny-filter",
        json::<Transaction>(),
        |tx: &Transaction| tx.needs_scrutiny(),
    ));
    let flagged = builder.add_child(
        suspicious,
        MapOperator::new(
            "flag-high-risk",
            json::<Transaction>(),
            json::<ScrutinizedTransaction>(),
            |tx: Transaction| Ok(tx.scrutinized()),
        ),
    )?;
    builder.add_child(flagged, SinkOperator::new("scrutiny-sink", SCRUTINY_TOPIC, sinks.output.clone()))?;

    // Risk level
    let enriched = builder.add_root(MapOperator::new(
        "risk-level",
        json::<Transaction>(),
        json::<EnrichedTransaction>(),
        |tx: Transaction| Ok(tx.enriched()),
    ));
    builder.add_child(enriched, SinkOperator::new("enriched-sink", ENRICHED_TOPIC, sinks.output.clone()))?;

    // Masking
    let masked = builder.add_root(MapOperator::new(
        "mask-customer",
        json::<Transaction>(),
        json::<Transaction>(),
        |tx: Transaction| Ok(tx.masked()),
    ));
    builder.add_child(masked, SinkOperator::new("masked-log", MASKED_TOPIC, sinks.masked))?;

    // Rekey by channel
    let by_channel = builder.add_root(RekeyOperator::new(
        "rekey-by-channel",
        json::<Transaction>(),
        text(),
        |tx: &Transaction| Ok(tx.channel.clone()),
    ));
    builder.add_child(by_channel, SinkOperator::new("by-channel-sink", BY_CHANNEL_TOPIC, sinks.output))?;

    builder.build()
}

fn rekey_by_city(
    name: &str,
) -> RekeyOperator<Transaction, String, impl Fn(&Transaction) -> TransformResult<String> + Send + Sync> {
    RekeyOperator::new(name, json::<Transaction>(), text(), |tx: &Transaction| Ok(tx.city.clone()))
}

/// Engine settings for this topology: the configured ones, with the commit
/// interval defaulted to [`DEFAULT_COMMIT_INTERVAL_MS`] when left at zero
pub fn engine_config(config: &EngineConfig) -> EngineConfig {
    if config.commit_interval_ms == 0 {
        config.clone().with_commit_interval_ms(DEFAULT_COMMIT_INTERVAL_MS)
    } else {
        config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use processor::{InMemorySink, MemoryStateBackend, TracingSink};

    #[test]
    fn test_roots_are_independent() {
        let topology = build(
            TransactionSinks {
                output: Arc::new(InMemorySink::new()),
                masked: Arc::new(TracingSink::new(MASKED_LABEL)),
            },
            Arc::new(MemoryStateBackend::new()),
            "rivulet",
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(topology.roots().len(), 7);
        assert_eq!(topology.node_count(), 19);
    }

    #[test]
    fn test_engine_config_defaults_commit_interval() {
        let config = engine_config(&EngineConfig::default());
        assert_eq!(config.commit_interval_ms, DEFAULT_COMMIT_INTERVAL_MS);

        let explicit = engine_config(&EngineConfig::default().with_commit_interval_ms(250));
        assert_eq!(explicit.commit_interval_ms, 250);
    }
}
