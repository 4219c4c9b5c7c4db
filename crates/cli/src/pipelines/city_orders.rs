//! City-wise order aggregation
//!
//! `cisco.orders` carries `{city, price}` orders. They are rekeyed by city,
//! folded into a running `{orderCount, totalAmount}` per city, and every update
//! is published to `cisco.city.orders.stats` with the city spelled out.

use std::sync::Arc;

use processor::{
    AggregateCodecs, AggregateOperator, AggregationStore, KeyedMapOperator, ProcessorResult,
    RekeyOperator, SinkOperator, Sink, StateBackend, Topology, TopologyBuilder,
};
use rivulet_types::{CityStats, CityStatsOutput, Order};

use super::{json, store_name, text};

pub const INPUT_TOPIC: &str = "cisco.orders";
pub const OUTPUT_TOPIC: &str = "cisco.city.orders.stats";
pub const STATS_STORE: &str = "city-order-stats";

/// Build the topology over `backend`, publishing to `sink`.
///
/// Aggregates live in the store named
/// [`store_name(application_id, STATS_STORE)`](super::store_name).
pub fn build(
    sink: Arc<dyn Sink>,
    backend: Arc<dyn StateBackend>,
    application_id: &str,
) -> ProcessorResult<Topology> {
    let store: AggregationStore<String, CityStats> =
        AggregationStore::new(store_name(application_id, STATS_STORE), backend)?;

    let mut builder = TopologyBuilder::new("city-orders")
        .with_description(format!("{} -> {}", INPUT_TOPIC, OUTPUT_TOPIC));

    let by_city = builder.add_root(RekeyOperator::new(
        "order-by-city",
        json::<Order>(),
        text(),
        |order: &Order| {
            order.validate().map_err(|e| e.to_string())?;
            Ok(order.city.clone())
        },
    ));

    let stats = builder.add_child(
        by_city,
        AggregateOperator::new(
            "city-order-stats",
            AggregateCodecs::new(text(), json::<Order>(), json::<CityStats>()),
            store,
            CityStats::default,
            |_city: &String, order: Order, stats: CityStats| Ok(stats.record(order.price)),
        ),
    )?;

    let output = builder.add_child(
        stats,
        KeyedMapOperator::new(
            "city-stats-output",
            text(),
            json::<CityStats>(),
            json::<CityStatsOutput>(),
            |city: &String, stats: CityStats| Ok(CityStatsOutput::new(city.clone(), stats)),
        ),
    )?;

    builder.add_child(output, SinkOperator::new("city-stats-sink", OUTPUT_TOPIC, sink))?;

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use processor::{InMemorySink, MemoryStateBackend};

    #[test]
    fn test_shape() {
        let topology = build(
            Arc::new(InMemorySink::new()),
            Arc::new(MemoryStateBackend::new()),
            "rivulet",
        )
        .unwrap();

        assert_eq!(
            topology.operator_names(),
            vec!["order-by-city", "city-order-stats", "city-stats-output", "city-stats-sink"]
        );
        assert_eq!(topology.roots().len(), 1);
    }
}
