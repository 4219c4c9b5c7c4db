//! Stream processing pipeline module
//!
//! This module provides the pieces needed to describe and run a topology:
//! - Stream operators (map, filter, branch, rekey, aggregate, window, sink)
//! - A builder that wires operators into a validated [`Topology`]
//! - Depth-first record routing and watermark propagation
//! - A [`StreamDriver`] that polls a source, routes records and commits offsets
//!
//! # Example
//!
//! ```rust,no_run
//! use processor::codec::{Codec, JsonCodec};
//! use processor::config::EngineConfig;
//! use processor::core::Record;
//! use processor::io::{InMemorySink, InMemorySource};
//! use processor::pipeline::{MapOperator, SinkOperator, StreamDriver, TopologyBuilder};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let codec: Arc<dyn Codec<i64>> = Arc::new(JsonCodec);
//! let sink = InMemorySink::new();
//!
//! let mut builder = TopologyBuilder::new("doubler");
//! let double = builder.add_root(MapOperator::new("double", codec.clone(), codec, |x: i64| Ok(x * 2)));
//! builder.add_child(double, SinkOperator::new("out", "numbers.doubled", Arc::new(sink.clone())))?;
//!
//! let source = InMemorySource::from_records(vec![Record::new(None, b"21".to_vec(), 0)]);
//! let mut driver = StreamDriver::new(builder.build()?, source, EngineConfig::default());
//! let stats = driver.run().await?;
//! assert_eq!(stats.records_processed, 1);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod builder;
pub mod driver;
pub mod operator;
pub mod topology;

pub use aggregate::{AggregateCodecs, AggregateOperator, WindowOperator};
pub use builder::TopologyBuilder;
pub use driver::{run_partition_groups, DriverStats, StopHandle, StreamDriver};
pub use operator::{
    raw_record, BranchOperator, FilterOperator, KeyedMapOperator, MapOperator, OperatorContext, Output,
    RekeyOperator, SinkOperator, StreamOperator,
};
pub use topology::{NodeId, RouteReport, Topology};
