//! Single-process stream processing engine
//!
//! Records flow from a [`Source`](io::Source) through a [`Topology`] of
//! operators (map, filter, branch, rekey, keyed aggregate, tumbling window)
//! into [`Sink`](io::Sink)s. Keyed aggregates live in a namespaced state store;
//! windowed aggregates are held by a window manager and emitted once the
//! event-time watermark passes the end of their window. A [`StreamDriver`]
//! runs the poll, route, advance, commit loop with at-least-once delivery.

pub mod codec;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod state;
pub mod watermark;
pub mod window;

// Re-export commonly used types
pub use crate::core::{DisplayKey, RawRecord, Record};

pub use codec::{BincodeCodec, Codec, JsonCodec, StringCodec};

pub use config::{DeliveryGuarantee, EngineConfig, RecordErrorPolicy};

pub use error::{
    DecodeError, ProcessorError, StateError, StateResult, TransformError, TransformResult,
    WindowError, Result as ProcessorResult,
};

pub use io::{CommitLog, InMemorySink, InMemorySource, Sink, Source, SourceRecord, TracingSink};

pub use metrics::{DriverMetrics, MetricsRegistry};

pub use pipeline::{
    run_partition_groups, AggregateCodecs, AggregateOperator, BranchOperator, DriverStats,
    FilterOperator, KeyedMapOperator, MapOperator, OperatorContext, Output, RekeyOperator, RouteReport,
    SinkOperator, StopHandle, StreamDriver, StreamOperator, Topology, TopologyBuilder,
    WindowOperator,
};

pub use state::{AggregationStore, MemoryStateBackend, StateBackend, StoreReader};

pub use watermark::{MaxTimestampWatermark, Watermark, WatermarkGenerator};

pub use window::{
    LateRecordDropped, TumblingWindowAssigner, WindowAssigner, WindowBounds, WindowManager,
    Windowed,
};
