//! Transport-facing interfaces: where records come from and where they go

pub mod sink;
pub mod source;

pub use sink::{InMemorySink, Sink, SinkRecord, TracingSink};
pub use source::{CommitInfo, CommitLog, InMemorySource, Source, SourceRecord};
