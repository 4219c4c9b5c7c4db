//! Demo topologies, input tooling and command implementations for the
//! `rivulet` binary

pub mod commands;
pub mod error;
pub mod generator;
pub mod input;
pub mod pipelines;
pub mod sinks;

pub use error::{CliError, CliResult};
pub use generator::TransactionGenerator;
pub use input::{partition_records, read_records, InputRecord};
pub use sinks::ConsoleSink;
