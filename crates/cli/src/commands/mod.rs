//! CLI command implementations

pub mod config;
pub mod generate;
pub mod run;

pub use config::ConfigCommand;
pub use generate::GenerateArgs;
pub use run::{RunCommand, RunOptions, RunReport};
