//! Core types and data models for the rivulet demo topologies
//!
//! This crate provides the payloads carried by the example streams: orders
//! and their per-city statistics, and card/bank transactions with the
//! enrichments the monitoring topology adds to them.

pub mod errors;
pub mod orders;
pub mod transactions;

pub use errors::{Result, TypesError};
pub use orders::{CityStats, CityStatsOutput, Order};
pub use transactions::{
    mask_digits, EnrichedTransaction, RiskLevel, ScrutinizedTransaction, Transaction, CHANNELS,
    CITIES, SCRUTINY_REASON,
};
