//! The demo topologies
//!
//! - [`city_orders`]: running order count and revenue per city
//! - [`transactions`]: risk routing, per-city statistics, windowed counts,
//!   scrutiny flags, enrichment, masking and per-channel rekeying over one
//!   transaction stream

pub mod city_orders;
pub mod transactions;

use std::sync::Arc;

use processor::{Codec, JsonCodec, RawRecord, StringCodec};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub(crate) fn json<T: Serialize + DeserializeOwned>() -> Arc<dyn Codec<T>> {
    Arc::new(JsonCodec)
}

pub(crate) fn text() -> Arc<dyn Codec<String>> {
    Arc::new(StringCodec)
}

/// State store name scoped to an application
pub fn store_name(application_id: &str, store: &str) -> String {
    format!("{}-{}", application_id, store)
}

#[derive(Deserialize)]
struct CityField {
    city: String,
}

/// Partition key shared by both topologies: the `city` field of the value.
///
/// Both aggregate per city after rekeying, so grouping input by city keeps each
/// city's statistics and windows in one partition group. `None` when the value
/// has no string `city`.
pub fn city_partition_key(record: &RawRecord) -> Option<Vec<u8>> {
    serde_json::from_slice::<CityField>(record.value())
        .ok()
        .map(|field| field.city.into_bytes())
}
