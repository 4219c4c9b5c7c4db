//! State management for stream processing
//!
//! - [`StateBackend`]: byte-oriented key-value interface
//! - [`MemoryStateBackend`]: DashMap-backed implementation
//! - [`AggregationStore`]: typed, namespaced key-to-accumulator map used by
//!   aggregate operators, with a [`StoreReader`] for lookups from other tasks
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use processor::state::AggregationStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = AggregationStore::<String, u64>::in_memory("order-counts")?;
//!     store.put(&"Mumbai".to_string(), &2).await?;
//!
//!     let reader = store.reader();
//!     assert_eq!(reader.get(&"Mumbai".to_string()).await?, Some(2));
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod memory;
pub mod store;

pub use backend::StateBackend;
pub use memory::{MemoryBackendStats, MemoryStateBackend};
pub use store::{AggregationStore, StoreReader};
