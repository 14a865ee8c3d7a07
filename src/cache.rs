//! Deduplication and per-cell suppression over an expiring key-value store.

mod alert_cache;
mod memory;
mod store;

pub use alert_cache::{AlertCache, HASH_PREFIX, SUPPRESSION_PREFIX};
pub use memory::MemoryTtlStore;
pub use store::TtlStore;
