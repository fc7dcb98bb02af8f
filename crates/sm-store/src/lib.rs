//! Storage layer for the playback metrics aggregator.
//!
//! Everything durable lives in a flat key-value medium behind
//! [`KeyValueStore`]:
//! - [`SqliteStore`]: a single-table `rusqlite` database, optionally capped
//!   at a byte quota
//! - [`MemoryStore`]: an in-process map with fault injection for tests
//!
//! [`EventStore`] layers the event log, current-session record, aggregate
//! snapshot and client id on top of any medium.
//!
//! # Keys
//!
//! | key | value |
//! |---|---|
//! | `streamEvents` | JSON array of raw events, in recorded order |
//! | `streamingMetrics` | JSON aggregate snapshot |
//! | `videoSession` | JSON current-session record |
//! | `streaming_client_id` | plain-text client id |
//! | `resourceTimings` | JSON array of resource timings awaiting a sampler |
//!
//! Writes are synchronous and unbatched; the last writer wins.

mod events;
mod memory;
mod sqlite;

use thiserror::Error;

pub use events::{
    CLIENT_ID_KEY, CURRENT_SESSION_KEY, EVENTS_KEY, EventStore, MAX_PENDING_TIMINGS, SNAPSHOT_KEY,
    TIMINGS_KEY,
};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The write would push the medium past its byte quota.
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: u64, quota: u64 },
    /// The medium cannot be used at all.
    #[error("storage unavailable")]
    Unavailable,
}

/// A flat string key-value medium.
///
/// Methods take `&self`; implementations provide their own interior
/// synchronization where they need it.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Bytes a key-value pair counts against a quota.
fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}
