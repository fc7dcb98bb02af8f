use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use uuid::Uuid;

use sm_core::{AggregateSnapshot, ResourceTiming, Session, StreamEvent, TimingSource};

use crate::KeyValueStore;

pub const CLIENT_ID_KEY: &str = "streaming_client_id";
pub const EVENTS_KEY: &str = "streamEvents";
pub const CURRENT_SESSION_KEY: &str = "videoSession";
pub const SNAPSHOT_KEY: &str = "streamingMetrics";
pub const TIMINGS_KEY: &str = "resourceTimings";

/// Resource timings kept while nothing drains them; older entries are dropped.
pub const MAX_PENDING_TIMINGS: usize = 150;

/// Random characters appended to a generated client id.
const CLIENT_ID_SUFFIX_LEN: usize = 9;

/// Event log and aggregate persistence over a key-value medium.
///
/// Nothing here returns an error: storage faults are logged and replaced by
/// empty defaults so playback tracking never stops because of storage.
#[derive(Debug, Clone)]
pub struct EventStore<S> {
    store: S,
}

impl<S: KeyValueStore> EventStore<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Appends an event to the durable log.
    ///
    /// Returns whether the event was persisted. Entries already in the log
    /// are kept verbatim, including ones this version cannot parse.
    pub fn append(&self, event: &StreamEvent) -> bool {
        let mut entries = self.raw_entries();
        let entry = match serde_json::value::to_raw_value(event) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(%err, "failed to encode event");
                return false;
            }
        };
        entries.push(entry);
        self.write(EVENTS_KEY, &entries)
    }

    /// Every parseable event in recorded order.
    ///
    /// An unreadable or corrupt log yields an empty list; individual
    /// malformed entries are skipped.
    pub fn load_all(&self) -> Vec<StreamEvent> {
        let entries = self.raw_entries();
        let mut events = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match serde_json::from_str(entry.get()) {
                Ok(event) => events.push(event),
                Err(err) => tracing::warn!(index, %err, "skipping malformed event"),
            }
        }
        events
    }

    pub fn current_session(&self) -> Option<Session> {
        self.read(CURRENT_SESSION_KEY)
    }

    /// Stores the current-session record, or clears it for `None`.
    pub fn set_current_session(&self, session: Option<&Session>) -> bool {
        match session {
            Some(session) => self.write(CURRENT_SESSION_KEY, session),
            None => match self.store.remove(CURRENT_SESSION_KEY) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(%err, key = CURRENT_SESSION_KEY, "failed to clear");
                    false
                }
            },
        }
    }

    pub fn load_snapshot(&self) -> Option<AggregateSnapshot> {
        self.read(SNAPSHOT_KEY)
    }

    pub fn save_snapshot(&self, snapshot: &AggregateSnapshot) -> bool {
        self.write(SNAPSHOT_KEY, snapshot)
    }

    /// Buffers a resource timing until the next [`drain`](TimingSource::drain).
    pub fn push_timing(&self, timing: &ResourceTiming) -> bool {
        let mut pending = self.pending_timings();
        if pending.len() >= MAX_PENDING_TIMINGS {
            let excess = pending.len() + 1 - MAX_PENDING_TIMINGS;
            pending.drain(..excess);
            tracing::debug!(dropped = excess, "timing buffer full");
        }
        pending.push(timing.clone());
        self.write(TIMINGS_KEY, &pending)
    }

    /// Buffered resource timings, oldest first.
    pub fn pending_timings(&self) -> Vec<ResourceTiming> {
        self.read(TIMINGS_KEY).unwrap_or_default()
    }

    /// The persistent client id, generating and caching one on first use.
    ///
    /// When the medium refuses the write the generated id is still returned,
    /// so it is stable for this process only.
    pub fn client_id(&self) -> String {
        match self.store.get(CLIENT_ID_KEY) {
            Ok(Some(id)) if !id.trim().is_empty() => return id,
            Ok(_) => {}
            Err(err) => tracing::warn!(%err, "failed to read client id"),
        }

        let id = generate_client_id(Utc::now().timestamp_millis());
        if let Err(err) = self.store.set(CLIENT_ID_KEY, &id) {
            tracing::warn!(%err, "failed to cache client id");
        } else {
            tracing::info!(client_id = %id, "generated client id");
        }
        id
    }

    fn raw_entries(&self) -> Vec<Box<RawValue>> {
        match self.store.get(EVENTS_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|err| {
                tracing::warn!(%err, "event log is corrupt, starting empty");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(%err, "failed to read event log");
                Vec::new()
            }
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = match self.store.get(key) {
            Ok(json) => json?,
            Err(err) => {
                tracing::warn!(%err, key, "failed to read");
                return None;
            }
        };
        serde_json::from_str(&json)
            .map_err(|err| tracing::warn!(%err, key, "ignoring malformed value"))
            .ok()
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(%err, key, "failed to encode");
                return false;
            }
        };
        match self.store.set(key, &json) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, key, "failed to write");
                false
            }
        }
    }
}

impl<S: KeyValueStore> TimingSource for EventStore<S> {
    /// Takes the buffered timings and clears the buffer.
    ///
    /// A timing pushed by another writer between the read and the clear is
    /// lost.
    fn drain(&self) -> Vec<ResourceTiming> {
        let pending = self.pending_timings();
        if pending.is_empty() {
            return pending;
        }
        if let Err(err) = self.store.remove(TIMINGS_KEY) {
            tracing::warn!(%err, key = TIMINGS_KEY, "failed to clear");
        }
        pending
    }
}

/// `client_<ms>_<9 random chars>`.
fn generate_client_id(now_ms: i64) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("client_{now_ms}_{}", &random[..CLIENT_ID_SUFFIX_LEN])
}
