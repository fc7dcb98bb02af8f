//! Event-to-statistic reduction.
//!
//! The [`Aggregator`] owns the derived viewing statistics. Every state change
//! goes through [`Aggregator::apply`], so replaying a persisted log and applying
//! the same events live converge to the same [`AggregateState`].
//!
//! # Transition rules
//!
//! - `play`: one more active stream and view; a session opens unless the video
//!   already has an open one.
//! - `pause` / `complete`: one fewer active stream (floored at zero); the open
//!   session of that video closes and its whole seconds are credited.
//!   `complete` also counts a completion.
//! - anything else is ignored.

use std::collections::{BTreeMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::event::{EventType, StreamEvent};
use crate::session::{Device, Session};
use crate::types::VideoId;

/// Synthetic bandwidth units added per view and elapsed minute.
const BANDWIDTH_PER_VIEW: f64 = 5.0;

/// Upper bound (exclusive) of the random jitter added on each tick.
const BANDWIDTH_JITTER: f64 = 2.0;

/// Cumulative statistics for one video across all sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoStats {
    pub views: u64,
    pub completions: u64,
    /// Whole seconds watched across closed sessions.
    pub total_watch_time: u64,
    /// `total_watch_time / views`, kept in sync on every update.
    pub average_watch_time: f64,
}

impl VideoStats {
    fn record_view(&mut self) {
        self.views += 1;
        self.recompute_average();
    }

    fn add_watch_time(&mut self, seconds: u64) {
        self.total_watch_time += seconds;
        self.recompute_average();
    }

    #[allow(clippy::cast_precision_loss)]
    fn recompute_average(&mut self) {
        self.average_watch_time = if self.views > 0 {
            self.total_watch_time as f64 / self.views as f64
        } else {
            0.0
        };
    }

    /// Completion rate as a floored percentage; zero when there are no views.
    pub const fn completion_rate(&self) -> u64 {
        if self.views == 0 {
            0
        } else {
            self.completions * 100 / self.views
        }
    }

    /// Average watch time floored to whole seconds.
    pub const fn average_watch_seconds(&self) -> u64 {
        if self.views == 0 {
            0
        } else {
            self.total_watch_time / self.views
        }
    }
}

/// The persisted subset of [`AggregateState`].
///
/// Sessions and active streams are deliberately absent: they are derived from
/// the event log on every load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregateSnapshot {
    pub total_views: u64,
    pub videos_data: BTreeMap<VideoId, VideoStats>,
    pub bandwidth: f64,
}

/// Derived viewing statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateState {
    pub active_streams: u64,
    pub total_views: u64,
    /// Sessions, most recent first.
    pub sessions_data: VecDeque<Session>,
    pub videos_data: BTreeMap<VideoId, VideoStats>,
    /// Synthetic bandwidth estimate. Not a measurement.
    pub bandwidth: f64,
    /// Unix milliseconds the aggregation started at.
    pub start_time: i64,
}

impl AggregateState {
    pub fn new(start_time: i64) -> Self {
        Self {
            start_time,
            ..Self::default()
        }
    }

    /// Folds `events` over a zero state, in order.
    pub fn replay(start_time: i64, events: &[StreamEvent], device: Device) -> Self {
        let mut state = Self::new(start_time);
        for event in events {
            state.apply(event, device);
        }
        state
    }

    /// Applies a single event. See the [module docs](self) for the rules.
    pub fn apply(&mut self, event: &StreamEvent, device: Device) {
        match &event.kind {
            EventType::Play => self.apply_play(event, device),
            kind if kind.is_stop() => self.apply_stop(event),
            kind => {
                tracing::trace!(%kind, video_id = %event.video_id, "not a lifecycle event");
            }
        }
    }

    fn apply_play(&mut self, event: &StreamEvent, device: Device) {
        self.active_streams += 1;
        self.total_views += 1;
        self.videos_data
            .entry(event.video_id.clone())
            .or_default()
            .record_view();

        if self.open_session(&event.video_id).is_none() {
            self.sessions_data.push_front(Session::open(
                event.video_id.clone(),
                event.timestamp,
                device,
                event.resolution.as_deref(),
            ));
        }
    }

    fn apply_stop(&mut self, event: &StreamEvent) {
        self.active_streams = self.active_streams.saturating_sub(1);

        // Front-to-back finds the most recent open session.
        let Some(session) = self
            .sessions_data
            .iter_mut()
            .find(|s| s.video_id == event.video_id && s.is_open())
        else {
            tracing::debug!(video_id = %event.video_id, kind = %event.kind, "no open session");
            return;
        };

        session.end_time = Some(event.timestamp);
        let watched = session.watch_seconds().unwrap_or(0);

        let stats = self.videos_data.entry(event.video_id.clone()).or_default();
        stats.add_watch_time(watched);
        if event.kind == EventType::Complete {
            stats.completions += 1;
        }
    }

    /// The open session for `video_id`, if any.
    pub fn open_session(&self, video_id: &VideoId) -> Option<&Session> {
        self.sessions_data
            .iter()
            .find(|s| &s.video_id == video_id && s.is_open())
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            total_views: self.total_views,
            videos_data: self.videos_data.clone(),
            bandwidth: self.bandwidth,
        }
    }

    /// Overall average watch time in whole seconds across all videos.
    pub fn average_watch_seconds(&self) -> u64 {
        let (watched, views) = self
            .videos_data
            .values()
            .fold((0u64, 0u64), |(watched, views), stats| {
                (watched + stats.total_watch_time, views + stats.views)
            });
        if views == 0 { 0 } else { watched / views }
    }
}

/// Owns the aggregate state for the lifetime of a player session.
///
/// Tests construct fresh instances; nothing here is global.
#[derive(Debug)]
pub struct Aggregator {
    state: AggregateState,
    device: Device,
    rng: StdRng,
}

impl Aggregator {
    /// Creates an empty aggregator whose jitter comes from OS entropy.
    pub fn new(start_time: i64, device: Device) -> Self {
        Self {
            state: AggregateState::new(start_time),
            device,
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates an empty aggregator with deterministic jitter.
    pub fn with_seed(start_time: i64, device: Device, seed: u64) -> Self {
        Self {
            state: AggregateState::new(start_time),
            device,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Rebuilds the state from a persisted log and snapshot.
    ///
    /// The log is replayed from scratch. The snapshot acts as a floor: total
    /// views never drop below the persisted value, and per-video stats that
    /// recorded more views than the replay (a truncated log) are kept. The
    /// persisted bandwidth estimate stands until the next [`tick`](Self::tick).
    pub fn restore(&mut self, snapshot: Option<&AggregateSnapshot>, events: &[StreamEvent]) {
        let mut state = AggregateState::replay(self.state.start_time, events, self.device);

        if let Some(snapshot) = snapshot {
            state.total_views = state.total_views.max(snapshot.total_views);
            for (video_id, persisted) in &snapshot.videos_data {
                let replayed_views = state.videos_data.get(video_id).map_or(0, |s| s.views);
                if persisted.views > replayed_views {
                    let mut stats = persisted.clone();
                    stats.recompute_average();
                    state.videos_data.insert(video_id.clone(), stats);
                }
            }
            if snapshot.bandwidth.is_finite() && snapshot.bandwidth >= 0.0 {
                state.bandwidth = snapshot.bandwidth;
            }
        }

        tracing::debug!(
            events = events.len(),
            total_views = state.total_views,
            videos = state.videos_data.len(),
            "restored aggregate state"
        );
        self.state = state;
    }

    /// The single state-transition entrypoint.
    pub fn apply(&mut self, event: &StreamEvent) {
        self.state.apply(event, self.device);
    }

    /// Recomputes the synthetic bandwidth estimate for time `now`.
    ///
    /// The baseline grows with elapsed minutes and total views; a bounded
    /// random jitter is added on top. Returns the new estimate.
    #[allow(clippy::cast_precision_loss)]
    pub fn tick(&mut self, now: i64) -> f64 {
        let elapsed_minutes = now.saturating_sub(self.state.start_time) as f64 / 60_000.0;
        if elapsed_minutes > 0.0 {
            let baseline = self.state.total_views.max(1) as f64 * BANDWIDTH_PER_VIEW;
            let jitter = self.rng.gen_range(0.0..BANDWIDTH_JITTER);
            self.state.bandwidth = (baseline + jitter) * elapsed_minutes;
        }
        self.state.bandwidth
    }

    pub const fn state(&self) -> &AggregateState {
        &self.state
    }

    pub fn into_state(self) -> AggregateState {
        self.state
    }

    pub const fn device(&self) -> Device {
        self.device
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        self.state.snapshot()
    }
}
