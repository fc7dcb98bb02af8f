//! Player health signals.
//!
//! A [`PlayerMonitor`] follows the player signal events and turns them into
//! client metrics:
//!
//! | metric | sent when | value |
//! |---|---|---|
//! | `initial_load_time` | first `playing` after `loadstart` | milliseconds |
//! | `buffering_time` | `playing` after `waiting` | milliseconds |
//! | `low_buffer` | `timeupdate` with less than [`LOW_BUFFER_SECONDS`] buffered | seconds |
//! | `player_error` | `error` | `{code, message}` |
//!
//! It also keeps the latest buffer level and bitrate for display.

use std::collections::VecDeque;

use serde::Serialize;

use crate::event::{EventType, PlayerError, PlayerState, StreamEvent};
use crate::surface::{BUFFER_HEALTH, CURRENT_BITRATE, Surface};

/// Buffer level below which playback is considered at risk of stalling.
pub const LOW_BUFFER_SECONDS: f64 = 5.0;

/// Buffer level samples kept for display.
pub const BUFFER_HISTORY: usize = 30;

const NOT_AVAILABLE: &str = "N/A";

/// Value of a client metric: a number, or error details for `player_error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Error(PlayerError),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Error(_) => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// A metric derived from a player signal, not yet addressed to a client.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMetric {
    pub name: &'static str,
    pub value: MetricValue,
    /// Unix milliseconds of the event that produced it.
    pub timestamp: i64,
    /// Player state at the time the metric was taken.
    pub player_state: PlayerState,
}

/// A buffer level reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferSample {
    pub timestamp: i64,
    /// Seconds buffered ahead of the playhead.
    pub level: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerMonitor {
    state: PlayerState,
    load_started: Option<i64>,
    initial_load_ms: Option<i64>,
    buffering_started: Option<i64>,
    buffer: VecDeque<BufferSample>,
    /// Kilobits per second, rounded.
    bitrate_kbps: Option<f64>,
    last_error: Option<PlayerError>,
}

impl PlayerMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds `event` into the monitor and returns the metrics it triggers.
    pub fn observe(&mut self, event: &StreamEvent) -> Vec<PlayerMetric> {
        let mut metrics = Vec::new();
        let at = event.timestamp;

        match event.kind {
            EventType::LoadStart => self.load_started = Some(at),
            EventType::Waiting => self.buffering_started = Some(at),
            EventType::Playing => {
                if let (Some(started), None) = (self.load_started, self.initial_load_ms) {
                    let elapsed = at.saturating_sub(started);
                    self.initial_load_ms = Some(elapsed);
                    metrics.push(self.metric("initial_load_time", elapsed_value(elapsed), at));
                }
                if let Some(started) = self.buffering_started.take() {
                    let elapsed = at.saturating_sub(started);
                    metrics.push(self.metric("buffering_time", elapsed_value(elapsed), at));
                }
            }
            EventType::TimeUpdate => {
                if let Some(level) = event.buffer_level.filter(|level| level.is_finite()) {
                    self.push_buffer(BufferSample { timestamp: at, level });
                    if level < LOW_BUFFER_SECONDS {
                        metrics.push(self.metric("low_buffer", MetricValue::Number(level), at));
                    }
                }
                if let Some(bps) = event.bitrate.filter(|bps| bps.is_finite() && *bps > 0.0) {
                    self.bitrate_kbps = Some((bps / 1000.0).round());
                }
            }
            EventType::Error => {
                let error = event.error.clone().unwrap_or_default();
                self.last_error = Some(error.clone());
                self.state = PlayerState::Error;
                metrics.push(self.metric("player_error", MetricValue::Error(error), at));
            }
            _ => {}
        }

        self.state = self.state.after(&event.kind);
        if !metrics.is_empty() {
            tracing::debug!(kind = %event.kind, count = metrics.len(), "player metrics");
        }
        metrics
    }

    fn metric(&self, name: &'static str, value: MetricValue, timestamp: i64) -> PlayerMetric {
        PlayerMetric {
            name,
            value,
            timestamp,
            player_state: self.state,
        }
    }

    fn push_buffer(&mut self, sample: BufferSample) {
        if self.buffer.len() == BUFFER_HISTORY {
            self.buffer.pop_front();
        }
        self.buffer.push_back(sample);
    }

    pub const fn state(&self) -> PlayerState {
        self.state
    }

    pub const fn initial_load_ms(&self) -> Option<i64> {
        self.initial_load_ms
    }

    /// Buffer level readings, oldest first.
    pub const fn buffer_history(&self) -> &VecDeque<BufferSample> {
        &self.buffer
    }

    pub const fn last_error(&self) -> Option<&PlayerError> {
        self.last_error.as_ref()
    }

    /// Latest buffer level as whole seconds, e.g. `12s`.
    pub fn buffer_health(&self) -> String {
        self.buffer
            .back()
            .map_or_else(|| NOT_AVAILABLE.to_string(), |s| format!("{}s", s.level.round()))
    }

    /// Latest bitrate estimate in Mbps, e.g. `2.50 Mbps`.
    pub fn current_bitrate(&self) -> String {
        self.bitrate_kbps.map_or_else(
            || NOT_AVAILABLE.to_string(),
            |kbps| format!("{:.2} Mbps", kbps / 1000.0),
        )
    }

    pub fn render(&self, surface: &mut impl Surface) {
        surface.set_text(BUFFER_HEALTH, &self.buffer_health());
        surface.set_text(CURRENT_BITRATE, &self.current_bitrate());
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "millisecond durations are far below 2^52"
)]
fn elapsed_value(ms: i64) -> MetricValue {
    MetricValue::Number(ms as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::surface::MemorySurface;
    use crate::types::VideoId;

    fn event(kind: EventType, timestamp: i64) -> StreamEvent {
        StreamEvent::new(VideoId::new("v1").unwrap(), kind, timestamp)
    }

    fn names(metrics: &[PlayerMetric]) -> Vec<&'static str> {
        metrics.iter().map(|m| m.name).collect()
    }

    #[test]
    fn test_initial_load_time_is_sent_once() {
        let mut monitor = PlayerMonitor::new();
        assert!(monitor.observe(&event(EventType::LoadStart, 1_000)).is_empty());
        assert_eq!(monitor.state(), PlayerState::Loading);

        let metrics = monitor.observe(&event(EventType::Playing, 1_750));
        assert_eq!(names(&metrics), ["initial_load_time"]);
        assert_eq!(metrics[0].value, MetricValue::Number(750.0));
        assert_eq!(metrics[0].player_state, PlayerState::Loading);
        assert_eq!(monitor.state(), PlayerState::Playing);
        assert_eq!(monitor.initial_load_ms(), Some(750));

        monitor.observe(&event(EventType::LoadStart, 5_000));
        assert!(monitor.observe(&event(EventType::Playing, 6_000)).is_empty());
    }

    #[test]
    fn test_buffering_time_spans_waiting_to_playing() {
        let mut monitor = PlayerMonitor::new();
        monitor.observe(&event(EventType::Waiting, 10_000));
        assert_eq!(monitor.state(), PlayerState::Buffering);

        let metrics = monitor.observe(&event(EventType::Playing, 12_500));
        assert_eq!(names(&metrics), ["buffering_time"]);
        assert_eq!(metrics[0].value.as_f64(), Some(2_500.0));
        assert_eq!(metrics[0].player_state, PlayerState::Buffering);

        // a second playing without waiting reports nothing
        assert!(monitor.observe(&event(EventType::Playing, 13_000)).is_empty());
    }

    #[test]
    fn test_low_buffer_below_threshold_only() {
        let mut monitor = PlayerMonitor::new();
        let healthy = event(EventType::TimeUpdate, 1).with_buffer(Some(8.0), None);
        assert!(monitor.observe(&healthy).is_empty());

        let low = event(EventType::TimeUpdate, 2).with_buffer(Some(2.4), Some(2_500_000.0));
        let metrics = monitor.observe(&low);
        assert_eq!(names(&metrics), ["low_buffer"]);
        assert_eq!(metrics[0].value.as_f64(), Some(2.4));

        assert_eq!(monitor.buffer_health(), "2s");
        assert_eq!(monitor.current_bitrate(), "2.50 Mbps");
        assert_eq!(monitor.buffer_history().len(), 2);
    }

    #[test]
    fn test_buffer_history_is_bounded() {
        let mut monitor = PlayerMonitor::new();
        for i in 0..40 {
            monitor.observe(&event(EventType::TimeUpdate, i).with_buffer(Some(10.0), None));
        }
        assert_eq!(monitor.buffer_history().len(), BUFFER_HISTORY);
        assert_eq!(monitor.buffer_history()[0].timestamp, 10);
    }

    #[test]
    fn test_error_reports_details_in_error_state() {
        let mut monitor = PlayerMonitor::new();
        let failure = PlayerError {
            code: 2,
            message: "MEDIA_ERR_NETWORK".to_string(),
        };
        let metrics = monitor.observe(&event(EventType::Error, 9).with_error(failure.clone()));

        assert_eq!(names(&metrics), ["player_error"]);
        assert_eq!(metrics[0].player_state, PlayerState::Error);
        assert_eq!(metrics[0].value, MetricValue::Error(failure.clone()));
        assert_eq!(monitor.last_error(), Some(&failure));
        assert_eq!(
            serde_json::to_value(&metrics[0].value).unwrap(),
            serde_json::json!({"code": 2, "message": "MEDIA_ERR_NETWORK"})
        );
    }

    #[test]
    fn test_lifecycle_events_only_move_state() {
        let mut monitor = PlayerMonitor::new();
        assert!(monitor.observe(&event(EventType::Play, 0)).is_empty());
        assert_eq!(monitor.state(), PlayerState::Playing);
        assert!(monitor.observe(&event(EventType::Seeking, 1)).is_empty());
        assert_eq!(monitor.state(), PlayerState::Seeking);
        assert!(monitor.observe(&event(EventType::Complete, 2)).is_empty());
        assert_eq!(monitor.state(), PlayerState::Ended);
    }

    #[test]
    fn test_render_without_samples_shows_not_available() {
        let mut surface = MemorySurface::dashboard();
        PlayerMonitor::new().render(&mut surface);
        assert_eq!(surface.text(BUFFER_HEALTH), Some("N/A"));
        assert_eq!(surface.text(CURRENT_BITRATE), Some("N/A"));
    }
}
