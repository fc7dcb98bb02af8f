//! Raw playback events emitted by the player.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::VideoId;

/// Playback lifecycle and player signal event types.
///
/// `play`, `pause` and `complete` drive the aggregate statistics. The player
/// signals (`loadstart`, `waiting`, `playing`, `seeking`, `timeupdate`,
/// `error`) only feed player health metrics. Unknown type strings are kept
/// verbatim in [`EventType::Other`] so a log written by a newer player still
/// round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    Play,
    Pause,
    Complete,
    LoadStart,
    Waiting,
    Playing,
    Seeking,
    TimeUpdate,
    Error,
    Other(String),
}

impl EventType {
    /// String representation used in the event log.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Complete => "complete",
            Self::LoadStart => "loadstart",
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Seeking => "seeking",
            Self::TimeUpdate => "timeupdate",
            Self::Error => "error",
            Self::Other(raw) => raw,
        }
    }

    /// Whether this event ends a playback session.
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Pause | Self::Complete)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "play" => Self::Play,
            "pause" => Self::Pause,
            "complete" => Self::Complete,
            "loadstart" => Self::LoadStart,
            "waiting" => Self::Waiting,
            "playing" => Self::Playing,
            "seeking" => Self::Seeking,
            "timeupdate" => Self::TimeUpdate,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

/// A single playback event as recorded in the durable log.
///
/// Events are immutable once recorded and are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    /// The video this event belongs to.
    pub video_id: VideoId,
    /// Lifecycle transition.
    #[serde(rename = "type")]
    pub kind: EventType,
    /// Wall-clock time in Unix milliseconds.
    pub timestamp: i64,
    /// Playback position in seconds, when the player reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    /// Media duration in seconds, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Rendition label such as `640x480`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Seconds of media buffered ahead of the playhead (`timeupdate`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_level: Option<f64>,
    /// Adaptive streaming bandwidth estimate in bits per second (`timeupdate`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<f64>,
    /// Player failure details (`error`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PlayerError>,
}

/// A media error as reported by the player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerError {
    pub code: i64,
    pub message: String,
}

impl StreamEvent {
    /// Creates an event with no optional playback details.
    pub const fn new(video_id: VideoId, kind: EventType, timestamp: i64) -> Self {
        Self {
            video_id,
            kind,
            timestamp,
            position: None,
            duration: None,
            resolution: None,
            buffer_level: None,
            bitrate: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    #[must_use]
    pub const fn with_buffer(mut self, buffer_level: Option<f64>, bitrate: Option<f64>) -> Self {
        self.buffer_level = buffer_level;
        self.bitrate = bitrate;
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: PlayerError) -> Self {
        self.error = Some(error);
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: f64, duration: Option<f64>) -> Self {
        self.position = Some(position);
        self.duration = duration;
        self
    }
}

/// Coarse player state reported alongside client metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Idle,
    Loading,
    Buffering,
    Playing,
    Seeking,
    Paused,
    Ended,
    Error,
}

impl PlayerState {
    /// The state the player is in right after `kind` was observed.
    pub const fn after(self, kind: &EventType) -> Self {
        match kind {
            EventType::Play | EventType::Playing => Self::Playing,
            EventType::Pause => Self::Paused,
            EventType::Complete => Self::Ended,
            EventType::LoadStart => Self::Loading,
            EventType::Waiting => Self::Buffering,
            EventType::Seeking => Self::Seeking,
            EventType::Error => Self::Error,
            EventType::TimeUpdate | EventType::Other(_) => self,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Buffering => "buffering",
            Self::Playing => "playing",
            Self::Seeking => "seeking",
            Self::Paused => "paused",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_uses_player_field_names() {
        let event = StreamEvent::new(VideoId::new("v1").unwrap(), EventType::Play, 1_000)
            .with_resolution("640x480");

        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"videoId":"v1","type":"play","timestamp":1000,"resolution":"640x480"}"#
        );
    }

    #[test]
    fn test_unknown_event_type_is_preserved() {
        let json = r#"{"videoId":"v1","type":"seeked","timestamp":5}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, EventType::Other("seeked".to_string()));
        assert_eq!(serde_json::to_string(&event).unwrap(), json);
    }

    #[test]
    fn test_event_rejects_empty_video_id() {
        let json = r#"{"videoId":"","type":"play","timestamp":5}"#;
        let result: Result<StreamEvent, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_player_state_follows_lifecycle() {
        let state = PlayerState::Idle.after(&EventType::Play);
        assert_eq!(state, PlayerState::Playing);
        assert_eq!(state.after(&EventType::Pause), PlayerState::Paused);
        assert_eq!(state.after(&EventType::Complete), PlayerState::Ended);
        assert_eq!(
            PlayerState::Paused.after(&EventType::Other("ratechange".into())),
            PlayerState::Paused
        );
    }

    #[test]
    fn test_player_signals_move_player_state() {
        let state = PlayerState::Idle.after(&EventType::LoadStart);
        assert_eq!(state, PlayerState::Loading);
        assert_eq!(state.after(&EventType::Waiting), PlayerState::Buffering);
        assert_eq!(state.after(&EventType::Playing), PlayerState::Playing);
        assert_eq!(state.after(&EventType::Seeking), PlayerState::Seeking);
        assert_eq!(state.after(&EventType::Error), PlayerState::Error);
        assert_eq!(PlayerState::Seeking.after(&EventType::TimeUpdate), PlayerState::Seeking);
        assert_eq!(serde_json::to_string(&PlayerState::Buffering).unwrap(), r#""buffering""#);
    }

    #[test]
    fn test_player_signal_round_trips_with_details() {
        let json = r#"{"videoId":"v1","type":"error","timestamp":9,"error":{"code":4,"message":"MEDIA_ERR_SRC_NOT_SUPPORTED"}}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, EventType::Error);
        assert_eq!(event.error.as_ref().map(|e| e.code), Some(4));
        assert_eq!(serde_json::to_string(&event).unwrap(), json);

        let update: StreamEvent = serde_json::from_str(
            r#"{"videoId":"v1","type":"timeupdate","timestamp":10,"bufferLevel":3.5,"bitrate":2500000}"#,
        )
        .unwrap();
        assert_eq!(update.kind, EventType::TimeUpdate);
        assert_eq!(update.buffer_level, Some(3.5));
        assert_eq!(update.bitrate, Some(2_500_000.0));
    }

    #[test]
    fn test_only_pause_and_complete_stop_sessions() {
        assert!(EventType::Pause.is_stop());
        assert!(EventType::Complete.is_stop());
        assert!(!EventType::Play.is_stop());
        assert!(!EventType::Waiting.is_stop());
        assert!(!EventType::Other("ended".into()).is_stop());
    }
}
