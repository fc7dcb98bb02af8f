//! Record command for feeding a single playback event.

use std::io::Write;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use sm_core::{EventType, MetricValue, PlayerError, StreamEvent, VideoId};

use crate::Config;
use crate::commands::util::{format_timestamp, open_tracker, parse_timestamp};

/// Playback transitions and player signals accepted from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventKind {
    Play,
    Pause,
    Complete,
    Loadstart,
    Waiting,
    Playing,
    Seeking,
    Timeupdate,
    Error,
}

impl From<EventKind> for EventType {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Play => Self::Play,
            EventKind::Pause => Self::Pause,
            EventKind::Complete => Self::Complete,
            EventKind::Loadstart => Self::LoadStart,
            EventKind::Waiting => Self::Waiting,
            EventKind::Playing => Self::Playing,
            EventKind::Seeking => Self::Seeking,
            EventKind::Timeupdate => Self::TimeUpdate,
            EventKind::Error => Self::Error,
        }
    }
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Event type.
    #[arg(value_enum)]
    pub kind: EventKind,
    /// Video the event belongs to.
    #[arg(long)]
    pub video: String,
    /// Playback position in seconds.
    #[arg(long)]
    pub position: Option<f64>,
    /// Media duration in seconds.
    #[arg(long)]
    pub duration: Option<f64>,
    /// Rendition label (e.g., 1280x720).
    #[arg(long)]
    pub resolution: Option<String>,
    /// Event time as Unix milliseconds or RFC 3339; defaults to now.
    #[arg(long)]
    pub at: Option<String>,
    /// Seconds buffered ahead of the playhead.
    #[arg(long)]
    pub buffer_level: Option<f64>,
    /// Current bitrate estimate in bits per second.
    #[arg(long)]
    pub bitrate: Option<f64>,
    /// Media error code, for `error` events.
    #[arg(long)]
    pub error_code: Option<i64>,
    /// Media error message, for `error` events.
    #[arg(long)]
    pub error_message: Option<String>,
}

pub fn run<W: Write>(writer: &mut W, args: &RecordArgs, config: &Config, now: i64) -> Result<()> {
    let video_id = VideoId::new(args.video.as_str()).context("invalid --video")?;
    let timestamp = args.at.as_deref().map(parse_timestamp).transpose()?.unwrap_or(now);

    let mut event = StreamEvent::new(video_id, args.kind.into(), timestamp);
    if let Some(position) = args.position {
        event = event.with_position(position, args.duration);
    } else {
        event.duration = args.duration;
    }
    if let Some(resolution) = &args.resolution {
        event = event.with_resolution(resolution.as_str());
    }
    event = event.with_buffer(args.buffer_level, args.bitrate);
    if args.kind == EventKind::Error {
        event = event.with_error(PlayerError {
            code: args.error_code.unwrap_or_default(),
            message: args.error_message.clone().unwrap_or_default(),
        });
    }

    let mut tracker = open_tracker(config, now)?;
    let persisted = tracker.record(&event);

    writeln!(
        writer,
        "Recorded {} for {} at {}",
        event.kind,
        event.video_id,
        format_timestamp(event.timestamp)
    )?;
    if !persisted {
        writeln!(writer, "Warning: event was applied but not persisted")?;
    }
    let client_id = tracker.store().client_id();
    for metric in tracker.take_player_metrics(&client_id) {
        match &metric.value {
            MetricValue::Number(value) => {
                writeln!(writer, "Player metric {}: {value}", metric.metric)?;
            }
            MetricValue::Error(error) => {
                writeln!(writer, "Player metric {}: {} {}", metric.metric, error.code, error.message)?;
            }
        }
    }

    let state = tracker.state();
    writeln!(
        writer,
        "Active streams: {}, total views: {}",
        state.active_streams, state.total_views
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    const T0: i64 = 1_714_557_600_000;

    fn args(kind: EventKind, at: &str) -> RecordArgs {
        RecordArgs {
            kind,
            video: "v1".to_string(),
            position: None,
            duration: None,
            resolution: Some("640x480".to_string()),
            at: Some(at.to_string()),
            buffer_level: None,
            bitrate: None,
            error_code: None,
            error_message: None,
        }
    }

    #[test]
    fn test_record_play_then_pause() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("metrics.db"),
            ..Config::default()
        };

        let mut output = Vec::new();
        run(&mut output, &args(EventKind::Play, "2024-05-01T10:00:00Z"), &config, T0).unwrap();
        run(&mut output, &args(EventKind::Pause, "1714557605000"), &config, T0).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Recorded play for v1 at 2024-05-01T10:00:00Z
        Active streams: 1, total views: 1
        Recorded pause for v1 at 2024-05-01T10:00:05Z
        Active streams: 0, total views: 1
        ");

        let tracker = open_tracker(&config, T0).unwrap();
        let stats = &tracker.state().videos_data[&VideoId::new("v1").unwrap()];
        assert_eq!(stats.total_watch_time, 5);
    }

    #[test]
    fn test_record_player_signals_reports_metrics() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("metrics.db"),
            ..Config::default()
        };

        let mut output = Vec::new();
        run(&mut output, &args(EventKind::Loadstart, "1714557600000"), &config, T0).unwrap();
        run(&mut output, &args(EventKind::Playing, "1714557600750"), &config, T0).unwrap();
        let mut failure = args(EventKind::Error, "1714557601000");
        failure.error_code = Some(4);
        failure.error_message = Some("MEDIA_ERR_SRC_NOT_SUPPORTED".to_string());
        run(&mut output, &failure, &config, T0).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Recorded loadstart for v1 at 2024-05-01T10:00:00Z
        Active streams: 0, total views: 0
        Recorded playing for v1 at 2024-05-01T10:00:00Z
        Player metric initial_load_time: 750
        Active streams: 0, total views: 0
        Recorded error for v1 at 2024-05-01T10:00:01Z
        Player metric player_error: 4 MEDIA_ERR_SRC_NOT_SUPPORTED
        Active streams: 0, total views: 0
        ");

        let tracker = open_tracker(&config, T0).unwrap();
        assert_eq!(tracker.player_state(), sm_core::PlayerState::Error);
    }

    #[test]
    fn test_record_buffer_level_is_kept() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("metrics.db"),
            ..Config::default()
        };
        let mut update = args(EventKind::Timeupdate, "1714557600000");
        update.buffer_level = Some(12.2);
        update.bitrate = Some(4_000_000.0);
        run(&mut Vec::new(), &update, &config, T0).unwrap();

        let tracker = open_tracker(&config, T0).unwrap();
        assert_eq!(tracker.player().buffer_health(), "12s");
        assert_eq!(tracker.player().current_bitrate(), "4.00 Mbps");
    }

    #[test]
    fn test_record_reports_unpersisted_event() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("metrics.db"),
            storage_quota_bytes: Some(16),
            ..Config::default()
        };

        let mut output = Vec::new();
        run(&mut output, &args(EventKind::Play, "1714557600000"), &config, T0).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Warning: event was applied but not persisted"));
    }

    #[test]
    fn test_record_rejects_blank_video() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("metrics.db"),
            ..Config::default()
        };
        let mut args = args(EventKind::Play, "1");
        args.video = "  ".to_string();

        let err = run(&mut Vec::new(), &args, &config, T0).unwrap_err();
        assert_eq!(err.to_string(), "invalid --video");
    }
}
