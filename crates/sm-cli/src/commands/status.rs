//! Status command for showing what the store holds.

use std::io::Write;

use anyhow::Result;

use crate::Config;
use crate::commands::util::{format_timestamp, open_store};

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let events = store.load_all();

    writeln!(writer, "Playback metrics status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Client ID: {}", store.client_id())?;
    writeln!(writer, "Events: {}", events.len())?;
    writeln!(writer, "Pending timings: {}", store.pending_timings().len())?;

    if let Some(last) = events.last() {
        writeln!(
            writer,
            "Last event: {} {} at {}",
            last.kind,
            last.video_id,
            format_timestamp(last.timestamp)
        )?;
    }

    match store.current_session() {
        Some(session) => writeln!(
            writer,
            "Current session: {} since {} ({}, {})",
            session.video_id,
            format_timestamp(session.start_time),
            session.device,
            session.resolution
        )?,
        None => writeln!(writer, "Current session: none")?,
    }

    if let Some(snapshot) = store.load_snapshot() {
        writeln!(writer, "Total views: {}", snapshot.total_views)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use sm_core::{Device, EventType, Session, StreamEvent, VideoId};
    use sm_store::{CLIENT_ID_KEY, KeyValueStore};

    #[test]
    fn test_status_reports_log_and_current_session() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("metrics.db"),
            ..Config::default()
        };

        let store = open_store(&config).unwrap();
        store.store().set(CLIENT_ID_KEY, "client_1_abcdefghi").unwrap();
        let video = VideoId::new("mp4/videoplayback.mp4").unwrap();
        store.append(&StreamEvent::new(video.clone(), EventType::Play, 1_714_557_600_000));
        store.set_current_session(Some(&Session::open(
            video,
            1_714_557_600_000,
            Device::Desktop,
            Some("1920x1080"),
        )));
        drop(store);

        let mut output = Vec::new();
        run(&mut output, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&config.database_path.display().to_string(), "[TEMP]/metrics.db");
        assert_snapshot!(output, @r"
        Playback metrics status
        Database: [TEMP]/metrics.db
        Client ID: client_1_abcdefghi
        Events: 1
        Pending timings: 0
        Last event: play mp4/videoplayback.mp4 at 2024-05-01T10:00:00Z
        Current session: mp4/videoplayback.mp4 since 2024-05-01T10:00:00Z (Desktop, 1920x1080)
        ");
    }

    #[test]
    fn test_status_on_empty_store() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("metrics.db"),
            ..Config::default()
        };

        let mut output = Vec::new();
        run(&mut output, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Events: 0\n"));
        assert!(output.contains("Pending timings: 0\n"));
        assert!(output.contains("Current session: none\n"));
        assert!(!output.contains("Total views"));
    }
}
