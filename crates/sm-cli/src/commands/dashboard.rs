//! Dashboard command for rendering the aggregate once.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use sm_core::dashboard::{self, DashboardView};
use sm_core::{MemorySurface, PlayerState};

use crate::Config;
use crate::commands::util::open_tracker;

#[derive(Serialize)]
struct DashboardOutput {
    #[serde(flatten)]
    view: DashboardView,
    player_state: PlayerState,
    buffer_health: String,
    current_bitrate: String,
}

/// Restores state from the store and renders it as text or JSON.
///
/// The bandwidth estimate is the persisted one; it only moves while `watch`
/// is running.
pub fn run<W: Write>(writer: &mut W, config: &Config, json: bool, now: i64) -> Result<()> {
    let tracker = open_tracker(config, now)?;
    let view = tracker.view();

    if json {
        let player = tracker.player();
        let output = DashboardOutput {
            view,
            player_state: player.state(),
            buffer_health: player.buffer_health(),
            current_bitrate: player.current_bitrate(),
        };
        serde_json::to_writer_pretty(&mut *writer, &output)?;
        writeln!(writer)?;
        return Ok(());
    }

    let mut surface = MemorySurface::dashboard();
    dashboard::render(&view, &mut surface);
    tracker.player().render(&mut surface);
    write!(writer, "{}", surface.to_text())?;
    Ok(())
}
