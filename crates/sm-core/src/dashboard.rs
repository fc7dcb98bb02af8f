//! Projection of aggregate state into dashboard display values.
//!
//! [`project`] is pure: the same state always yields the same
//! [`DashboardView`], so redrawing is idempotent. [`render`] writes a view
//! onto a [`Surface`].

use chrono::DateTime;
use serde::Serialize;

use crate::aggregate::AggregateState;
use crate::session::Session;
use crate::surface::{
    ACTIVE_STREAMS, AVG_WATCH_TIME, BANDWIDTH, SESSIONS_BODY, Surface, TOTAL_VIEWS, TableRow,
    VIDEOS_BODY,
};

pub const NO_SESSIONS: &str = "No sessions recorded yet";
pub const NO_VIDEOS: &str = "No video data available";

/// Duration shown for sessions that are still playing.
const ACTIVE: &str = "Active";

const SESSION_COLUMNS: usize = 5;
const VIDEO_COLUMNS: usize = 4;

/// Everything the dashboard shows, already formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardView {
    pub active_streams: u64,
    pub total_views: u64,
    /// Overall average watch time as `m:ss`.
    pub avg_watch_time: String,
    /// Synthetic bandwidth, labeled as an estimate.
    pub bandwidth: String,
    pub sessions: Vec<SessionRow>,
    pub videos: Vec<VideoRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRow {
    pub video_id: String,
    /// `HH:MM:SS` in UTC.
    pub start: String,
    /// `m:ss`, or `Active` while the session is open.
    pub duration: String,
    pub device: String,
    pub resolution: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoRow {
    pub video_id: String,
    pub views: u64,
    pub avg_watch_time: String,
    pub completion_rate: String,
}

impl DashboardView {
    pub fn session_rows(&self) -> Vec<TableRow> {
        if self.sessions.is_empty() {
            return vec![placeholder(NO_SESSIONS, SESSION_COLUMNS)];
        }
        self.sessions
            .iter()
            .map(|row| {
                TableRow::Cells(vec![
                    row.video_id.clone(),
                    row.start.clone(),
                    row.duration.clone(),
                    row.device.clone(),
                    row.resolution.clone(),
                ])
            })
            .collect()
    }

    pub fn video_rows(&self) -> Vec<TableRow> {
        if self.videos.is_empty() {
            return vec![placeholder(NO_VIDEOS, VIDEO_COLUMNS)];
        }
        self.videos
            .iter()
            .map(|row| {
                TableRow::Cells(vec![
                    row.video_id.clone(),
                    row.views.to_string(),
                    row.avg_watch_time.clone(),
                    row.completion_rate.clone(),
                ])
            })
            .collect()
    }
}

fn placeholder(text: &str, colspan: usize) -> TableRow {
    TableRow::Placeholder {
        text: text.to_string(),
        colspan,
    }
}

/// Projects aggregate state and the current-session record into a view.
///
/// The current session is listed first unless the state already has an open
/// session for the same video.
pub fn project(state: &AggregateState, current: Option<&Session>) -> DashboardView {
    let mut sessions = Vec::with_capacity(state.sessions_data.len() + 1);
    if let Some(current) = current {
        if state.open_session(&current.video_id).is_none() {
            sessions.push(session_row(current, ACTIVE.to_string()));
        }
    }
    sessions.extend(state.sessions_data.iter().map(|session| {
        let duration = session
            .watch_seconds()
            .map_or_else(|| ACTIVE.to_string(), format_watch_time);
        session_row(session, duration)
    }));

    let videos = state
        .videos_data
        .iter()
        .map(|(video_id, stats)| VideoRow {
            video_id: video_id.to_string(),
            views: stats.views,
            avg_watch_time: format_watch_time(stats.average_watch_seconds()),
            completion_rate: format!("{}%", stats.completion_rate()),
        })
        .collect();

    DashboardView {
        active_streams: state.active_streams,
        total_views: state.total_views,
        avg_watch_time: format_watch_time(state.average_watch_seconds()),
        bandwidth: format_bandwidth(state.bandwidth),
        sessions,
        videos,
    }
}

fn session_row(session: &Session, duration: String) -> SessionRow {
    SessionRow {
        video_id: session.video_id.to_string(),
        start: format_clock(session.start_time),
        duration,
        device: session.device.to_string(),
        resolution: session.resolution.clone(),
    }
}

/// Writes a view onto a surface. Missing targets are skipped.
pub fn render(view: &DashboardView, surface: &mut impl Surface) {
    surface.set_text(ACTIVE_STREAMS, &view.active_streams.to_string());
    surface.set_text(TOTAL_VIEWS, &view.total_views.to_string());
    surface.set_text(AVG_WATCH_TIME, &view.avg_watch_time);
    surface.set_text(BANDWIDTH, &view.bandwidth);
    surface.set_rows(SESSIONS_BODY, &view.session_rows());
    surface.set_rows(VIDEOS_BODY, &view.video_rows());
}

/// Formats whole seconds as `m:ss`.
pub fn format_watch_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub fn format_bandwidth(estimate: f64) -> String {
    format!("~{estimate:.2} MB (est.)")
}

/// Formats Unix milliseconds as a UTC wall-clock time.
fn format_clock(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |dt| dt.format("%H:%M:%S").to_string())
}
