//! Display sinks.
//!
//! A [`Surface`] is the thin adapter between projected dashboard values and
//! whatever actually shows them. Targets are addressed by element id; writing
//! to a target the surface does not have is a no-op.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use crate::chart::{ChartKind, ChartSeries};

/// Header element showing the number of active streams.
pub const ACTIVE_STREAMS: &str = "activeStreams";
pub const TOTAL_VIEWS: &str = "totalViews";
pub const AVG_WATCH_TIME: &str = "avgWatchTime";
pub const BANDWIDTH: &str = "bandwidth";
pub const BUFFER_HEALTH: &str = "buffer-health";
pub const CURRENT_BITRATE: &str = "current-bitrate";
pub const SESSIONS_BODY: &str = "sessionsBody";
pub const VIDEOS_BODY: &str = "videosBody";

pub const SERVER_CONNECTIONS: &str = "active-connections";
pub const SERVER_BANDWIDTH: &str = "bandwidth-value";
pub const SERVER_CPU: &str = "server-cpu";
pub const SERVER_STATUS: &str = "server-status";
pub const SUMMARY_BANDWIDTH: &str = "total-bandwidth";
pub const SUMMARY_LOAD: &str = "server-load";
pub const SUMMARY_STREAMS: &str = "active-streams";

/// Text elements of the standard dashboard with their display labels.
const TEXT_ELEMENTS: [(&str, &str); 13] = [
    (ACTIVE_STREAMS, "Active streams"),
    (TOTAL_VIEWS, "Total views"),
    (AVG_WATCH_TIME, "Avg watch time"),
    (BANDWIDTH, "Bandwidth"),
    (BUFFER_HEALTH, "Buffer health"),
    (CURRENT_BITRATE, "Bitrate"),
    (SERVER_STATUS, "Server"),
    (SERVER_CONNECTIONS, "Connections"),
    (SERVER_BANDWIDTH, "Server bandwidth"),
    (SERVER_CPU, "Server CPU"),
    (SUMMARY_BANDWIDTH, "Total bandwidth"),
    (SUMMARY_LOAD, "Server load"),
    (SUMMARY_STREAMS, "Server streams"),
];

const TABLES: [(&str, &str, &[&str]); 2] = [
    (
        SESSIONS_BODY,
        "Sessions",
        &["Video", "Start", "Duration", "Device", "Resolution"],
    ),
    (
        VIDEOS_BODY,
        "Videos",
        &["Video", "Views", "Avg watch time", "Completion"],
    ),
];

/// A single table body row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRow {
    Cells(Vec<String>),
    /// A full-width message shown instead of data.
    Placeholder { text: String, colspan: usize },
}

/// Something the dashboard can be drawn on.
///
/// Every write returns whether the target existed. Callers treat `false` as
/// a no-op, never as an error.
pub trait Surface {
    fn set_text(&mut self, id: &str, text: &str) -> bool;

    fn set_class(&mut self, id: &str, class: &str) -> bool;

    /// Replaces the contents of a table body.
    fn set_rows(&mut self, id: &str, rows: &[TableRow]) -> bool;

    fn update_chart(&mut self, kind: ChartKind, series: &ChartSeries) -> bool;

    /// Called once a batch of updates is complete.
    fn flush(&mut self) {}
}

/// In-memory surface that records the latest value of every target.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    texts: BTreeMap<String, String>,
    classes: BTreeMap<String, String>,
    tables: BTreeMap<String, Vec<TableRow>>,
    charts: HashMap<ChartKind, ChartSeries>,
    chart_targets: Vec<ChartKind>,
}

impl MemorySurface {
    /// A surface with no targets at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A surface with every element of the standard dashboard.
    pub fn dashboard() -> Self {
        let mut surface = Self::default();
        for (id, _) in TEXT_ELEMENTS {
            surface.add_text(id);
        }
        for (id, _, _) in TABLES {
            surface.tables.insert(id.to_string(), Vec::new());
        }
        surface.chart_targets = ChartKind::ALL.to_vec();
        surface
    }

    /// Registers a text element.
    pub fn add_text(&mut self, id: &str) {
        self.texts.entry(id.to_string()).or_default();
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.texts.get(id).map(String::as_str)
    }

    pub fn class(&self, id: &str) -> Option<&str> {
        self.classes.get(id).map(String::as_str)
    }

    pub fn rows(&self, id: &str) -> Option<&[TableRow]> {
        self.tables.get(id).map(Vec::as_slice)
    }

    pub fn chart(&self, kind: ChartKind) -> Option<&ChartSeries> {
        self.charts.get(&kind)
    }

    /// Plain-text rendering of everything that has a value.
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        for (id, label) in TEXT_ELEMENTS {
            match self.text(id) {
                Some(text) if !text.is_empty() => {
                    let _ = writeln!(out, "{label}: {text}");
                }
                _ => {}
            }
        }

        for (id, title, headers) in TABLES {
            let Some(rows) = self.rows(id) else {
                continue;
            };
            section_break(&mut out);
            let _ = writeln!(out, "{title}");
            let _ = writeln!(out, "{}", headers.join(" | "));
            for row in rows {
                match row {
                    TableRow::Cells(cells) => {
                        let _ = writeln!(out, "{}", cells.join(" | "));
                    }
                    TableRow::Placeholder { text, .. } => {
                        let _ = writeln!(out, "{text}");
                    }
                }
            }
        }

        let mut charted: Vec<_> = self.charts.iter().collect();
        charted.sort_by_key(|(kind, _)| kind.element_id());
        if !charted.is_empty() {
            section_break(&mut out);
            let _ = writeln!(out, "Charts");
        }
        for (kind, series) in charted {
            let _ = writeln!(out, "{kind}: {} points", series.labels.len());
        }

        out
    }
}

fn section_break(out: &mut String) {
    if !out.is_empty() {
        out.push('\n');
    }
}

impl Surface for MemorySurface {
    fn set_text(&mut self, id: &str, text: &str) -> bool {
        let Some(slot) = self.texts.get_mut(id) else {
            tracing::debug!(id, "missing text target");
            return false;
        };
        text.clone_into(slot);
        true
    }

    fn set_class(&mut self, id: &str, class: &str) -> bool {
        if !self.texts.contains_key(id) {
            tracing::debug!(id, "missing class target");
            return false;
        }
        self.classes.insert(id.to_string(), class.to_string());
        true
    }

    fn set_rows(&mut self, id: &str, rows: &[TableRow]) -> bool {
        let Some(slot) = self.tables.get_mut(id) else {
            tracing::debug!(id, "missing table target");
            return false;
        };
        *slot = rows.to_vec();
        true
    }

    fn update_chart(&mut self, kind: ChartKind, series: &ChartSeries) -> bool {
        if !self.chart_targets.contains(&kind) {
            tracing::debug!(%kind, "missing chart target");
            return false;
        }
        self.charts.insert(kind, series.clone());
        true
    }
}
