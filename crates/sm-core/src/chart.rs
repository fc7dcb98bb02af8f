//! Server history to chart series.
//!
//! Server-reported samples are loosely shaped: every section and field may be
//! missing. [`normalize`] turns a list of samples into aligned, fully
//! populated series so chart code never has to deal with gaps.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::surface::Surface;
use crate::types::ValidationError;

/// Label format for chart timestamps.
const LABEL_FORMAT: &str = "%H:%M:%S";

/// Quality reported when a sample has none (or zero).
pub const DEFAULT_QUALITY: f64 = 720.0;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionStats {
    pub total_connections: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkStats {
    pub bytes_sent: Option<f64>,
    /// Bytes per second.
    pub current_bandwidth: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemStats {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamStats {
    pub active_streams: Option<f64>,
    pub quality: Option<f64>,
}

/// One point of the server's metric history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerMetricsSample {
    /// ISO-8601 string or epoch milliseconds, as the server sends it.
    pub timestamp: Option<Value>,
    pub connections: Option<ConnectionStats>,
    pub network: Option<NetworkStats>,
    pub system: Option<SystemStats>,
    pub streams: Option<StreamStats>,
}

/// Body of the history endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub data: Vec<ServerMetricsSample>,
}

/// Aligned chart series; every vector has one entry per input sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartData {
    pub timestamps: Vec<String>,
    pub connections: Vec<f64>,
    /// Megabits per second.
    pub bandwidth: Vec<f64>,
    pub cpu: Vec<f64>,
    pub memory: Vec<f64>,
    pub quality: Vec<f64>,
}

impl ChartData {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The series a given chart plots.
    pub fn series(&self, kind: ChartKind) -> ChartSeries {
        let datasets = match kind {
            ChartKind::Connections => vec![Dataset::new("Active Connections", &self.connections)],
            ChartKind::Bandwidth => vec![Dataset::new("Bandwidth (Mbps)", &self.bandwidth)],
            ChartKind::Resources => vec![
                Dataset::new("CPU Usage (%)", &self.cpu),
                Dataset::new("Memory Usage (%)", &self.memory),
            ],
            ChartKind::Quality => vec![Dataset::new("Stream Quality (p)", &self.quality)],
        };
        ChartSeries {
            labels: self.timestamps.clone(),
            datasets,
        }
    }
}

/// The dashboard charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Connections,
    Bandwidth,
    Resources,
    Quality,
}

impl ChartKind {
    pub const ALL: [Self; 4] = [Self::Connections, Self::Bandwidth, Self::Resources, Self::Quality];

    /// Canvas element the chart is drawn into.
    pub const fn element_id(self) -> &'static str {
        match self {
            Self::Connections => "connections-chart",
            Self::Bandwidth => "bandwidth-chart",
            Self::Resources => "resources-chart",
            Self::Quality => "quality-chart",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.element_id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub label: &'static str,
    pub values: Vec<f64>,
}

impl Dataset {
    fn new(label: &'static str, values: &[f64]) -> Self {
        Self {
            label,
            values: values.to_vec(),
        }
    }
}

/// Labels plus one or more datasets for a single chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// Normalizes server samples into chart series.
pub fn normalize(samples: &[ServerMetricsSample]) -> ChartData {
    let mut data = ChartData::default();
    for sample in samples {
        data.timestamps.push(timestamp_label(sample.timestamp.as_ref()));
        data.connections.push(
            sample
                .connections
                .as_ref()
                .and_then(|c| c.total_connections)
                .unwrap_or(0.0),
        );
        data.bandwidth.push(
            sample
                .network
                .as_ref()
                .and_then(|n| n.bytes_sent)
                .map_or(0.0, bytes_to_megabits),
        );
        let system = sample.system.as_ref();
        data.cpu.push(system.and_then(|s| s.cpu_percent).unwrap_or(0.0));
        data.memory.push(system.and_then(|s| s.memory_percent).unwrap_or(0.0));
        data.quality.push(
            sample
                .streams
                .as_ref()
                .and_then(|s| s.quality)
                .filter(|q| *q != 0.0)
                .unwrap_or(DEFAULT_QUALITY),
        );
    }
    data
}

fn bytes_to_megabits(bytes: f64) -> f64 {
    bytes / 1024.0 / 1024.0 * 8.0
}

/// Formats a sample timestamp as an `HH:MM:SS` label.
///
/// Offsets are converted to UTC; naive timestamps are taken as-is. Values
/// that are not recognizable timestamps are passed through verbatim.
pub fn timestamp_label(timestamp: Option<&Value>) -> String {
    match timestamp {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(raw)) => parse_label(raw).unwrap_or_else(|| raw.clone()),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(whole_millis))
            .and_then(DateTime::from_timestamp_millis)
            .map_or_else(|| n.to_string(), |dt| dt.format(LABEL_FORMAT).to_string()),
        Some(other) => other.to_string(),
    }
}

/// Truncates fractional epoch milliseconds; `None` outside the `i64` range.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "range is checked before the cast"
)]
fn whole_millis(millis: f64) -> Option<i64> {
    let millis = millis.trunc();
    (millis.is_finite() && millis >= i64::MIN as f64 && millis < i64::MAX as f64)
        .then(|| millis as i64)
}

fn parse_label(raw: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).format(LABEL_FORMAT).to_string());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|dt| dt.format(LABEL_FORMAT).to_string())
}

/// Window of server history to request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimeRange {
    #[default]
    OneHour,
    SixHours,
    TwelveHours,
    Day,
    Week,
    Month,
}

impl TimeRange {
    pub const fn hours(self) -> u32 {
        match self {
            Self::OneHour => 1,
            Self::SixHours => 6,
            Self::TwelveHours => 12,
            Self::Day => 24,
            Self::Week => 168,
            Self::Month => 720,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::SixHours => "6h",
            Self::TwelveHours => "12h",
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }

    /// Parses a range token, falling back to one hour for anything unknown.
    pub fn parse_or_default(token: &str) -> Self {
        token.parse().unwrap_or_else(|err| {
            tracing::warn!(%err, "falling back to {}", Self::default());
            Self::default()
        })
    }
}

impl FromStr for TimeRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1h" => Ok(Self::OneHour),
            "6h" => Ok(Self::SixHours),
            "12h" => Ok(Self::TwelveHours),
            "24h" => Ok(Self::Day),
            "7d" => Ok(Self::Week),
            "30d" => Ok(Self::Month),
            other => Err(ValidationError::UnknownTimeRange(other.to_string())),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Headline numbers taken from the most recent history sample.
///
/// A box is only updated when its section is present in that sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub active_connections: Option<f64>,
    /// Megabits per second.
    pub total_bandwidth: Option<f64>,
    pub server_load: Option<f64>,
    pub active_streams: Option<f64>,
}

impl SummaryMetrics {
    /// Summary of the latest sample, or `None` for an empty history.
    pub fn from_latest(samples: &[ServerMetricsSample]) -> Option<Self> {
        let latest = samples.last()?;
        Some(Self {
            active_connections: latest
                .connections
                .as_ref()
                .map(|c| c.total_connections.unwrap_or(0.0)),
            total_bandwidth: latest
                .network
                .as_ref()
                .map(|n| n.bytes_sent.map_or(0.0, bytes_to_megabits)),
            server_load: latest
                .system
                .as_ref()
                .map(|s| s.cpu_percent.unwrap_or(0.0)),
            active_streams: latest
                .streams
                .as_ref()
                .map(|s| s.active_streams.unwrap_or(0.0)),
        })
    }
}

/// Formats a count-like number without a trailing `.0`.
pub(crate) fn format_number(value: f64) -> String {
    format!("{value}")
}

/// Draws every chart and, when available, the summary boxes.
pub fn render(data: &ChartData, summary: Option<&SummaryMetrics>, surface: &mut impl Surface) {
    for kind in ChartKind::ALL {
        surface.update_chart(kind, &data.series(kind));
    }

    let Some(summary) = summary else {
        return;
    };
    if let Some(connections) = summary.active_connections {
        surface.set_text("active-connections", &format_number(connections));
    }
    if let Some(mbps) = summary.total_bandwidth {
        surface.set_text("total-bandwidth", &format!("{mbps:.2} Mbps"));
    }
    if let Some(load) = summary.server_load {
        surface.set_text("server-load", &format!("{}%", format_number(load)));
    }
    if let Some(streams) = summary.active_streams {
        surface.set_text("active-streams", &format_number(streams));
    }
}
