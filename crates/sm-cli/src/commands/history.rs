//! History command for fetching server metric history.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use sm_core::chart::{self, ChartData, SummaryMetrics};
use sm_core::{HistoryResponse, TimeRange};
use sm_remote::{MetricsClient, MetricsTransport};

use crate::Config;

#[derive(Debug, Serialize)]
struct HistoryOutput<'a> {
    range: &'a str,
    hours: u32,
    chart: &'a ChartData,
    summary: Option<&'a SummaryMetrics>,
}

pub fn run<W: Write>(writer: &mut W, config: &Config, range: Option<&str>, json: bool) -> Result<()> {
    let range = range.map_or_else(|| config.time_range(), TimeRange::parse_or_default);
    let client = MetricsClient::new(&config.server_url).context("failed to create metrics client")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    let history = runtime
        .block_on(client.fetch_history(range))
        .with_context(|| format!("failed to fetch history from {}", client.base_url()))?;

    write_history(writer, &history, range, json)
}

/// Normalizes a history response and writes it as a table or JSON.
pub fn write_history<W: Write>(
    writer: &mut W,
    history: &HistoryResponse,
    range: TimeRange,
    json: bool,
) -> Result<()> {
    let data = chart::normalize(&history.data);
    let summary = SummaryMetrics::from_latest(&history.data);

    if json {
        let output = HistoryOutput {
            range: range.as_str(),
            hours: range.hours(),
            chart: &data,
            summary: summary.as_ref(),
        };
        serde_json::to_writer_pretty(&mut *writer, &output)?;
        writeln!(writer)?;
        return Ok(());
    }

    writeln!(writer, "Server history ({range}, {} points)", data.len())?;
    if data.is_empty() {
        writeln!(writer, "No data points.")?;
        return Ok(());
    }

    writeln!(writer, "Time | Connections | Bandwidth (Mbps) | CPU (%) | Memory (%) | Quality")?;
    for i in 0..data.len() {
        writeln!(
            writer,
            "{} | {} | {:.2} | {} | {} | {}p",
            data.timestamps[i],
            data.connections[i],
            data.bandwidth[i],
            data.cpu[i],
            data.memory[i],
            data.quality[i]
        )?;
    }

    if let Some(summary) = summary {
        writeln!(writer)?;
        if let Some(connections) = summary.active_connections {
            writeln!(writer, "Active connections: {connections}")?;
        }
        if let Some(mbps) = summary.total_bandwidth {
            writeln!(writer, "Total bandwidth: {mbps:.2} Mbps")?;
        }
        if let Some(load) = summary.server_load {
            writeln!(writer, "Server load: {load}%")?;
        }
        if let Some(streams) = summary.active_streams {
            writeln!(writer, "Active streams: {streams}")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use serde_json::json;

    fn history() -> HistoryResponse {
        serde_json::from_value(json!({
            "data": [
                {
                    "timestamp": "2024-05-01T10:00:00",
                    "connections": {"total_connections": 2},
                    "network": {"bytes_sent": 262_144},
                    "system": {"cpu_percent": 12.5, "memory_percent": 48}
                },
                {
                    "timestamp": "2024-05-01T10:01:00",
                    "connections": {"total_connections": 3},
                    "system": {"cpu_percent": 15, "memory_percent": 50},
                    "streams": {"active_streams": 2, "quality": 1080}
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_history_renders_table() {
        let mut output = Vec::new();
        write_history(&mut output, &history(), TimeRange::SixHours, false).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Server history (6h, 2 points)
        Time | Connections | Bandwidth (Mbps) | CPU (%) | Memory (%) | Quality
        10:00:00 | 2 | 2.00 | 12.5 | 48 | 720p
        10:01:00 | 3 | 0.00 | 15 | 50 | 1080p

        Active connections: 3
        Server load: 15%
        Active streams: 2
        ");
    }

    #[test]
    fn test_history_renders_json() {
        let mut output = Vec::new();
        write_history(&mut output, &history(), TimeRange::Week, true).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["range"], "7d");
        assert_eq!(json["hours"], 168);
        assert_eq!(json["chart"]["quality"], json!([720.0, 1080.0]));
        assert_eq!(json["summary"]["server_load"], 15.0);
    }

    #[test]
    fn test_empty_history_says_so() {
        let mut output = Vec::new();
        write_history(&mut output, &HistoryResponse::default(), TimeRange::OneHour, false)
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(output, "Server history (1h, 0 points)\nNo data points.\n");
    }

    #[test]
    fn test_unreachable_server_is_an_error() {
        let config = Config {
            server_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        let result = run(&mut Vec::new(), &config, Some("1h"), false);
        assert!(result.is_err());
    }
}
