//! Live server snapshot and its projection onto the status panel.

use serde::{Deserialize, Serialize};

use crate::chart::{ConnectionStats, NetworkStats, SystemStats, format_number};
use crate::surface::{SERVER_BANDWIDTH, SERVER_CONNECTIONS, SERVER_CPU, SERVER_STATUS, Surface};

/// Body of the live server metrics endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSnapshot {
    pub connections: Option<ConnectionStats>,
    pub network: Option<NetworkStats>,
    pub system: Option<SystemStats>,
}

/// Reachability of the metrics server as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerStatus {
    Online,
    Offline,
}

impl ServerStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Offline => "Offline",
        }
    }

    pub const fn class(self) -> &'static str {
        match self {
            Self::Online => "status-online",
            Self::Offline => "status-offline",
        }
    }
}

/// Display strings for the server panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerView {
    pub connections: String,
    pub bandwidth: String,
    pub cpu: String,
}

impl ServerSnapshot {
    pub fn project(&self) -> ServerView {
        let connections = self
            .connections
            .as_ref()
            .and_then(|c| c.total_connections)
            .map_or_else(|| "0".to_string(), format_number);

        let bandwidth = self
            .network
            .as_ref()
            .and_then(|n| n.current_bandwidth)
            .filter(|bps| *bps != 0.0)
            .map_or_else(
                || "0 Mbps".to_string(),
                |bps| format!("{:.2} Mbps", bps / 1024.0 / 1024.0),
            );

        let cpu = self
            .system
            .as_ref()
            .and_then(|s| s.cpu_percent)
            .map_or_else(|| "0%".to_string(), |cpu| format!("{}%", format_number(cpu)));

        ServerView {
            connections,
            bandwidth,
            cpu,
        }
    }
}

/// Writes a successful poll result and marks the server online.
pub fn render(view: &ServerView, surface: &mut impl Surface) {
    surface.set_text(SERVER_CONNECTIONS, &view.connections);
    surface.set_text(SERVER_BANDWIDTH, &view.bandwidth);
    surface.set_text(SERVER_CPU, &view.cpu);
    render_status(ServerStatus::Online, surface);
}

pub fn render_status(status: ServerStatus, surface: &mut impl Surface) {
    surface.set_text(SERVER_STATUS, status.label());
    surface.set_class(SERVER_STATUS, status.class());
}
