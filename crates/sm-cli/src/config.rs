//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use sm_core::{DeviceInfo, TimeRange};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the metrics database.
    pub database_path: PathBuf,
    /// Base URL of the metrics server.
    pub server_url: String,
    /// History window token (`1h`, `6h`, `12h`, `24h`, `7d`, `30d`).
    pub time_range: String,
    /// Byte cap on stored keys and values, if any.
    pub storage_quota_bytes: Option<u64>,
    pub intervals: Intervals,
    /// Description of this host, reported with every client metric.
    pub device: DeviceInfo,
}

/// Sampling periods in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervals {
    /// Bandwidth tick, snapshot save and redraw.
    pub refresh_ms: u64,
    /// Resource timing sampling.
    pub local_ms: u64,
    /// Live server polling.
    pub remote_ms: u64,
    /// Server history polling.
    pub history_ms: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            refresh_ms: 5_000,
            local_ms: 2_000,
            remote_ms: 2_000,
            history_ms: 60_000,
        }
    }
}

impl Intervals {
    pub const fn refresh(&self) -> Duration {
        period(self.refresh_ms)
    }

    pub const fn local(&self) -> Duration {
        period(self.local_ms)
    }

    pub const fn remote(&self) -> Duration {
        period(self.remote_ms)
    }

    pub const fn history(&self) -> Duration {
        period(self.history_ms)
    }
}

/// Timers reject a zero period; the shortest accepted is one millisecond.
const fn period(ms: u64) -> Duration {
    Duration::from_millis(if ms == 0 { 1 } else { ms })
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("metrics.db"),
            server_url: "http://localhost:5000".to_string(),
            time_range: TimeRange::default().to_string(),
            storage_quota_bytes: None,
            intervals: Intervals::default(),
            device: DeviceInfo::default(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources override earlier ones: defaults, the user config file,
    /// `config_path`, then `SM_*` environment variables (`__` separates
    /// nested keys, e.g. `SM_INTERVALS__REFRESH_MS`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("SM_").split("__"));

        figment.extract()
    }

    /// The configured history window; unknown tokens fall back to one hour.
    pub fn time_range(&self) -> TimeRange {
        TimeRange::parse_or_default(&self.time_range)
    }
}

/// Returns the platform-specific config directory for sm.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sm"))
}

/// Returns the platform-specific data directory for sm.
///
/// On Linux: `~/.local/share/sm`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("sm"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("metrics.db"));
        assert_eq!(data_dir.file_name().unwrap(), "sm");
    }

    #[test]
    fn test_default_intervals_match_player_timers() {
        let intervals = Intervals::default();
        assert_eq!(intervals.refresh(), Duration::from_secs(5));
        assert_eq!(intervals.local(), Duration::from_secs(2));
        assert_eq!(intervals.remote(), Duration::from_secs(2));
        assert_eq!(intervals.history(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let intervals = Intervals {
            refresh_ms: 0,
            ..Intervals::default()
        };
        assert_eq!(intervals.refresh(), Duration::from_millis(1));
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                server_url = "http://metrics.internal:8080"
                time_range = "7d"

                [intervals]
                refresh_ms = 1000
                "#,
            )?;

            let config = Config::load_from(Some(Path::new("custom.toml")))?;
            assert_eq!(config.server_url, "http://metrics.internal:8080");
            assert_eq!(config.time_range(), TimeRange::Week);
            assert_eq!(config.intervals.refresh_ms, 1000);
            assert_eq!(config.intervals.history_ms, 60_000);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SM_INTERVALS__REMOTE_MS", "250");
            jail.set_env("SM_STORAGE_QUOTA_BYTES", "4096");
            jail.set_env("SM_DEVICE__USER_AGENT", "Mozilla/5.0 Mobile");

            let config = Config::load()?;
            assert_eq!(config.intervals.remote_ms, 250);
            assert_eq!(config.storage_quota_bytes, Some(4096));
            assert_eq!(config.device.device(), sm_core::Device::Mobile);
            Ok(())
        });
    }

    #[test]
    fn test_unknown_time_range_falls_back() {
        let config = Config {
            time_range: "fortnight".to_string(),
            ..Config::default()
        };
        assert_eq!(config.time_range(), TimeRange::OneHour);
    }
}
