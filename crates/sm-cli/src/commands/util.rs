//! Shared utilities for CLI commands.

use anyhow::{Context, Result, bail};
use chrono::DateTime;

use sm_core::Aggregator;
use sm_store::{EventStore, SqliteStore};

use crate::Config;
use crate::tracker::Tracker;

/// Opens the configured store, creating its parent directory if needed.
pub fn open_store(config: &Config) -> Result<EventStore<SqliteStore>> {
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("failed to create database directory")?;
        }
    }

    let mut store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    if let Some(quota) = config.storage_quota_bytes {
        store = store.with_quota(quota);
    }
    Ok(EventStore::new(store))
}

/// Opens the store and rebuilds tracking state as of `now`.
pub fn open_tracker(config: &Config, now: i64) -> Result<Tracker<SqliteStore>> {
    let store = open_store(config)?;
    let aggregator = Aggregator::new(now, config.device.device());
    Ok(Tracker::restore(store, aggregator, config.device.clone()))
}

/// Parse a timestamp given as Unix milliseconds or RFC 3339.
///
/// Supports:
/// - Unix milliseconds: "1714557600000"
/// - RFC 3339: "2024-05-01T10:00:00Z"
pub fn parse_timestamp(s: &str) -> Result<i64> {
    let s = s.trim();
    if let Ok(millis) = s.parse::<i64>() {
        return Ok(millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    bail!("Invalid timestamp: {s}. Use Unix milliseconds or RFC 3339 (e.g., 2024-05-01T10:00:00Z)")
}

/// Formats Unix milliseconds as RFC 3339, falling back to the raw number.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_millis_and_rfc3339() {
        assert_eq!(parse_timestamp("1714557600000").unwrap(), 1_714_557_600_000);
        assert_eq!(
            parse_timestamp("2024-05-01T12:00:00+02:00").unwrap(),
            1_714_557_600_000
        );
    }

    #[test]
    fn test_rejects_garbage_timestamp() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(err.to_string().starts_with("Invalid timestamp: yesterday"));
    }

    #[test]
    fn test_formats_timestamp_as_utc() {
        assert_eq!(format_timestamp(1_714_557_600_000), "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_open_store_creates_parent_directory() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("nested/dir/metrics.db"),
            ..Config::default()
        };

        let store = open_store(&config).unwrap();
        assert!(store.load_all().is_empty());
        assert!(config.database_path.exists());
    }
}
