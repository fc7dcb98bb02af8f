//! Timing command for buffering a resource download measurement.
//!
//! Entries wait in the store until a running `sm watch` drains them into
//! segment metrics.

use std::io::Write;

use anyhow::{Result, bail};
use clap::Args;

use sm_core::ResourceTiming;

use crate::Config;
use crate::commands::util::open_store;

#[derive(Debug, Args)]
pub struct TimingArgs {
    /// Resource URL or path.
    #[arg(long)]
    pub name: String,
    /// Download duration in milliseconds.
    #[arg(long)]
    pub duration: f64,
    /// Transfer size in bytes.
    #[arg(long)]
    pub size: f64,
}

pub fn run<W: Write>(writer: &mut W, args: &TimingArgs, config: &Config) -> Result<()> {
    if args.name.trim().is_empty() {
        bail!("--name must not be empty");
    }
    if !args.duration.is_finite() || args.duration < 0.0 {
        bail!("--duration must be a non-negative number of milliseconds");
    }
    if !args.size.is_finite() || args.size < 0.0 {
        bail!("--size must be a non-negative number of bytes");
    }

    let timing = ResourceTiming::new(args.name.as_str(), args.duration, args.size);
    let store = open_store(config)?;
    if !store.push_timing(&timing) {
        bail!("failed to buffer timing for {}", timing.name);
    }

    writeln!(
        writer,
        "Buffered timing for {} ({} ms, {} bytes)",
        timing.name, timing.duration, timing.transfer_size
    )?;
    if !timing.is_media_segment() {
        writeln!(writer, "Note: not a media segment, it will not count toward segment metrics")?;
    }
    writeln!(writer, "Pending timings: {}", store.pending_timings().len())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    fn config(temp: &tempfile::TempDir) -> Config {
        Config {
            database_path: temp.path().join("metrics.db"),
            ..Config::default()
        }
    }

    fn args(name: &str, duration: f64, size: f64) -> TimingArgs {
        TimingArgs {
            name: name.to_string(),
            duration,
            size,
        }
    }

    #[test]
    fn test_timings_accumulate_in_store() {
        let temp = tempfile::tempdir().unwrap();
        let config = config(&temp);

        let mut output = Vec::new();
        run(&mut output, &args("/hls/seg-1.ts", 120.5, 250_000.0), &config).unwrap();
        run(&mut output, &args("/app.js", 8.0, 1_024.0), &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Buffered timing for /hls/seg-1.ts (120.5 ms, 250000 bytes)
        Pending timings: 1
        Buffered timing for /app.js (8 ms, 1024 bytes)
        Note: not a media segment, it will not count toward segment metrics
        Pending timings: 2
        ");

        let pending = open_store(&config).unwrap().pending_timings();
        assert_eq!(pending[0], ResourceTiming::new("/hls/seg-1.ts", 120.5, 250_000.0));
    }

    #[test]
    fn test_invalid_timing_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let config = config(&temp);

        let err = run(&mut Vec::new(), &args(" ", 1.0, 1.0), &config).unwrap_err();
        assert_eq!(err.to_string(), "--name must not be empty");
        let err = run(&mut Vec::new(), &args("/seg.ts", -1.0, 1.0), &config).unwrap_err();
        assert!(err.to_string().starts_with("--duration"));
        let err = run(&mut Vec::new(), &args("/seg.ts", 1.0, f64::NAN), &config).unwrap_err();
        assert!(err.to_string().starts_with("--size"));

        assert!(open_store(&config).unwrap().pending_timings().is_empty());
    }
}
