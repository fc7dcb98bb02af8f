//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::record::RecordArgs;
use crate::commands::timing::TimingArgs;

/// Playback metrics aggregator.
///
/// Records playback events, aggregates them into viewing statistics and
/// renders a live dashboard alongside server metrics.
#[derive(Debug, Parser)]
#[command(name = "sm", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the metrics database and show the client id.
    Init,

    /// Record a playback event or player signal.
    Record(RecordArgs),

    /// Buffer a resource download timing for the next segment report.
    Timing(TimingArgs),

    /// Render the dashboard once.
    Dashboard {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show store status.
    Status,

    /// Fetch server metric history.
    History {
        /// Window to fetch (1h, 6h, 12h, 24h, 7d, 30d).
        #[arg(long)]
        range: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run the live dashboard until interrupted.
    Watch {
        /// History window for the charts.
        #[arg(long)]
        range: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;
    use crate::commands::record::EventKind;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_record_arguments() {
        let cli = Cli::try_parse_from([
            "sm", "record", "play", "--video", "v1", "--resolution", "1920x1080",
        ])
        .unwrap();
        let Some(Commands::Record(args)) = cli.command else {
            panic!("expected record command");
        };
        assert_eq!(args.kind, EventKind::Play);
        assert_eq!(args.video, "v1");
        assert_eq!(args.resolution.as_deref(), Some("1920x1080"));
    }

    #[test]
    fn test_parses_player_signal_and_timing() {
        let cli = Cli::try_parse_from([
            "sm", "record", "timeupdate", "--video", "v1", "--buffer-level", "3.5", "--bitrate",
            "2500000",
        ])
        .unwrap();
        let Some(Commands::Record(args)) = cli.command else {
            panic!("expected record command");
        };
        assert_eq!(args.kind, EventKind::Timeupdate);
        assert_eq!(args.buffer_level, Some(3.5));
        assert_eq!(args.bitrate, Some(2_500_000.0));

        let cli = Cli::try_parse_from([
            "sm", "timing", "--name", "/hls/seg-1.ts", "--duration", "120", "--size", "250000",
        ])
        .unwrap();
        let Some(Commands::Timing(args)) = cli.command else {
            panic!("expected timing command");
        };
        assert_eq!(args.name, "/hls/seg-1.ts");
        assert_eq!(args.size, 250_000.0);
    }

    #[test]
    fn test_global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from(["sm", "history", "--range", "7d", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Some(Commands::History { range: Some(ref r), json: false }) if r == "7d"
        ));
    }
}
