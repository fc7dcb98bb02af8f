use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sm_cli::commands::{dashboard, history, init, record, status, timing, watch};
use sm_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = std::io::stdout().lock();
    let now = Utc::now().timestamp_millis();
    match command {
        Commands::Init => init::run(&mut stdout, &config)?,
        Commands::Record(args) => record::run(&mut stdout, args, &config, now)?,
        Commands::Timing(args) => timing::run(&mut stdout, args, &config)?,
        Commands::Dashboard { json } => dashboard::run(&mut stdout, &config, *json, now)?,
        Commands::Status => status::run(&mut stdout, &config)?,
        Commands::History { range, json } => {
            history::run(&mut stdout, &config, range.as_deref(), *json)?;
        }
        Commands::Watch { range } => {
            drop(stdout);
            watch::run(&config, range.as_deref(), now)?;
        }
    }

    Ok(())
}
