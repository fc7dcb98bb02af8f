//! Watch command: the live dashboard.
//!
//! Runs the sampler until Ctrl-C, redrawing the dashboard in the terminal.
//! Events recorded by other `sm record` invocations are picked up on the
//! next refresh, and timings buffered by `sm timing` on the next local pass.

use std::io::{IsTerminal, Write};

use anyhow::{Context, Result};

use sm_core::chart::ChartSeries;
use sm_core::{ChartKind, MemorySurface, Surface, TableRow, TimeRange, dashboard};
use sm_remote::MetricsClient;

use crate::Config;
use crate::commands::util::{open_store, open_tracker};
use crate::sampler::Sampler;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// A [`MemorySurface`] that prints itself to a writer on every flush.
#[derive(Debug)]
pub struct TerminalSurface<W> {
    inner: MemorySurface,
    writer: W,
    clear: bool,
}

impl<W: Write> TerminalSurface<W> {
    /// `clear` wipes the screen before each frame.
    pub fn new(writer: W, clear: bool) -> Self {
        Self {
            inner: MemorySurface::dashboard(),
            writer,
            clear,
        }
    }

    pub const fn surface(&self) -> &MemorySurface {
        &self.inner
    }

    fn draw(&mut self) -> std::io::Result<()> {
        if self.clear {
            write!(self.writer, "{CLEAR_SCREEN}")?;
        }
        write!(self.writer, "{}", self.inner.to_text())?;
        self.writer.flush()
    }
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn set_text(&mut self, id: &str, text: &str) -> bool {
        self.inner.set_text(id, text)
    }

    fn set_class(&mut self, id: &str, class: &str) -> bool {
        self.inner.set_class(id, class)
    }

    fn set_rows(&mut self, id: &str, rows: &[TableRow]) -> bool {
        self.inner.set_rows(id, rows)
    }

    fn update_chart(&mut self, kind: ChartKind, series: &ChartSeries) -> bool {
        self.inner.update_chart(kind, series)
    }

    fn flush(&mut self) {
        if let Err(err) = self.draw() {
            tracing::warn!(%err, "failed to draw dashboard");
        }
    }
}

pub fn run(config: &Config, range: Option<&str>, now: i64) -> Result<()> {
    let range = range.map_or_else(|| config.time_range(), TimeRange::parse_or_default);
    let tracker = open_tracker(config, now)?;
    let timings = open_store(config)?;
    let client = MetricsClient::new(&config.server_url).context("failed to create metrics client")?;

    let stdout = std::io::stdout();
    let clear = stdout.is_terminal();
    let surface = TerminalSurface::new(stdout, clear);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio runtime")?;
    let state = runtime.block_on(async {
        let handle = Sampler::new(tracker, client, timings, surface)
            .with_range(range)
            .with_intervals(config.intervals)
            .start();

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        tracing::debug!("interrupt received");

        handle.stop().await.context("sampler task failed")
    })?;

    println!();
    println!(
        "Stopped. Active streams: {}, total views: {}, bandwidth: {}",
        state.active_streams,
        state.total_views,
        dashboard::format_bandwidth(state.bandwidth)
    );
    Ok(())
}
