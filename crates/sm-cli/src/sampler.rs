//! The periodic sampling loop.
//!
//! A [`Sampler`] owns the tracker and the display surface and runs as a single
//! task. Four independent jobs fire on their own intervals:
//!
//! | job | duty |
//! |---|---|
//! | refresh | catch up with the log, tick bandwidth, save, redraw |
//! | local | drain resource timings and report segment metrics |
//! | remote | poll the live server snapshot |
//! | history | poll server history for charts |
//!
//! Network I/O runs in detached tasks. Their results come back over a channel
//! and are applied by the loop itself, so all state is touched from one place
//! and a failing job never stops the others. Polls carry a sequence number; a
//! result older than one already shown is dropped.
//!
//! Player signals picked up by live events or by refresh are posted as client
//! metrics right away.

use chrono::Utc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use sm_core::chart::{self, SummaryMetrics};
use sm_core::server::{self, ServerStatus};
use sm_core::{
    AggregateState, HistoryResponse, SegmentSummary, ServerSnapshot, StreamEvent, Surface,
    TimeRange, TimingSource, dashboard,
};
use sm_remote::{ClientMetric, MetricsTransport, RemoteError};
use sm_store::KeyValueStore;

use crate::config::Intervals;
use crate::tracker::Tracker;

/// Source of wall-clock Unix milliseconds.
pub type Clock = fn() -> i64;

fn system_clock() -> i64 {
    Utc::now().timestamp_millis()
}

/// Completed remote I/O, delivered back to the loop with its poll number.
#[derive(Debug)]
enum RemoteUpdate {
    Server(u64, Result<ServerSnapshot, RemoteError>),
    History(u64, Result<HistoryResponse, RemoteError>),
}

/// Numbers the polls of one kind and tracks the newest one applied.
#[derive(Debug, Default)]
struct PollSequence {
    issued: u64,
    applied: u64,
}

impl PollSequence {
    const fn next(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Returns `false` for a result older than one already applied.
    const fn accept(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            return false;
        }
        self.applied = seq;
        true
    }
}

/// Everything the sampling loop needs, before it starts.
pub struct Sampler<S, T, F, U> {
    tracker: Tracker<S>,
    transport: T,
    timings: F,
    surface: U,
    client_id: String,
    range: TimeRange,
    intervals: Intervals,
    clock: Clock,
    server_polls: PollSequence,
    history_polls: PollSequence,
}

impl<S, T, F, U> Sampler<S, T, F, U>
where
    S: KeyValueStore + Send + 'static,
    T: MetricsTransport,
    F: TimingSource + Send + 'static,
    U: Surface + Send + 'static,
{
    pub fn new(tracker: Tracker<S>, transport: T, timings: F, surface: U) -> Self {
        let client_id = tracker.store().client_id();
        Self {
            tracker,
            transport,
            timings,
            surface,
            client_id,
            range: TimeRange::default(),
            intervals: Intervals::default(),
            clock: system_clock,
            server_polls: PollSequence::default(),
            history_polls: PollSequence::default(),
        }
    }

    #[must_use]
    pub const fn with_range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    #[must_use]
    pub const fn with_intervals(mut self, intervals: Intervals) -> Self {
        self.intervals = intervals;
        self
    }

    #[must_use]
    pub const fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Spawns the loop onto the current runtime.
    pub fn start(self) -> SamplerHandle<S> {
        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(cancel.clone(), events_rx));
        tracing::info!("sampler started");
        SamplerHandle {
            guard: cancel.drop_guard(),
            events: events_tx,
            task,
        }
    }

    async fn run(
        mut self,
        cancel: CancellationToken,
        mut events: UnboundedReceiver<StreamEvent>,
    ) -> Tracker<S> {
        let (updates_tx, mut updates) = mpsc::unbounded_channel();
        let mut refresh = ticker(self.intervals.refresh());
        let mut local = ticker(self.intervals.local());
        let mut remote = ticker(self.intervals.remote());
        let mut history = ticker(self.intervals.history());

        self.redraw();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(event) = events.recv() => self.on_event(&event),
                Some(update) = updates.recv() => self.on_update(update),
                _ = refresh.tick() => self.on_refresh(),
                _ = local.tick() => self.on_local(),
                _ = remote.tick() => self.poll_server(&updates_tx),
                _ = history.tick() => self.poll_history(&updates_tx),
            }
        }

        // events recorded before stop still count
        while let Ok(event) = events.try_recv() {
            self.on_event(&event);
        }
        tracing::info!("sampler stopped");
        self.tracker
    }

    fn redraw(&mut self) {
        dashboard::render(&self.tracker.view(), &mut self.surface);
        self.tracker.player().render(&mut self.surface);
        self.surface.flush();
    }

    fn on_event(&mut self, event: &StreamEvent) {
        self.tracker.record(event);
        self.post_player_metrics();
        self.redraw();
    }

    fn on_refresh(&mut self) {
        let bandwidth = self.tracker.refresh((self.clock)());
        tracing::trace!(bandwidth, "refreshed");
        self.post_player_metrics();
        self.redraw();
    }

    fn post_player_metrics(&mut self) {
        let metrics = self.tracker.take_player_metrics(&self.client_id);
        self.post_metrics(metrics);
    }

    /// Sends `metrics` in order from a detached task.
    fn post_metrics(&self, metrics: Vec<ClientMetric>) {
        if metrics.is_empty() {
            return;
        }
        let transport = self.transport.clone();
        tokio::spawn(async move {
            for metric in metrics {
                if let Err(err) = transport.post_client_metric(&metric).await {
                    tracing::warn!(%err, metric = %metric.metric, "failed to send metric");
                }
            }
        });
    }

    fn on_local(&mut self) {
        let entries = self.timings.drain();
        let Some(summary) = SegmentSummary::from_entries(&entries) else {
            return;
        };
        tracing::debug!(segments = summary.segments, throughput = summary.throughput_mbps, "segment summary");

        let now = (self.clock)();
        let metrics: Vec<_> = summary
            .metrics()
            .iter()
            .map(|(name, value)| self.tracker.client_metric(&self.client_id, name, *value, now))
            .collect();
        self.post_metrics(metrics);
    }

    fn poll_server(&mut self, updates: &UnboundedSender<RemoteUpdate>) {
        let seq = self.server_polls.next();
        let transport = self.transport.clone();
        let updates = updates.clone();
        tokio::spawn(async move {
            let result = transport.fetch_server().await;
            let _ = updates.send(RemoteUpdate::Server(seq, result));
        });
    }

    fn poll_history(&mut self, updates: &UnboundedSender<RemoteUpdate>) {
        let seq = self.history_polls.next();
        let transport = self.transport.clone();
        let updates = updates.clone();
        let range = self.range;
        tokio::spawn(async move {
            let result = transport.fetch_history(range).await;
            let _ = updates.send(RemoteUpdate::History(seq, result));
        });
    }

    fn on_update(&mut self, update: RemoteUpdate) {
        let fresh = match &update {
            RemoteUpdate::Server(seq, _) => self.server_polls.accept(*seq),
            RemoteUpdate::History(seq, _) => self.history_polls.accept(*seq),
        };
        if !fresh {
            tracing::debug!("dropping stale poll result");
            return;
        }

        match update {
            RemoteUpdate::Server(_, Ok(snapshot)) => {
                server::render(&snapshot.project(), &mut self.surface);
            }
            RemoteUpdate::Server(_, Err(err)) => {
                tracing::warn!(%err, "failed to fetch server metrics");
                server::render_status(ServerStatus::Offline, &mut self.surface);
            }
            RemoteUpdate::History(_, Ok(history)) => {
                let data = chart::normalize(&history.data);
                let summary = SummaryMetrics::from_latest(&history.data);
                chart::render(&data, summary.as_ref(), &mut self.surface);
                tracing::debug!(points = data.len(), "charts updated");
            }
            RemoteUpdate::History(_, Err(err)) => {
                tracing::warn!(%err, "failed to fetch metrics history");
            }
        }
        self.surface.flush();
    }
}

fn ticker(period: std::time::Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Control handle for a running [`Sampler`].
///
/// Dropping the handle cancels the loop.
pub struct SamplerHandle<S> {
    guard: DropGuard,
    events: UnboundedSender<StreamEvent>,
    task: JoinHandle<Tracker<S>>,
}

impl<S: KeyValueStore> SamplerHandle<S> {
    /// Queues a live playback event. Returns `false` once the loop has ended.
    pub fn record(&self, event: StreamEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Cancels every job and returns the final aggregate state.
    pub async fn stop(self) -> Result<AggregateState, JoinError> {
        let Self {
            guard,
            events,
            task,
        } = self;
        drop(events);
        drop(guard);
        let tracker = task.await?;
        Ok(tracker.into_state())
    }
}
