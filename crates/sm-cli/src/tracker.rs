//! Live tracking state: the aggregator kept in sync with the durable log.

use sm_core::dashboard::{self, DashboardView};
use sm_core::{
    AggregateState, Aggregator, DeviceInfo, EventType, MetricValue, PlayerMetric, PlayerMonitor,
    PlayerState, Session, StreamEvent, VideoId,
};
use sm_remote::ClientMetric;
use sm_store::{EventStore, KeyValueStore};

/// Couples an [`EventStore`] with the [`Aggregator`] derived from it.
///
/// The tracker remembers how many log entries it has applied so events
/// appended by other writers can be picked up on [`refresh`](Self::refresh).
/// Player signals among new events queue metrics until
/// [`take_player_metrics`](Self::take_player_metrics); restoring replays the
/// log without queueing any.
#[derive(Debug)]
pub struct Tracker<S> {
    store: EventStore<S>,
    aggregator: Aggregator,
    device_info: DeviceInfo,
    log_len: usize,
    player: PlayerMonitor,
    pending: Vec<PlayerMetric>,
    media_id: Option<VideoId>,
}

impl<S: KeyValueStore> Tracker<S> {
    /// Rebuilds tracking state from whatever the store holds.
    pub fn restore(store: EventStore<S>, mut aggregator: Aggregator, device_info: DeviceInfo) -> Self {
        let events = store.load_all();
        let snapshot = store.load_snapshot();
        aggregator.restore(snapshot.as_ref(), &events);

        let mut player = PlayerMonitor::new();
        for event in &events {
            player.observe(event);
        }
        let media_id = events.last().map(|event| event.video_id.clone());

        tracing::debug!(events = events.len(), player_state = %player.state(), "tracker restored");
        Self {
            store,
            aggregator,
            device_info,
            log_len: events.len(),
            player,
            pending: Vec::new(),
            media_id,
        }
    }

    /// Persists and applies a live event.
    ///
    /// The event is applied even when the store refuses it. Returns whether it
    /// was persisted.
    pub fn record(&mut self, event: &StreamEvent) -> bool {
        let persisted = self.store.append(event);
        if persisted {
            self.log_len += 1;
        }

        self.apply(event);
        match event.kind {
            EventType::Play => {
                let session = Session::open(
                    event.video_id.clone(),
                    event.timestamp,
                    self.aggregator.device(),
                    event.resolution.as_deref(),
                );
                self.store.set_current_session(Some(&session));
            }
            EventType::Pause | EventType::Complete => {
                let is_current = self
                    .store
                    .current_session()
                    .is_some_and(|session| session.video_id == event.video_id);
                if is_current {
                    self.store.set_current_session(None);
                }
            }
            _ => {}
        }

        self.store.save_snapshot(&self.aggregator.snapshot());
        tracing::debug!(video_id = %event.video_id, kind = %event.kind, persisted, "recorded event");
        persisted
    }

    fn apply(&mut self, event: &StreamEvent) {
        self.aggregator.apply(event);
        let metrics = self.player.observe(event);
        self.pending.extend(metrics);
        self.media_id = Some(event.video_id.clone());
    }

    /// Catches up with the durable log, ticks the bandwidth estimate and
    /// saves the snapshot. Returns the new estimate.
    pub fn refresh(&mut self, now: i64) -> f64 {
        let events = self.store.load_all();
        if events.len() > self.log_len {
            tracing::debug!(new = events.len() - self.log_len, "applying external events");
            for event in &events[self.log_len..] {
                self.apply(event);
            }
        } else if events.len() < self.log_len {
            tracing::warn!(
                expected = self.log_len,
                found = events.len(),
                "event log shrank, rebuilding"
            );
            let snapshot = self.aggregator.snapshot();
            self.aggregator.restore(Some(&snapshot), &events);
        }
        self.log_len = events.len();

        let bandwidth = self.aggregator.tick(now);
        self.store.save_snapshot(&self.aggregator.snapshot());
        bandwidth
    }

    pub fn view(&self) -> DashboardView {
        dashboard::project(self.state(), self.store.current_session().as_ref())
    }

    /// Builds a client metric stamped with the current player context.
    pub fn client_metric(
        &self,
        client_id: &str,
        metric: &str,
        value: impl Into<MetricValue>,
        now: i64,
    ) -> ClientMetric {
        ClientMetric {
            client_id: client_id.to_string(),
            metric: metric.to_string(),
            value: value.into(),
            timestamp: now,
            player_state: self.player.state(),
            media_id: self.media_id.clone(),
            session_duration: now.saturating_sub(self.state().start_time),
            device_info: self.device_info.clone(),
        }
    }

    /// Takes the metrics queued by player signals since the last call.
    pub fn take_player_metrics(&mut self, client_id: &str) -> Vec<ClientMetric> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|metric| ClientMetric {
                player_state: metric.player_state,
                ..self.client_metric(client_id, metric.name, metric.value, metric.timestamp)
            })
            .collect()
    }

    pub const fn player(&self) -> &PlayerMonitor {
        &self.player
    }

    pub const fn state(&self) -> &AggregateState {
        self.aggregator.state()
    }

    pub fn into_state(self) -> AggregateState {
        self.aggregator.into_state()
    }

    pub const fn store(&self) -> &EventStore<S> {
        &self.store
    }

    pub const fn player_state(&self) -> PlayerState {
        self.player.state()
    }
}
