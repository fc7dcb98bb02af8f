//! Core domain logic for the playback metrics aggregator.
//!
//! This crate contains the fundamental types and logic for:
//! - Aggregation: reducing playback events into session and video statistics
//! - Dashboard projection: turning aggregate state into display values
//! - Chart data: normalizing server metric history into chart series
//! - Player health: load, rebuffer, buffer level and error metrics
//! - Segment timing: summarizing media segment fetches

pub mod aggregate;
pub mod chart;
pub mod dashboard;
pub mod event;
pub mod player;
pub mod server;
pub mod session;
pub mod surface;
pub mod timing;
pub mod types;

pub use aggregate::{AggregateSnapshot, AggregateState, Aggregator, VideoStats};
pub use chart::{ChartData, ChartKind, HistoryResponse, ServerMetricsSample, SummaryMetrics, TimeRange};
pub use dashboard::DashboardView;
pub use event::{EventType, PlayerError, PlayerState, StreamEvent};
pub use player::{MetricValue, PlayerMetric, PlayerMonitor};
pub use server::{ServerSnapshot, ServerStatus};
pub use session::{Device, DeviceInfo, Session};
pub use surface::{MemorySurface, Surface, TableRow};
pub use timing::{ResourceTiming, SegmentSummary, TimingBuffer, TimingSource};
pub use types::{ValidationError, VideoId};
