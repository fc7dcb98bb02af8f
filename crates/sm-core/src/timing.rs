//! Resource timing records and media segment summaries.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Name fragments that mark a resource as a media segment.
const SEGMENT_MARKERS: [&str; 3] = [".ts", ".m4s", ".mp4"];

/// A completed resource fetch as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTiming {
    /// Resource URL or path.
    pub name: String,
    /// Fetch duration in milliseconds.
    pub duration: f64,
    /// Bytes transferred.
    pub transfer_size: f64,
}

impl ResourceTiming {
    pub fn new(name: impl Into<String>, duration: f64, transfer_size: f64) -> Self {
        Self {
            name: name.into(),
            duration,
            transfer_size,
        }
    }

    pub fn is_media_segment(&self) -> bool {
        SEGMENT_MARKERS.iter().any(|marker| self.name.contains(marker))
    }
}

/// Averages over the media segments of one sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub segments: usize,
    /// Milliseconds.
    pub avg_duration: f64,
    /// Bytes.
    pub avg_size: f64,
    /// Megabits per second; zero when the average duration is zero.
    pub throughput_mbps: f64,
}

impl SegmentSummary {
    /// Summarizes the media segments among `entries`, or `None` if there are none.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_entries(entries: &[ResourceTiming]) -> Option<Self> {
        let (segments, total_duration, total_size) = entries
            .iter()
            .filter(|entry| entry.is_media_segment())
            .fold((0usize, 0.0, 0.0), |(count, duration, size), entry| {
                (count + 1, duration + entry.duration, size + entry.transfer_size)
            });
        if segments == 0 {
            return None;
        }

        let avg_duration = total_duration / segments as f64;
        let avg_size = total_size / segments as f64;
        let throughput_mbps = if avg_duration > 0.0 {
            avg_size * 8.0 / (avg_duration * 1000.0)
        } else {
            0.0
        };

        Some(Self {
            segments,
            avg_duration,
            avg_size,
            throughput_mbps,
        })
    }

    /// Metric name and value pairs in the order they are reported.
    pub fn metrics(&self) -> [(&'static str, f64); 3] {
        [
            ("segment_download_time", self.avg_duration),
            ("segment_size", self.avg_size),
            ("download_speed", self.throughput_mbps),
        ]
    }
}

/// A host-provided source of resource timings.
pub trait TimingSource {
    /// Takes every buffered record, leaving the source empty.
    fn drain(&self) -> Vec<ResourceTiming>;
}

/// Shared, clonable timing buffer the host pushes records into.
#[derive(Debug, Clone, Default)]
pub struct TimingBuffer {
    entries: Arc<Mutex<Vec<ResourceTiming>>>,
}

impl TimingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: ResourceTiming) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TimingSource for TimingBuffer {
    fn drain(&self) -> Vec<ResourceTiming> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
