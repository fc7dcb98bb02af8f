//! Playback sessions and the device they ran on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::VideoId;

/// Resolution label used when the player does not report one.
pub const UNKNOWN_RESOLUTION: &str = "unknown";

/// Device class a session was watched on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    Mobile,
    #[default]
    Desktop,
}

impl Device {
    /// Classifies a user agent string. Anything mentioning `Mobile` is mobile.
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("Mobile") {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mobile => "Mobile",
            Self::Desktop => "Desktop",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Description of the host the player runs on.
///
/// Sent verbatim with every client metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub user_agent: String,
    pub platform: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub pixel_ratio: f64,
}

impl DeviceInfo {
    pub fn device(&self) -> Device {
        Device::from_user_agent(&self.user_agent)
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            user_agent: format!(
                "sm/{} ({})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS
            ),
            platform: std::env::consts::OS.to_string(),
            screen_width: 0,
            screen_height: 0,
            pixel_ratio: 1.0,
        }
    }
}

/// One open-to-close playback interval for a single video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub video_id: VideoId,
    /// Unix milliseconds of the `play` event that opened the session.
    pub start_time: i64,
    /// Unix milliseconds of the closing event; `None` while playing.
    pub end_time: Option<i64>,
    pub device: Device,
    pub resolution: String,
}

impl Session {
    /// Opens a session for `video_id` at `start_time`.
    pub fn open(
        video_id: VideoId,
        start_time: i64,
        device: Device,
        resolution: Option<&str>,
    ) -> Self {
        Self {
            video_id,
            start_time,
            end_time: None,
            device,
            resolution: resolution.unwrap_or(UNKNOWN_RESOLUTION).to_string(),
        }
    }

    pub const fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Whole seconds watched, or `None` while the session is still open.
    ///
    /// A close timestamp earlier than the start counts as zero.
    pub fn watch_seconds(&self) -> Option<u64> {
        let end = self.end_time?;
        let elapsed_ms = end.saturating_sub(self.start_time).max(0);
        Some(elapsed_ms.unsigned_abs() / 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str) -> VideoId {
        VideoId::new(id).unwrap()
    }

    #[test]
    fn test_device_detection_matches_mobile_marker() {
        assert_eq!(
            Device::from_user_agent("Mozilla/5.0 (iPhone) Mobile/15E148"),
            Device::Mobile
        );
        assert_eq!(
            Device::from_user_agent("Mozilla/5.0 (X11; Linux x86_64)"),
            Device::Desktop
        );
    }

    #[test]
    fn test_open_session_defaults_resolution() {
        let session = Session::open(video("v1"), 0, Device::Desktop, None);
        assert!(session.is_open());
        assert_eq!(session.resolution, "unknown");
        assert_eq!(session.watch_seconds(), None);
    }

    #[test]
    fn test_watch_seconds_floors_to_whole_seconds() {
        let mut session = Session::open(video("v1"), 1_000, Device::Mobile, Some("1280x720"));
        session.end_time = Some(6_999);
        assert_eq!(session.watch_seconds(), Some(5));
    }

    #[test]
    fn test_watch_seconds_never_negative() {
        let mut session = Session::open(video("v1"), 10_000, Device::Desktop, None);
        session.end_time = Some(4_000);
        assert_eq!(session.watch_seconds(), Some(0));
    }

    #[test]
    fn test_session_serializes_camel_case() {
        let session = Session::open(video("v1"), 42, Device::Mobile, Some("640x480"));
        let json = serde_json::to_string(&session).unwrap();
        assert_eq!(
            json,
            r#"{"videoId":"v1","startTime":42,"endTime":null,"device":"Mobile","resolution":"640x480"}"#
        );
    }
}
