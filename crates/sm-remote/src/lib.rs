//! HTTP client for the streaming metrics server.
//!
//! Three endpoints are used:
//! - `POST /api/metrics/client`: fire-and-forget client metrics
//! - `GET /api/metrics/server`: the live server snapshot
//! - `GET /api/metrics/server/history?hours=<n>`: metric history for charts
//!
//! Callers depend on [`MetricsTransport`] rather than [`MetricsClient`] so
//! the sampling loop can run against a fake in tests.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::{RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use sm_core::{
    DeviceInfo, HistoryResponse, MetricValue, PlayerState, ServerSnapshot, TimeRange, VideoId,
};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const CLIENT_METRICS_PATH: &str = "/api/metrics/client";
const SERVER_METRICS_PATH: &str = "/api/metrics/server";
const SERVER_HISTORY_PATH: &str = "/api/metrics/server/history";

/// Remote client errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The configured server URL could not be parsed.
    #[error("invalid server URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A single client-side measurement reported to the server.
#[derive(Debug, Clone, Serialize)]
pub struct ClientMetric {
    pub client_id: String,
    pub metric: String,
    /// A number for most metrics; `{code, message}` for `player_error`.
    pub value: MetricValue,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub player_state: PlayerState,
    pub media_id: Option<VideoId>,
    /// Milliseconds since the aggregator started.
    pub session_duration: i64,
    pub device_info: DeviceInfo,
}

/// The three metrics endpoints.
pub trait MetricsTransport: Clone + Send + Sync + 'static {
    fn post_client_metric(
        &self,
        metric: &ClientMetric,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn fetch_server(&self) -> impl Future<Output = Result<ServerSnapshot, RemoteError>> + Send;

    fn fetch_history(
        &self,
        range: TimeRange,
    ) -> impl Future<Output = Result<HistoryResponse, RemoteError>> + Send;
}

/// `reqwest`-backed metrics client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct MetricsClient {
    http: reqwest::Client,
    base: Url,
}

impl fmt::Debug for MetricsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl MetricsClient {
    /// Creates a client for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let base = Url::parse(base_url.trim_end_matches('/')).map_err(|err| {
            RemoteError::InvalidUrl {
                url: base_url.to_string(),
                reason: err.to_string(),
            }
        })?;
        if base.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl {
                url: base_url.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RemoteError::ClientBuild)?;

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base.as_str().trim_end_matches('/'))
    }

    fn client_metric_request(&self, metric: &ClientMetric) -> RequestBuilder {
        self.http
            .post(self.endpoint(CLIENT_METRICS_PATH))
            .json(metric)
    }

    fn server_request(&self) -> RequestBuilder {
        self.http.get(self.endpoint(SERVER_METRICS_PATH))
    }

    fn history_request(&self, range: TimeRange) -> RequestBuilder {
        self.http
            .get(self.endpoint(SERVER_HISTORY_PATH))
            .query(&[("hours", range.hours())])
    }

    async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|err| RemoteError::InvalidResponse(err.to_string()))
    }
}

impl MetricsTransport for MetricsClient {
    async fn post_client_metric(&self, metric: &ClientMetric) -> Result<(), RemoteError> {
        let response = self.client_metric_request(metric).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        tracing::trace!(metric = %metric.metric, value = ?metric.value, "sent client metric");
        Ok(())
    }

    async fn fetch_server(&self) -> Result<ServerSnapshot, RemoteError> {
        Self::fetch_json(self.server_request()).await
    }

    async fn fetch_history(&self, range: TimeRange) -> Result<HistoryResponse, RemoteError> {
        Self::fetch_json(self.history_request(range)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric() -> ClientMetric {
        ClientMetric {
            client_id: "client_1_abcdefghi".to_string(),
            metric: "download_speed".to_string(),
            value: 20.0.into(),
            timestamp: 1_000,
            player_state: PlayerState::Playing,
            media_id: Some(VideoId::new("mp4/videoplayback.mp4").unwrap()),
            session_duration: 500,
            device_info: DeviceInfo {
                user_agent: "Mozilla/5.0 Mobile".to_string(),
                platform: "linux".to_string(),
                screen_width: 1280,
                screen_height: 720,
                pixel_ratio: 2.0,
            },
        }
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            MetricsClient::new("not a url"),
            Err(RemoteError::InvalidUrl { .. })
        ));
        assert!(matches!(
            MetricsClient::new("mailto:ops@example.com"),
            Err(RemoteError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_endpoints_ignore_trailing_slash() {
        let client = MetricsClient::new("http://localhost:5000/").unwrap();
        let request = client.server_request().build().unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:5000/api/metrics/server");
    }

    #[test]
    fn test_endpoints_keep_base_path() {
        let client = MetricsClient::new("http://example.com/player").unwrap();
        let request = client.server_request().build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://example.com/player/api/metrics/server"
        );
    }

    #[test]
    fn test_history_request_sends_hours() {
        let client = MetricsClient::new("http://localhost:5000").unwrap();
        let request = client.history_request(TimeRange::Week).build().unwrap();
        assert_eq!(request.url().path(), "/api/metrics/server/history");
        assert_eq!(request.url().query(), Some("hours=168"));
    }

    #[test]
    fn test_client_metric_is_posted_as_json() {
        let client = MetricsClient::new("http://localhost:5000").unwrap();
        let request = client.client_metric_request(&metric()).build().unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/api/metrics/client");
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "client_id": "client_1_abcdefghi",
                "metric": "download_speed",
                "value": 20.0,
                "timestamp": 1000,
                "player_state": "playing",
                "media_id": "mp4/videoplayback.mp4",
                "session_duration": 500,
                "device_info": {
                    "user_agent": "Mozilla/5.0 Mobile",
                    "platform": "linux",
                    "screen_width": 1280,
                    "screen_height": 720,
                    "pixel_ratio": 2.0
                }
            })
        );
    }

    #[test]
    fn test_player_error_value_is_sent_as_object() {
        let failure = ClientMetric {
            metric: "player_error".to_string(),
            value: MetricValue::Error(sm_core::PlayerError {
                code: 4,
                message: "MEDIA_ERR_SRC_NOT_SUPPORTED".to_string(),
            }),
            player_state: PlayerState::Error,
            ..metric()
        };

        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(
            json["value"],
            serde_json::json!({"code": 4, "message": "MEDIA_ERR_SRC_NOT_SUPPORTED"})
        );
        assert_eq!(json["player_state"], "error");
    }

    #[test]
    fn test_debug_shows_base_only() {
        let client = MetricsClient::new("http://localhost:5000").unwrap();
        assert_eq!(
            format!("{client:?}"),
            r#"MetricsClient { base: "http://localhost:5000/", .. }"#
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_request_error() {
        // nothing listens on the discard port
        let client =
            MetricsClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let result = client.fetch_server().await;
        assert!(matches!(result, Err(RemoteError::Request(_))));
    }
}
