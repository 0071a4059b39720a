//! External collaborators of the planner.
//!
//! Each provider is an async trait so the planning core can run against
//! HTTP services in production and deterministic fixtures in tests. Response
//! bodies are decoded into typed schemas; a body that does not match its
//! schema is reported as [`ProviderError::Shape`].

pub mod demo;
pub mod google;
pub mod nominatim;
pub mod open_meteo;
pub mod overpass;
#[cfg(test)]
pub(crate) mod test_support;

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{Coordinate, WeatherSample};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default user agent for outbound requests.
pub const DEFAULT_USER_AGENT: &str = "roadwatch/0.1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected response shape: {0}")]
    Shape(String),
    #[error("no result for the requested location")]
    Empty,
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("request cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum DirectionsError {
    #[error("Directions request failed: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("Directions provider error: {0}")]
    Upstream(u16),
    #[error("No route found: {0}")]
    NoRoute(String),
    #[error("No route leg found.")]
    MissingLeg,
    #[error("Directions request failed: {0}")]
    Malformed(String),
}

/// A single driving route between two coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsRoute {
    pub distance_meters: Option<u64>,
    pub duration_seconds: Option<u64>,
    pub distance_text: String,
    pub duration_text: String,
    pub start_address: String,
    pub end_address: String,
    /// Travel-ordered coordinates from origin to destination.
    pub polyline: Vec<Coordinate>,
}

/// A POI as a lookup provider returns it, before route tagging.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoi {
    pub id: Option<String>,
    pub name: String,
    pub coordinate: Coordinate,
    pub category: String,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    /// Distance from the query center when the provider reports one.
    pub distance_miles: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceLabel {
    /// Short display label, e.g. `"Memphis, Tennessee"`.
    pub short_label: String,
    pub full_address: String,
}

#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<DirectionsRoute, DirectionsError>;
}

#[async_trait]
pub trait PoiLookup: Send + Sync {
    /// POIs within `radius_miles` of `center`, in no particular order.
    async fn lookup(&self, center: Coordinate, radius_miles: f64)
        -> Result<Vec<RawPoi>, ProviderError>;
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, at: Coordinate) -> Result<PlaceLabel, ProviderError>;
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// The hourly sample closest to `when`.
    async fn weather_at(
        &self,
        at: Coordinate,
        when: DateTime<Utc>,
    ) -> Result<WeatherSample, ProviderError>;
}

/// Configuration shared by the HTTP-backed providers.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpProviderConfig {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build_client(&self) -> Result<Client, ProviderError> {
        Ok(Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .build()?)
    }
}

/// Sends `request` and decodes a successful JSON body into `T`.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            url: response.url().to_string(),
            status: status.as_u16(),
        });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ProviderError::Shape(err.to_string()))
}

/// Runs a provider call bounded by `timeout`, abandoning it when `cancel` fires.
pub async fn guarded<T, F>(
    cancel: &CancellationToken,
    timeout: Duration,
    call: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    if cancel.is_cancelled() {
        return Err(ProviderError::Cancelled);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        outcome = tokio::time::timeout(timeout, call) => {
            outcome.unwrap_or(Err(ProviderError::Timeout(timeout)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_pattern() {
        let config = HttpProviderConfig::default()
            .with_timeout(Duration::from_secs(3))
            .with_user_agent("test-agent/1.0");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.user_agent, "test-agent/1.0");
        assert!(config.build_client().is_ok());
    }

    #[tokio::test]
    async fn guarded_passes_through_results() {
        let cancel = CancellationToken::new();
        let value = guarded(&cancel, Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(value.unwrap(), 7);
    }

    #[tokio::test]
    async fn guarded_times_out_slow_calls() {
        let cancel = CancellationToken::new();
        let outcome: Result<(), _> = guarded(&cancel, Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(outcome, Err(ProviderError::Timeout(_))));
    }

    #[tokio::test]
    async fn guarded_skips_work_once_cancelled() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let polled = AtomicBool::new(false);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome: Result<(), _> = guarded(&cancel, Duration::from_secs(1), async {
            polled.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert!(matches!(outcome, Err(ProviderError::Cancelled)));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[derive(Debug, serde::Deserialize)]
    struct Health {
        ok: bool,
    }

    async fn health_server() -> String {
        use axum::{http::StatusCode, routing::get, Json, Router};

        test_support::serve(
            Router::new()
                .route("/ok", get(|| async { Json(serde_json::json!({"ok": true})) }))
                .route("/wrong", get(|| async { Json(serde_json::json!({"ok": "yes"})) }))
                .route("/down", get(|| async { StatusCode::BAD_GATEWAY })),
        )
        .await
    }

    #[tokio::test]
    async fn fetch_json_decodes_success_bodies() {
        let base = health_server().await;
        let client = test_support::client();
        let health: Health = fetch_json(client.get(format!("{base}/ok"))).await.unwrap();
        assert!(health.ok);
    }

    #[tokio::test]
    async fn fetch_json_reports_error_status_with_url() {
        let base = health_server().await;
        let client = test_support::client();
        let err = fetch_json::<Health>(client.get(format!("{base}/down")))
            .await
            .unwrap_err();
        match err {
            ProviderError::Status { url, status } => {
                assert_eq!(status, 502);
                assert!(url.ends_with("/down"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_json_reports_schema_mismatch_as_shape() {
        let base = health_server().await;
        let client = test_support::client();
        let err = fetch_json::<Health>(client.get(format!("{base}/wrong")))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Shape(_)));

        let err = fetch_json::<Health>(client.get(format!("{base}/missing")))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 404, .. }));
    }
}
