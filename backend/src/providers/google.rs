//! Google Directions API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::Coordinate;

use super::{DirectionsError, DirectionsProvider, DirectionsRoute};

pub const GOOGLE_DIRECTIONS_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

/// Shareable Google Maps link for a driving route.
pub fn google_maps_directions_url(origin: Coordinate, destination: Coordinate) -> String {
    format!(
        "https://www.google.com/maps/dir/?api=1&origin={},{}&destination={},{}&travelmode=driving",
        origin.lat, origin.lon, destination.lat, destination.lon
    )
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    routes: Vec<RouteDto>,
}

#[derive(Debug, Deserialize)]
struct RouteDto {
    #[serde(default)]
    legs: Vec<LegDto>,
}

#[derive(Debug, Deserialize)]
struct LegDto {
    distance: Option<TextValue>,
    duration: Option<TextValue>,
    #[serde(default)]
    start_address: String,
    #[serde(default)]
    end_address: String,
    start_location: Option<LatLng>,
    end_location: Option<LatLng>,
    #[serde(default)]
    steps: Vec<StepDto>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    #[serde(default)]
    text: String,
    value: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl From<LatLng> for Coordinate {
    fn from(value: LatLng) -> Self {
        Coordinate::new(value.lat, value.lng)
    }
}

#[derive(Debug, Deserialize)]
struct StepDto {
    end_location: LatLng,
}

pub struct GoogleDirectionsClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleDirectionsClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: GOOGLE_DIRECTIONS_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl DirectionsProvider for GoogleDirectionsClient {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<DirectionsRoute, DirectionsError> {
        let origin_param = format!("{},{}", origin.lat, origin.lon);
        let destination_param = format!("{},{}", destination.lat, destination.lon);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("origin", origin_param.as_str()),
                ("destination", destination_param.as_str()),
                ("mode", "driving"),
                ("alternatives", "false"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(DirectionsError::Unreachable)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "directions provider returned an error");
            return Err(DirectionsError::Upstream(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(DirectionsError::Unreachable)?;
        let body: DirectionsResponse = serde_json::from_slice(&bytes)
            .map_err(|err| DirectionsError::Malformed(err.to_string()))?;
        convert_response(body)
    }
}

fn convert_response(body: DirectionsResponse) -> Result<DirectionsRoute, DirectionsError> {
    if body.status != "OK" || body.routes.is_empty() {
        let status = if body.status.is_empty() {
            "UNKNOWN".to_string()
        } else {
            body.status
        };
        return Err(DirectionsError::NoRoute(status));
    }
    let leg = body
        .routes
        .into_iter()
        .next()
        .and_then(|route| route.legs.into_iter().next())
        .ok_or(DirectionsError::MissingLeg)?;

    let mut polyline = Vec::with_capacity(leg.steps.len() + 2);
    if let Some(start) = leg.start_location {
        polyline.push(Coordinate::from(start));
    }
    polyline.extend(leg.steps.iter().map(|step| Coordinate::from(step.end_location)));
    if leg.steps.is_empty() {
        if let Some(end) = leg.end_location {
            polyline.push(Coordinate::from(end));
        }
    }

    let (distance_text, distance_meters) = split_text_value(leg.distance);
    let (duration_text, duration_seconds) = split_text_value(leg.duration);

    Ok(DirectionsRoute {
        distance_meters,
        duration_seconds,
        distance_text,
        duration_text,
        start_address: leg.start_address,
        end_address: leg.end_address,
        polyline,
    })
}

fn split_text_value(value: Option<TextValue>) -> (String, Option<u64>) {
    match value {
        Some(TextValue { text, value }) => (text, value),
        None => (String::new(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<DirectionsRoute, DirectionsError> {
        convert_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn converts_first_leg() {
        let route = parse(
            r#"{
                "status": "OK",
                "routes": [{
                    "legs": [{
                        "distance": {"text": "212 mi", "value": 341180},
                        "duration": {"text": "3 hours 10 mins", "value": 11400},
                        "start_address": "Memphis, TN, USA",
                        "end_address": "Nashville, TN, USA",
                        "start_location": {"lat": 35.1495, "lng": -90.049},
                        "end_location": {"lat": 36.1627, "lng": -86.7816},
                        "steps": [
                            {"end_location": {"lat": 35.5, "lng": -89.0}},
                            {"end_location": {"lat": 36.1627, "lng": -86.7816}}
                        ]
                    }]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(route.distance_meters, Some(341_180));
        assert_eq!(route.duration_seconds, Some(11_400));
        assert_eq!(route.distance_text, "212 mi");
        assert_eq!(route.start_address, "Memphis, TN, USA");
        assert_eq!(route.polyline.len(), 3);
        assert_eq!(route.polyline[0], Coordinate::new(35.1495, -90.049));
        assert_eq!(route.polyline[2], Coordinate::new(36.1627, -86.7816));
    }

    #[test]
    fn leg_without_steps_uses_endpoints() {
        let route = parse(
            r#"{"status":"OK","routes":[{"legs":[{
                "start_location": {"lat": 1.0, "lng": 2.0},
                "end_location": {"lat": 3.0, "lng": 4.0}
            }]}]}"#,
        )
        .unwrap();
        assert_eq!(
            route.polyline,
            vec![Coordinate::new(1.0, 2.0), Coordinate::new(3.0, 4.0)]
        );
        assert_eq!(route.distance_meters, None);
        assert_eq!(route.distance_text, "");
    }

    #[test]
    fn non_ok_status_is_no_route() {
        let err = parse(r#"{"status":"ZERO_RESULTS","routes":[]}"#).unwrap_err();
        assert!(matches!(err, DirectionsError::NoRoute(ref s) if s == "ZERO_RESULTS"));
        assert_eq!(err.to_string(), "No route found: ZERO_RESULTS");
    }

    #[test]
    fn missing_status_reads_as_unknown() {
        let err = parse(r#"{"routes":[]}"#).unwrap_err();
        assert_eq!(err.to_string(), "No route found: UNKNOWN");
    }

    #[test]
    fn route_without_legs_is_missing_leg() {
        let err = parse(r#"{"status":"OK","routes":[{"legs":[]}]}"#).unwrap_err();
        assert!(matches!(err, DirectionsError::MissingLeg));
    }

    mod http {
        use std::collections::HashMap;

        use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
        use serde_json::{json, Value};

        use super::*;
        use crate::providers::test_support::{client, closed_port, serve};

        const MEMPHIS: Coordinate = Coordinate::new(35.1495, -90.049);
        const NASHVILLE: Coordinate = Coordinate::new(36.1627, -86.7816);

        async fn directions(
            Query(params): Query<HashMap<String, String>>,
        ) -> Result<Json<Value>, StatusCode> {
            let expected = [
                ("origin", "35.1495,-90.049"),
                ("destination", "36.1627,-86.7816"),
                ("mode", "driving"),
                ("alternatives", "false"),
                ("key", "test-key"),
            ];
            if !expected
                .iter()
                .all(|(key, value)| params.get(*key).map(String::as_str) == Some(*value))
            {
                return Err(StatusCode::BAD_REQUEST);
            }
            Ok(Json(json!({
                "status": "OK",
                "routes": [{"legs": [{
                    "distance": {"text": "212 mi", "value": 341180},
                    "duration": {"text": "3 hours 10 mins", "value": 11400},
                    "start_address": "Memphis, TN, USA",
                    "end_address": "Nashville, TN, USA",
                    "start_location": {"lat": 35.1495, "lng": -90.049},
                    "steps": [{"end_location": {"lat": 36.1627, "lng": -86.7816}}]
                }]}]
            })))
        }

        async fn client_for(router: Router) -> GoogleDirectionsClient {
            let base = serve(router).await;
            GoogleDirectionsClient::new(client(), "test-key").with_base_url(format!("{base}/json"))
        }

        #[tokio::test]
        async fn route_sends_query_and_decodes_leg() {
            let google = client_for(Router::new().route("/json", get(directions))).await;
            let route = google.route(MEMPHIS, NASHVILLE).await.unwrap();
            assert_eq!(route.distance_meters, Some(341_180));
            assert_eq!(route.duration_text, "3 hours 10 mins");
            assert_eq!(route.end_address, "Nashville, TN, USA");
            assert_eq!(route.polyline, vec![MEMPHIS, NASHVILLE]);
        }

        #[tokio::test]
        async fn error_status_is_upstream() {
            let google = client_for(
                Router::new().route("/json", get(|| async { StatusCode::SERVICE_UNAVAILABLE })),
            )
            .await;
            let err = google.route(MEMPHIS, NASHVILLE).await.unwrap_err();
            assert!(matches!(err, DirectionsError::Upstream(503)));
        }

        #[tokio::test]
        async fn non_json_body_is_malformed() {
            let google = client_for(
                Router::new().route("/json", get(|| async { "<html>maintenance</html>" })),
            )
            .await;
            let err = google.route(MEMPHIS, NASHVILLE).await.unwrap_err();
            assert!(matches!(err, DirectionsError::Malformed(_)));
        }

        #[tokio::test]
        async fn zero_results_body_is_no_route() {
            let google = client_for(Router::new().route(
                "/json",
                get(|| async { Json(json!({"status": "ZERO_RESULTS", "routes": []})) }),
            ))
            .await;
            let err = google.route(MEMPHIS, NASHVILLE).await.unwrap_err();
            assert!(matches!(err, DirectionsError::NoRoute(ref s) if s == "ZERO_RESULTS"));
        }

        #[tokio::test]
        async fn refused_connection_is_unreachable() {
            let base = closed_port().await;
            let google = GoogleDirectionsClient::new(client(), "test-key").with_base_url(base);
            let err = google.route(MEMPHIS, NASHVILLE).await.unwrap_err();
            assert!(matches!(err, DirectionsError::Unreachable(_)));
        }
    }

    #[test]
    fn maps_url_format() {
        let url = google_maps_directions_url(
            Coordinate::new(35.1495, -90.049),
            Coordinate::new(36.1627, -86.7816),
        );
        assert_eq!(
            url,
            "https://www.google.com/maps/dir/?api=1&origin=35.1495,-90.049&destination=36.1627,-86.7816&travelmode=driving"
        );
    }
}
