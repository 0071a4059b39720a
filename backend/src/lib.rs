pub mod config;
pub mod error;
pub mod geo;
pub mod hos;
pub mod providers;
pub mod sampler;
pub mod timeline;
pub mod trip;

use std::{path::PathBuf, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{ApiError, Coordinate, DirectionsSummary, PlanTripRequest, PlannedTrip};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
};

use crate::config::Config;
use crate::error::PlannerError;
use crate::hos::HosPlanner;
use crate::providers::{
    demo::{DemoGeocoder, DemoPoiLookup, DemoWeather},
    google::{google_maps_directions_url, GoogleDirectionsClient},
    nominatim::NominatimGeocoder,
    open_meteo::OpenMeteoWeather,
    overpass::OverpassPoiLookup,
    DirectionsError, DirectionsProvider, HttpProviderConfig, PoiLookup, ReverseGeocoder,
    WeatherProvider,
};
use crate::sampler::RouteSampler;
use crate::timeline::TimelineAssembler;
use crate::trip::{TripPlanner, TripProviders};

pub const MISSING_API_KEY: &str = "Missing GOOGLE_MAPS_API_KEY in backend environment.";

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[derive(Clone)]
pub struct AppState {
    /// `None` when no Google Maps key is configured.
    pub directions: Option<Arc<dyn DirectionsProvider>>,
    pub pois: Arc<dyn PoiLookup>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
    pub weather: Arc<dyn WeatherProvider>,
    pub planner: Arc<TripPlanner>,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let http = HttpProviderConfig::default()
            .with_timeout(config.provider_timeout)
            .with_user_agent(config.user_agent.clone());
        let client = http.build_client()?;

        let directions = config.google_maps_api_key.as_ref().map(|key| {
            Arc::new(GoogleDirectionsClient::new(client.clone(), key.clone()))
                as Arc<dyn DirectionsProvider>
        });
        if directions.is_none() {
            tracing::warn!("GOOGLE_MAPS_API_KEY is not set; directions and trip planning are disabled");
        }

        let (pois, geocoder, weather): (
            Arc<dyn PoiLookup>,
            Arc<dyn ReverseGeocoder>,
            Arc<dyn WeatherProvider>,
        ) = if config.demo_providers {
            tracing::info!("using demo POI, geocoding and weather providers");
            (
                Arc::new(DemoPoiLookup),
                Arc::new(DemoGeocoder),
                Arc::new(DemoWeather),
            )
        } else {
            (
                Arc::new(OverpassPoiLookup::new(client.clone(), &config.overpass_url)),
                Arc::new(NominatimGeocoder::new(client.clone(), &config.nominatim_url)),
                Arc::new(OpenMeteoWeather::new(client, &config.open_meteo_url)),
            )
        };

        let planner = TripPlanner::new(
            HosPlanner::default(),
            RouteSampler::new(
                config.sample_step_miles,
                config.poi_radius_miles,
                config.provider_timeout,
            )?,
            TimelineAssembler::new(config.timeline_checkpoints, config.provider_timeout)?,
        );

        Ok(Self {
            directions,
            pois,
            geocoder,
            weather,
            planner: Arc::new(planner),
            static_dir: config.static_dir.clone(),
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let static_files = ServeDir::new(&state.static_dir)
        .fallback(ServeFile::new(state.static_dir.join("index.html")));

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/directions", get(directions_handler))
        .route("/api/trips/plan", post(plan_trip_handler))
        .fallback_service(static_files)
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "ok": true }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectionsQuery {
    origin_lat: Option<String>,
    origin_lon: Option<String>,
    dest_lat: Option<String>,
    dest_lon: Option<String>,
}

impl DirectionsQuery {
    fn endpoints(&self) -> Option<(Coordinate, Coordinate)> {
        let origin = parse_coordinate(self.origin_lat.as_deref(), self.origin_lon.as_deref())?;
        let destination = parse_coordinate(self.dest_lat.as_deref(), self.dest_lon.as_deref())?;
        Some((origin, destination))
    }
}

fn parse_coordinate(lat: Option<&str>, lon: Option<&str>) -> Option<Coordinate> {
    let lat = lat?.trim().parse().ok()?;
    let lon = lon?.trim().parse().ok()?;
    Some(Coordinate::new(lat, lon)).filter(Coordinate::is_valid)
}

async fn directions_handler(
    State(state): State<AppState>,
    Query(query): Query<DirectionsQuery>,
) -> ApiResult<DirectionsSummary> {
    let directions = state
        .directions
        .as_ref()
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, MISSING_API_KEY))?;
    let (origin, destination) = query
        .endpoints()
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid coordinates."))?;

    let route = directions
        .route(origin, destination)
        .await
        .map_err(directions_error)?;
    tracing::info!(
        distance = %route.distance_text,
        duration = %route.duration_text,
        "directions resolved"
    );

    Ok(Json(DirectionsSummary {
        distance_text: text_or_na(route.distance_text),
        duration_text: text_or_na(route.duration_text),
        distance_value_meters: route.distance_meters.filter(|&v| v > 0),
        duration_value_seconds: route.duration_seconds.filter(|&v| v > 0),
        start_address: route.start_address,
        end_address: route.end_address,
        google_maps_url: google_maps_directions_url(origin, destination),
    }))
}

async fn plan_trip_handler(
    State(state): State<AppState>,
    Json(request): Json<PlanTripRequest>,
) -> ApiResult<PlannedTrip> {
    let directions = state
        .directions
        .as_deref()
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, MISSING_API_KEY))?;

    // Dropping this future (client gone) cancels outstanding lookups.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let providers = TripProviders {
        directions,
        pois: state.pois.as_ref(),
        geocoder: state.geocoder.as_ref(),
        weather: state.weather.as_ref(),
    };
    let trip = state
        .planner
        .plan(&request, providers, &cancel)
        .await
        .map_err(planner_error)?;
    Ok(Json(trip))
}

fn text_or_na(text: String) -> String {
    if text.trim().is_empty() {
        "n/a".to_string()
    } else {
        text
    }
}

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: message.into(),
        }),
    )
}

fn directions_error(err: DirectionsError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        DirectionsError::NoRoute(_) | DirectionsError::MissingLeg => StatusCode::NOT_FOUND,
        DirectionsError::Upstream(_) => StatusCode::BAD_GATEWAY,
        DirectionsError::Unreachable(_) | DirectionsError::Malformed(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    tracing::warn!(status = status.as_u16(), error = %err, "directions request failed");
    api_error(status, err.to_string())
}

fn planner_error(err: PlannerError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        PlannerError::InvalidInput(_) | PlannerError::InvalidCoordinate { .. } => {
            StatusCode::BAD_REQUEST
        }
        PlannerError::RouteNotFound(_) => StatusCode::NOT_FOUND,
        PlannerError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PlannerError::InternalConsistency(_) | PlannerError::Cancelled => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "trip planning failed");
    } else {
        tracing::info!(error = %err, "trip request rejected");
    }
    api_error(status, err.to_string())
}
