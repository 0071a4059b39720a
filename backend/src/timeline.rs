//! Evenly spaced checkpoints between departure and arrival, labelled by
//! reverse geocoding and annotated with forecast weather.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use futures_util::future::join_all;
use shared::{Checkpoint, WeatherCondition, WeatherSample};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{PlannerError, PlannerResult},
    geo::RouteGeometry,
    providers::{guarded, ProviderError, ReverseGeocoder, WeatherProvider},
};

pub const DEFAULT_CHECKPOINTS: usize = 5;
pub const DEFAULT_ENRICH_TIMEOUT: Duration = Duration::from_secs(10);

const STRONG_WIND_MPH: f64 = 25.0;
const FREEZING_F: f64 = 32.0;
const ICE_PRECIP_PCT: f64 = 20.0;
const HEAVY_RAIN_PCT: f64 = 50.0;

/// Time and distance span covered by the timeline.
#[derive(Debug, Clone, Copy)]
pub struct TripSpan {
    pub total_miles: f64,
    pub departure: DateTime<FixedOffset>,
    pub arrival: DateTime<FixedOffset>,
}

#[derive(Debug, Clone)]
pub struct TimelineAssembler {
    checkpoints: usize,
    enrich_timeout: Duration,
}

impl Default for TimelineAssembler {
    fn default() -> Self {
        Self {
            checkpoints: DEFAULT_CHECKPOINTS,
            enrich_timeout: DEFAULT_ENRICH_TIMEOUT,
        }
    }
}

impl TimelineAssembler {
    pub fn new(checkpoints: usize, enrich_timeout: Duration) -> PlannerResult<Self> {
        if checkpoints < 2 {
            return Err(PlannerError::InvalidInput(format!(
                "timeline needs at least 2 checkpoints, got {checkpoints}"
            )));
        }
        Ok(Self {
            checkpoints,
            enrich_timeout,
        })
    }

    /// Checkpoint `i` of `n` sits at fraction `i / (n - 1)` of both the
    /// elapsed time and the route distance.
    pub fn skeleton(
        &self,
        geometry: &RouteGeometry,
        span: &TripSpan,
    ) -> PlannerResult<Vec<Checkpoint>> {
        if !span.total_miles.is_finite() || span.total_miles < 0.0 {
            return Err(PlannerError::InvalidInput(format!(
                "total distance must be non-negative, got {}",
                span.total_miles
            )));
        }
        if span.arrival < span.departure {
            return Err(PlannerError::InvalidInput(
                "arrival precedes departure".into(),
            ));
        }

        let elapsed_ms = (span.arrival - span.departure).num_milliseconds() as f64;
        let last = (self.checkpoints - 1) as f64;
        Ok((0..self.checkpoints)
            .map(|index| {
                let fraction = index as f64 / last;
                let route_mile = span.total_miles * fraction;
                let at = if index == self.checkpoints - 1 {
                    span.arrival
                } else {
                    span.departure
                        + chrono::Duration::milliseconds((elapsed_ms * fraction).round() as i64)
                };
                Checkpoint {
                    index,
                    at,
                    route_mile,
                    coordinate: geometry.point_at_route_mile(route_mile, span.total_miles),
                    label: fallback_label(route_mile),
                    full_address: None,
                    weather: None,
                    anomalies: Vec::new(),
                }
            })
            .collect())
    }

    /// Builds the skeleton and enriches every checkpoint concurrently.
    /// Enrichment failures leave the fallback label and no weather.
    pub async fn assemble(
        &self,
        geometry: &RouteGeometry,
        span: &TripSpan,
        geocoder: &dyn ReverseGeocoder,
        weather: &dyn WeatherProvider,
        cancel: &CancellationToken,
    ) -> PlannerResult<Vec<Checkpoint>> {
        let skeleton = self.skeleton(geometry, span)?;
        let checkpoints = join_all(
            skeleton
                .into_iter()
                .map(|checkpoint| self.enrich(checkpoint, geocoder, weather, cancel)),
        )
        .await;

        if cancel.is_cancelled() {
            return Err(PlannerError::Cancelled);
        }
        Ok(checkpoints)
    }

    async fn enrich(
        &self,
        mut checkpoint: Checkpoint,
        geocoder: &dyn ReverseGeocoder,
        weather: &dyn WeatherProvider,
        cancel: &CancellationToken,
    ) -> Checkpoint {
        let when = checkpoint.at.with_timezone(&Utc);
        let (place, forecast) = tokio::join!(
            guarded(cancel, self.enrich_timeout, geocoder.reverse(checkpoint.coordinate)),
            guarded(
                cancel,
                self.enrich_timeout,
                weather.weather_at(checkpoint.coordinate, when)
            ),
        );

        match place {
            Ok(place) => {
                checkpoint.label = place.short_label;
                checkpoint.full_address = Some(place.full_address);
            }
            Err(err) => log_enrichment_failure(checkpoint.index, "reverse geocode", &err),
        }
        match forecast {
            Ok(sample) => {
                checkpoint.anomalies = weather_anomalies(&sample);
                checkpoint.weather = Some(sample);
            }
            Err(err) => log_enrichment_failure(checkpoint.index, "weather", &err),
        }
        checkpoint
    }
}

fn log_enrichment_failure(index: usize, what: &str, err: &ProviderError) {
    if !matches!(err, ProviderError::Cancelled) {
        tracing::warn!(checkpoint = index, error = %err, "{what} failed; using fallback");
    }
}

pub fn fallback_label(route_mile: f64) -> String {
    format!("Mile {}", route_mile.round() as i64)
}

/// Human-readable hazards for a forecast sample, in a fixed order.
pub fn weather_anomalies(sample: &WeatherSample) -> Vec<String> {
    let mut anomalies = Vec::new();
    if sample.wind_mph >= STRONG_WIND_MPH {
        anomalies.push("Strong wind: 25+ mph".to_string());
    }
    if sample.condition == WeatherCondition::Fog {
        anomalies.push("Low visibility / fog risk".to_string());
    }
    if sample.temperature_f <= FREEZING_F && sample.precipitation_pct > ICE_PRECIP_PCT {
        anomalies.push("Possible ice risk (freezing + precipitation)".to_string());
    }
    if sample.condition == WeatherCondition::Rain && sample.precipitation_pct >= HEAVY_RAIN_PCT {
        anomalies.push("Heavy rain risk".to_string());
    }
    anomalies
}
