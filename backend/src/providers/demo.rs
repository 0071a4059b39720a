//! Offline providers with deterministic output.
//!
//! Every value is derived from a hash of the query coordinate, so repeated
//! calls with the same input always agree. Used when `DEMO_PROVIDERS` is set
//! and by the `plan_trip` binary.

use async_trait::async_trait;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use shared::{Coordinate, WeatherCondition, WeatherSample};

use super::{
    DirectionsError, DirectionsProvider, DirectionsRoute, PlaceLabel, PoiLookup, ProviderError,
    RawPoi, ReverseGeocoder, WeatherProvider,
};
use crate::geo;

const CITIES: [(&str, &str); 8] = [
    ("Nashville", "TN"),
    ("Memphis", "TN"),
    ("Birmingham", "AL"),
    ("Atlanta", "GA"),
    ("Columbia", "SC"),
    ("Savannah", "GA"),
    ("Knoxville", "TN"),
    ("Little Rock", "AR"),
];
const BRANDS: [&str; 6] = ["Pilot", "Love's", "TA", "Petro", "Service Plaza", "Travel Center"];
const CATEGORIES: [&str; 4] = ["Truck Stop", "Rest Area", "Service Plaza", "Fuel Plaza"];
const CONDITIONS: [WeatherCondition; 5] = [
    WeatherCondition::Clear,
    WeatherCondition::Cloudy,
    WeatherCondition::Fog,
    WeatherCondition::Rain,
    WeatherCondition::Clear,
];
const PRECIPITATION: [f64; 5] = [10.0, 20.0, 35.0, 55.0, 18.0];

/// Road distance is taken as the great-circle distance times this factor.
const ROAD_FACTOR: f64 = 1.2;
const POIS_PER_LOOKUP: u32 = 3;

/// Order-sensitive string hash bounded to `0..100_000`.
pub fn deterministic_seed(text: &str) -> u32 {
    text.to_lowercase()
        .chars()
        .fold(0u32, |hash, ch| (hash * 33 + u32::from(ch)) % 100_000)
}

fn coordinate_seed(at: Coordinate) -> u32 {
    deterministic_seed(&format!("{:.3}|{:.3}", at.lat, at.lon))
}

/// Straight-line directions through a handful of intermediate points.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoDirections;

#[async_trait]
impl DirectionsProvider for DemoDirections {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<DirectionsRoute, DirectionsError> {
        let straight = geo::distance_miles(origin, destination)
            .map_err(|err| DirectionsError::NoRoute(err.to_string()))?;
        if straight <= 0.0 {
            return Err(DirectionsError::NoRoute("ZERO_RESULTS".into()));
        }
        let road_miles = straight * ROAD_FACTOR;
        let meters = (road_miles * 1_609.344).round() as u64;
        let seconds = (road_miles / 55.0 * 3_600.0).round() as u64;

        let steps = 8;
        let polyline = (0..=steps)
            .map(|i| origin.interpolate(destination, f64::from(i) / f64::from(steps)))
            .collect();

        Ok(DirectionsRoute {
            distance_meters: Some(meters),
            duration_seconds: Some(seconds),
            distance_text: format!("{:.0} mi", road_miles),
            duration_text: format!("{:.1} hours", seconds as f64 / 3_600.0),
            start_address: city_label(coordinate_seed(origin)),
            end_address: city_label(coordinate_seed(destination)),
            polyline,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DemoPoiLookup;

#[async_trait]
impl PoiLookup for DemoPoiLookup {
    async fn lookup(
        &self,
        center: Coordinate,
        radius_miles: f64,
    ) -> Result<Vec<RawPoi>, ProviderError> {
        let seed = coordinate_seed(center);
        let (city, state) = CITIES[seed as usize % CITIES.len()];
        let pois = (0..POIS_PER_LOOKUP)
            .map(|i| {
                let salt = deterministic_seed(&format!("{seed}|{i}"));
                let offset_miles = (1.2 + f64::from(i) * 1.4).min(radius_miles);
                // One degree of latitude is about 69 miles.
                let bearing = f64::from(salt % 360).to_radians();
                let dlat = offset_miles / 69.0 * bearing.cos();
                let dlon = offset_miles / 69.0 * bearing.sin() / center.lat.to_radians().cos().max(0.1);
                let coordinate = Coordinate::new(
                    (center.lat + dlat).clamp(-90.0, 90.0),
                    (center.lon + dlon).clamp(-180.0, 180.0),
                );
                let brand = BRANDS[(salt as usize + i as usize) % BRANDS.len()];
                let category = CATEGORIES[(seed as usize + i as usize) % CATEGORIES.len()];
                RawPoi {
                    id: Some(format!("demo-{seed}-{i}")),
                    name: format!("{brand} {city}"),
                    coordinate,
                    category: category.to_string(),
                    address: Some(format!("{} Highway Dr, {city}, {state}", 100 + i * 17)),
                    opening_hours: Some("24/7".to_string()),
                    distance_miles: None,
                }
            })
            .collect();
        Ok(pois)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DemoGeocoder;

#[async_trait]
impl ReverseGeocoder for DemoGeocoder {
    async fn reverse(&self, at: Coordinate) -> Result<PlaceLabel, ProviderError> {
        let label = city_label(coordinate_seed(at));
        Ok(PlaceLabel {
            full_address: format!("{label}, United States"),
            short_label: label,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DemoWeather;

#[async_trait]
impl WeatherProvider for DemoWeather {
    async fn weather_at(
        &self,
        at: Coordinate,
        when: DateTime<Utc>,
    ) -> Result<WeatherSample, ProviderError> {
        let hour = when
            .duration_trunc(TimeDelta::hours(1))
            .map_err(|err| ProviderError::Shape(err.to_string()))?;
        let seed = deterministic_seed(&format!("{}|{}", coordinate_seed(at), hour.timestamp()));
        let slot = seed as usize % CONDITIONS.len();
        let step = slot as f64;
        Ok(WeatherSample {
            at: hour,
            temperature_f: 44.0 + step * 8.0 + ((step + 1.0).sin() * 3.0).round(),
            condition: CONDITIONS[slot],
            precipitation_pct: PRECIPITATION[slot],
            wind_mph: 10.0 + step * 4.0,
        })
    }
}

fn city_label(seed: u32) -> String {
    let (city, state) = CITIES[seed as usize % CITIES.len()];
    format!("{city}, {state}")
}
