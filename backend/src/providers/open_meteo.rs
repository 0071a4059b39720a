//! Hourly forecasts from Open-Meteo, in Fahrenheit and mph.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use shared::{Coordinate, WeatherCondition, WeatherSample};

use super::{fetch_json, ProviderError, WeatherProvider};

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com";

const HOURLY_FIELDS: &str = "temperature_2m,weather_code,precipitation_probability,wind_speed_10m";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: Hourly,
}

#[derive(Debug, Deserialize)]
struct Hourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    weather_code: Vec<Option<u16>>,
    precipitation_probability: Vec<Option<f64>>,
    wind_speed_10m: Vec<Option<f64>>,
}

pub struct OpenMeteoWeather {
    client: Client,
    base_url: String,
}

impl OpenMeteoWeather {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoWeather {
    async fn weather_at(
        &self,
        at: Coordinate,
        when: DateTime<Utc>,
    ) -> Result<WeatherSample, ProviderError> {
        let url = format!("{}/v1/forecast", self.base_url.trim_end_matches('/'));
        let day = when.date_naive().format("%Y-%m-%d").to_string();
        let request = self.client.get(url).query(&[
            ("latitude", at.lat.to_string()),
            ("longitude", at.lon.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("temperature_unit", "fahrenheit".to_string()),
            ("wind_speed_unit", "mph".to_string()),
            ("timezone", "UTC".to_string()),
            ("start_date", day.clone()),
            ("end_date", day),
        ]);
        let body: ForecastResponse = fetch_json(request).await?;
        closest_sample(&body.hourly, when)
    }
}

fn closest_sample(hourly: &Hourly, when: DateTime<Utc>) -> Result<WeatherSample, ProviderError> {
    let len = hourly.time.len();
    if hourly.temperature_2m.len() != len
        || hourly.weather_code.len() != len
        || hourly.precipitation_probability.len() != len
        || hourly.wind_speed_10m.len() != len
    {
        return Err(ProviderError::Shape(
            "hourly arrays have mismatched lengths".into(),
        ));
    }

    let mut best: Option<(usize, DateTime<Utc>, i64)> = None;
    for (idx, raw) in hourly.time.iter().enumerate() {
        let at = NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
            .map_err(|err| ProviderError::Shape(format!("bad hourly time '{raw}': {err}")))?
            .and_utc();
        let gap = (at - when).num_seconds().abs();
        if best.map_or(true, |(_, _, best_gap)| gap < best_gap) {
            best = Some((idx, at, gap));
        }
    }
    let (idx, at, _) = best.ok_or(ProviderError::Empty)?;

    let temperature_f = hourly.temperature_2m[idx]
        .ok_or_else(|| ProviderError::Shape("missing temperature".into()))?;
    let condition = hourly.weather_code[idx]
        .map(WeatherCondition::from_wmo_code)
        .unwrap_or(WeatherCondition::Unknown);

    Ok(WeatherSample {
        at,
        temperature_f,
        condition,
        precipitation_pct: hourly.precipitation_probability[idx].unwrap_or(0.0),
        wind_mph: hourly.wind_speed_10m[idx].unwrap_or(0.0),
    })
}
