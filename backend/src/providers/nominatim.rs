//! Reverse geocoding against a Nominatim endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::Coordinate;

use super::{fetch_json, PlaceLabel, ProviderError, ReverseGeocoder};

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    address: Option<Address>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    county: Option<String>,
    state: Option<String>,
}

impl Address {
    fn locality(&self) -> Option<&str> {
        self.city
            .as_deref()
            .or(self.town.as_deref())
            .or(self.village.as_deref())
            .or(self.hamlet.as_deref())
            .or(self.county.as_deref())
    }
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, at: Coordinate) -> Result<PlaceLabel, ProviderError> {
        let url = format!("{}/reverse", self.base_url.trim_end_matches('/'));
        let request = self.client.get(url).query(&[
            ("format", "jsonv2".to_string()),
            ("lat", at.lat.to_string()),
            ("lon", at.lon.to_string()),
            ("zoom", "10".to_string()),
        ]);
        let body: ReverseResponse = fetch_json(request).await?;
        convert_response(body)
    }
}

fn convert_response(body: ReverseResponse) -> Result<PlaceLabel, ProviderError> {
    if let Some(error) = body.error {
        tracing::debug!(%error, "reverse geocoder returned no place");
        return Err(ProviderError::Empty);
    }
    let full_address = body.display_name.ok_or(ProviderError::Empty)?;
    let address = body.address.unwrap_or_default();

    let short_label = match (address.locality(), address.state.as_deref()) {
        (Some(locality), Some(state)) => format!("{locality}, {state}"),
        (Some(locality), None) => locality.to_string(),
        (None, Some(state)) => state.to_string(),
        (None, None) => full_address
            .split(',')
            .take(2)
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(", "),
    };

    Ok(PlaceLabel {
        short_label,
        full_address,
    })
}
