//! Truck-relevant POI lookup against an Overpass API endpoint.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::Coordinate;

use super::{fetch_json, PoiLookup, ProviderError, RawPoi};

pub const OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

const METERS_PER_MILE: f64 = 1_609.344;
const MAX_RESULTS: usize = 60;

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    #[serde(rename = "type")]
    kind: String,
    id: u64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<Center>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Center {
    lat: f64,
    lon: f64,
}

pub struct OverpassPoiLookup {
    client: Client,
    endpoint: String,
}

impl OverpassPoiLookup {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl PoiLookup for OverpassPoiLookup {
    async fn lookup(
        &self,
        center: Coordinate,
        radius_miles: f64,
    ) -> Result<Vec<RawPoi>, ProviderError> {
        let query = build_query(center, radius_miles);
        let request = self.client.post(&self.endpoint).form(&[("data", query)]);
        let body: OverpassResponse = fetch_json(request).await?;
        Ok(convert_elements(body.elements))
    }
}

fn build_query(center: Coordinate, radius_miles: f64) -> String {
    let around = format!(
        "around:{:.0},{},{}",
        radius_miles * METERS_PER_MILE,
        center.lat,
        center.lon
    );
    format!(
        "[out:json][timeout:25];(\
         nwr({around})[\"amenity\"=\"fuel\"][\"hgv\"=\"yes\"];\
         nwr({around})[\"amenity\"=\"truck_stop\"];\
         nwr({around})[\"highway\"=\"rest_area\"];\
         nwr({around})[\"highway\"=\"services\"];\
         );out center tags {MAX_RESULTS};"
    )
}

fn convert_elements(elements: Vec<Element>) -> Vec<RawPoi> {
    elements.into_iter().filter_map(convert_element).collect()
}

fn convert_element(element: Element) -> Option<RawPoi> {
    let coordinate = match (element.lat, element.lon, element.center) {
        (Some(lat), Some(lon), _) => Coordinate::new(lat, lon),
        (_, _, Some(center)) => Coordinate::new(center.lat, center.lon),
        _ => return None,
    };
    let tags = &element.tags;
    let category = category_for(tags);
    let name = tags
        .get("name")
        .or_else(|| tags.get("brand"))
        .cloned()
        .unwrap_or_else(|| category.to_string());

    Some(RawPoi {
        id: Some(format!("osm:{}/{}", element.kind, element.id)),
        name,
        coordinate,
        category: category.to_string(),
        address: address_for(tags),
        opening_hours: tags.get("opening_hours").cloned(),
        distance_miles: None,
    })
}

fn category_for(tags: &HashMap<String, String>) -> &'static str {
    match (
        tags.get("highway").map(String::as_str),
        tags.get("amenity").map(String::as_str),
    ) {
        (Some("rest_area"), _) => "Rest Area",
        (Some("services"), _) => "Service Plaza",
        (_, Some("truck_stop")) => "Truck Stop",
        (_, Some("fuel")) => "Fuel Plaza",
        _ => "Truck Stop",
    }
}

fn address_for(tags: &HashMap<String, String>) -> Option<String> {
    let street = match (tags.get("addr:housenumber"), tags.get("addr:street")) {
        (Some(number), Some(street)) => Some(format!("{number} {street}")),
        (None, Some(street)) => Some(street.clone()),
        _ => None,
    };
    let parts: Vec<String> = [
        street,
        tags.get("addr:city").cloned(),
        tags.get("addr:state").cloned(),
    ]
    .into_iter()
    .flatten()
    .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
