use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Key under which clients persist the active trip.
pub const ACTIVE_TRIP_STORAGE_KEY: &str = "rw_active_trip_v2";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn interpolate(self, other: Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Converts fractional hours to a millisecond-precision duration.
pub fn duration_from_hours(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HosStopKind {
    Break,
    OffDutyReset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HosStop {
    pub kind: HosStopKind,
    /// Cumulative route miles driven when the stop begins.
    pub mile: f64,
    pub starts_at: DateTime<FixedOffset>,
    pub duration_hours: f64,
}

impl HosStop {
    pub fn ends_at(&self) -> DateTime<FixedOffset> {
        self.starts_at + duration_from_hours(self.duration_hours)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrivingSegment {
    pub start_mile: f64,
    pub end_mile: f64,
    pub starts_at: DateTime<FixedOffset>,
    pub ends_at: DateTime<FixedOffset>,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HosPlan {
    pub departure: DateTime<FixedOffset>,
    pub arrival: DateTime<FixedOffset>,
    pub stops: Vec<HosStop>,
    pub segments: Vec<DrivingSegment>,
    pub driving_hours: f64,
    pub stop_hours: f64,
}

impl HosPlan {
    pub fn count(&self, kind: HosStopKind) -> usize {
        self.stops.iter().filter(|stop| stop.kind == kind).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub coordinate: Coordinate,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<String>,
    pub distance_from_center_miles: f64,
    /// Route-mile marker of the sample whose lookup found this POI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_mile: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    Snow,
    Storm,
    Unknown,
}

impl WeatherCondition {
    /// Maps a WMO weather interpretation code.
    pub fn from_wmo_code(code: u16) -> Self {
        match code {
            0 | 1 => Self::Clear,
            2 | 3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51..=57 => Self::Drizzle,
            61..=67 | 80..=82 => Self::Rain,
            71..=77 | 85 | 86 => Self::Snow,
            95..=99 => Self::Storm,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub at: DateTime<Utc>,
    pub temperature_f: f64,
    pub condition: WeatherCondition,
    pub precipitation_pct: f64,
    pub wind_mph: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub index: usize,
    pub at: DateTime<FixedOffset>,
    pub route_mile: f64,
    pub coordinate: Coordinate,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSample>,
    #[serde(default)]
    pub anomalies: Vec<String>,
}

/// Body of `GET /api/directions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionsSummary {
    pub distance_text: String,
    pub duration_text: String,
    pub distance_value_meters: Option<u64>,
    pub duration_value_seconds: Option<u64>,
    pub start_address: String,
    pub end_address: String,
    pub google_maps_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTripRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    #[serde(default)]
    pub origin_label: Option<String>,
    #[serde(default)]
    pub destination_label: Option<String>,
    pub depart_at: String,
    #[serde(default = "default_avg_speed_mph")]
    pub avg_speed_mph: f64,
    /// Driving hours left in the current shift at departure.
    #[serde(default)]
    pub drive_hours_available: Option<f64>,
}

pub fn default_avg_speed_mph() -> f64 {
    65.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEndpoint {
    pub label: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub miles: f64,
    pub driving_hours: f64,
    pub eta: DateTime<FixedOffset>,
    pub start_address: String,
    pub end_address: String,
    pub google_maps_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTrip {
    pub origin: TripEndpoint,
    pub destination: TripEndpoint,
    pub depart_at: DateTime<FixedOffset>,
    pub avg_speed_mph: f64,
    pub summary: RouteSummary,
    pub geometry: Vec<Coordinate>,
    pub plan: HosPlan,
    pub points_of_interest: Vec<PointOfInterest>,
    pub timeline: Vec<Checkpoint>,
}

/// The slice of a planned trip a client keeps across page loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTrip {
    pub origin: TripEndpoint,
    pub destination: TripEndpoint,
    pub depart_at: DateTime<FixedOffset>,
    pub summary: RouteSummary,
    pub geometry: Vec<Coordinate>,
    pub eld_plan: Vec<HosStop>,
    pub saved_at: DateTime<Utc>,
}

impl StoredTrip {
    pub fn from_planned(trip: &PlannedTrip, saved_at: DateTime<Utc>) -> Self {
        Self {
            origin: trip.origin.clone(),
            destination: trip.destination.clone(),
            depart_at: trip.depart_at,
            summary: trip.summary.clone(),
            geometry: trip.geometry.clone(),
            eld_plan: trip.plan.stops.clone(),
            saved_at,
        }
    }

    pub fn to_storage_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Returns `None` for malformed payloads or trips missing endpoint labels.
    pub fn from_storage_str(raw: &str) -> Option<Self> {
        let trip: Self = serde_json::from_str(raw).ok()?;
        if trip.origin.label.trim().is_empty() || trip.destination.label.trim().is_empty() {
            return None;
        }
        Some(trip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn departure() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-01T06:00:00Z").unwrap()
    }

    fn sample_trip() -> PlannedTrip {
        let depart_at = departure();
        let arrival = depart_at + Duration::hours(1);
        PlannedTrip {
            origin: TripEndpoint {
                label: "Nashville, TN".into(),
                coordinate: Coordinate::new(36.16, -86.78),
            },
            destination: TripEndpoint {
                label: "Memphis, TN".into(),
                coordinate: Coordinate::new(35.15, -90.05),
            },
            depart_at,
            avg_speed_mph: 50.0,
            summary: RouteSummary {
                miles: 50.0,
                driving_hours: 1.0,
                eta: arrival,
                start_address: String::new(),
                end_address: String::new(),
                google_maps_url: String::new(),
            },
            geometry: vec![Coordinate::new(36.16, -86.78), Coordinate::new(35.15, -90.05)],
            plan: HosPlan {
                departure: depart_at,
                arrival,
                stops: vec![HosStop {
                    kind: HosStopKind::Break,
                    mile: 25.0,
                    starts_at: depart_at,
                    duration_hours: 0.5,
                }],
                segments: Vec::new(),
                driving_hours: 1.0,
                stop_hours: 0.0,
            },
            points_of_interest: Vec::new(),
            timeline: Vec::new(),
        }
    }

    #[test]
    fn interpolate_midpoint() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(10.0, -20.0);
        assert_eq!(a.interpolate(b, 0.5), Coordinate::new(5.0, -10.0));
    }

    #[test]
    fn coordinate_validity_bounds() {
        assert!(Coordinate::new(90.0, -180.0).is_valid());
        assert!(!Coordinate::new(90.1, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 180.5).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn stop_end_time_adds_duration() {
        let stop = HosStop {
            kind: HosStopKind::OffDutyReset,
            mile: 660.0,
            starts_at: departure(),
            duration_hours: 10.0,
        };
        assert_eq!(stop.ends_at(), departure() + Duration::hours(10));
    }

    #[test]
    fn stop_kind_serializes_snake_case() {
        let json = serde_json::to_string(&HosStopKind::OffDutyReset).unwrap();
        assert_eq!(json, "\"off_duty_reset\"");
    }

    #[test]
    fn wmo_codes_map_to_conditions() {
        assert_eq!(WeatherCondition::from_wmo_code(0), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_wmo_code(45), WeatherCondition::Fog);
        assert_eq!(WeatherCondition::from_wmo_code(63), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(75), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_wmo_code(96), WeatherCondition::Storm);
        assert_eq!(WeatherCondition::from_wmo_code(200), WeatherCondition::Unknown);
    }

    #[test]
    fn directions_summary_uses_camel_case() {
        let summary = DirectionsSummary {
            distance_text: "210 mi".into(),
            duration_text: "3 hours".into(),
            distance_value_meters: Some(338_000),
            duration_value_seconds: None,
            start_address: "A".into(),
            end_address: "B".into(),
            google_maps_url: "https://example.test".into(),
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["distanceValueMeters"], 338_000);
        assert!(value["durationValueSeconds"].is_null());
        assert_eq!(value["googleMapsUrl"], "https://example.test");
    }

    #[test]
    fn plan_request_defaults_speed() {
        let req: PlanTripRequest = serde_json::from_str(
            r#"{"origin":{"lat":1.0,"lon":2.0},"destination":{"lat":3.0,"lon":4.0},"depart_at":"2024-01-01T06:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(req.avg_speed_mph, 65.0);
        assert!(req.drive_hours_available.is_none());
    }

    #[test]
    fn stored_trip_survives_storage_round_trip() {
        let trip = sample_trip();
        let stored = StoredTrip::from_planned(&trip, Utc::now());
        let raw = stored.to_storage_string().unwrap();
        let restored = StoredTrip::from_storage_str(&raw).expect("valid trip");
        assert_eq!(restored.eld_plan.len(), 1);
        assert_eq!(restored.summary.eta, trip.summary.eta);
    }

    #[test]
    fn stored_trip_rejects_missing_labels_and_garbage() {
        let mut trip = sample_trip();
        trip.destination.label = "  ".into();
        let raw = StoredTrip::from_planned(&trip, Utc::now())
            .to_storage_string()
            .unwrap();
        assert!(StoredTrip::from_storage_str(&raw).is_none());
        assert!(StoredTrip::from_storage_str("{not json").is_none());
    }
}
