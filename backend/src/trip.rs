//! End-to-end trip planning: route fetch, HOS plan, POIs and timeline.

use shared::{Coordinate, PlanTripRequest, PlannedTrip, RouteSummary, TripEndpoint};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{PlannerError, PlannerResult},
    geo::{self, RouteGeometry},
    hos::{self, HosParams, HosPlanner},
    providers::{
        google::google_maps_directions_url, DirectionsProvider, PoiLookup, ReverseGeocoder,
        WeatherProvider,
    },
    sampler::RouteSampler,
    timeline::{TimelineAssembler, TripSpan},
};

/// Borrowed provider set for a single planning pass.
#[derive(Clone, Copy)]
pub struct TripProviders<'a> {
    pub directions: &'a dyn DirectionsProvider,
    pub pois: &'a dyn PoiLookup,
    pub geocoder: &'a dyn ReverseGeocoder,
    pub weather: &'a dyn WeatherProvider,
}

#[derive(Debug, Clone, Default)]
pub struct TripPlanner {
    hos: HosPlanner,
    sampler: RouteSampler,
    timeline: TimelineAssembler,
}

impl TripPlanner {
    pub fn new(hos: HosPlanner, sampler: RouteSampler, timeline: TimelineAssembler) -> Self {
        Self {
            hos,
            sampler,
            timeline,
        }
    }

    /// Plans a trip. The route lookup is all-or-nothing; POI and timeline
    /// enrichment degrade per item.
    pub async fn plan(
        &self,
        request: &PlanTripRequest,
        providers: TripProviders<'_>,
        cancel: &CancellationToken,
    ) -> PlannerResult<PlannedTrip> {
        let origin = geo::ensure_valid(request.origin)?;
        let destination = geo::ensure_valid(request.destination)?;
        let departure = hos::parse_departure(&request.depart_at)?;
        self.hos
            .check_driver_inputs(request.avg_speed_mph, request.drive_hours_available)?;

        if cancel.is_cancelled() {
            return Err(PlannerError::Cancelled);
        }
        let route = tokio::select! {
            _ = cancel.cancelled() => return Err(PlannerError::Cancelled),
            route = providers.directions.route(origin, destination) => route?,
        };

        let meters = route
            .distance_meters
            .filter(|&meters| meters > 0)
            .ok_or_else(|| PlannerError::RouteNotFound("route has no distance".into()))?;
        let total_miles = geo::meters_to_miles(meters as f64);

        let points = if route.polyline.len() >= 2 {
            route.polyline.clone()
        } else {
            vec![origin, destination]
        };
        let geometry = RouteGeometry::new(points)
            .map_err(|err| PlannerError::RouteNotFound(format!("unusable route geometry: {err}")))?;

        let plan = self.hos.plan(&HosParams {
            total_miles,
            departure,
            avg_speed_mph: request.avg_speed_mph,
            drive_hours_available: request.drive_hours_available,
        })?;

        let span = TripSpan {
            total_miles,
            departure: plan.departure,
            arrival: plan.arrival,
        };
        let (points_of_interest, timeline) = tokio::try_join!(
            self.sampler
                .collect(&geometry, total_miles, providers.pois, cancel),
            self.timeline.assemble(
                &geometry,
                &span,
                providers.geocoder,
                providers.weather,
                cancel
            ),
        )?;

        tracing::info!(
            miles = total_miles,
            stops = plan.stops.len(),
            pois = points_of_interest.len(),
            eta = %plan.arrival,
            "trip planned"
        );

        Ok(PlannedTrip {
            origin: TripEndpoint {
                label: endpoint_label(request.origin_label.as_deref(), &route.start_address, origin),
                coordinate: origin,
            },
            destination: TripEndpoint {
                label: endpoint_label(
                    request.destination_label.as_deref(),
                    &route.end_address,
                    destination,
                ),
                coordinate: destination,
            },
            depart_at: plan.departure,
            avg_speed_mph: request.avg_speed_mph,
            summary: RouteSummary {
                miles: total_miles,
                driving_hours: plan.driving_hours,
                eta: plan.arrival,
                start_address: route.start_address,
                end_address: route.end_address,
                google_maps_url: google_maps_directions_url(origin, destination),
            },
            geometry: geometry.points().to_vec(),
            plan,
            points_of_interest,
            timeline,
        })
    }
}

/// Caller label, else the provider's address, else the raw coordinate.
fn endpoint_label(requested: Option<&str>, address: &str, at: Coordinate) -> String {
    match requested.map(str::trim).filter(|label| !label.is_empty()) {
        Some(label) => label.to_string(),
        None if !address.trim().is_empty() => address.trim().to_string(),
        None => format!("{:.5}, {:.5}", at.lat, at.lon),
    }
}
