use shared::Coordinate;

use crate::error::{PlannerError, PlannerResult};

const EARTH_RADIUS_KM: f64 = 6_371.0;
const KM_PER_MILE: f64 = 1.609_344;
const MARKER_EPSILON_MILES: f64 = 1e-9;

pub fn km_to_miles(km: f64) -> f64 {
    km / KM_PER_MILE
}

pub fn meters_to_miles(meters: f64) -> f64 {
    km_to_miles(meters / 1000.0)
}

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Great-circle distance in miles.
pub fn distance_miles(a: Coordinate, b: Coordinate) -> PlannerResult<f64> {
    ensure_valid(a)?;
    ensure_valid(b)?;
    Ok(km_to_miles(haversine_km(a, b)))
}

pub fn ensure_valid(coord: Coordinate) -> PlannerResult<Coordinate> {
    if coord.is_valid() {
        Ok(coord)
    } else {
        Err(PlannerError::InvalidCoordinate {
            lat: coord.lat,
            lon: coord.lon,
        })
    }
}

/// Validated, immutable route polyline in travel order.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGeometry {
    points: Vec<Coordinate>,
    /// `cumulative[i]` is the distance in miles from the first point to `points[i]`.
    cumulative: Vec<f64>,
}

impl RouteGeometry {
    pub fn new(points: Vec<Coordinate>) -> PlannerResult<Self> {
        if points.is_empty() {
            return Err(PlannerError::InvalidInput(
                "route geometry needs at least one point".into(),
            ));
        }
        for point in &points {
            ensure_valid(*point)?;
        }

        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        cumulative.push(total);
        for pair in points.windows(2) {
            total += km_to_miles(haversine_km(pair[0], pair[1]));
            cumulative.push(total);
        }

        Ok(Self { points, cumulative })
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn first(&self) -> Coordinate {
        self.points[0]
    }

    pub fn last(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }

    pub fn length_miles(&self) -> f64 {
        self.cumulative[self.cumulative.len() - 1]
    }

    /// Maps a road-distance marker onto this polyline's own length so that
    /// `total_miles` lands on the last point.
    pub fn point_at_route_mile(&self, route_mile: f64, total_miles: f64) -> Coordinate {
        let length = self.length_miles();
        if total_miles > 0.0 && length > 0.0 {
            point_at_distance(self, route_mile * length / total_miles)
        } else {
            point_at_distance(self, route_mile)
        }
    }
}

/// Point where the cumulative distance along `geometry` first reaches
/// `target_miles`, interpolated linearly in lat/lon and clamped to the ends.
pub fn point_at_distance(geometry: &RouteGeometry, target_miles: f64) -> Coordinate {
    if target_miles.is_nan() || target_miles <= 0.0 {
        return geometry.first();
    }
    if target_miles >= geometry.length_miles() {
        return geometry.last();
    }

    // First index whose cumulative distance reaches the target; always >= 1 here.
    let idx = geometry
        .cumulative
        .partition_point(|&miles| miles < target_miles);
    let start = geometry.points[idx - 1];
    let end = geometry.points[idx];
    let segment_start = geometry.cumulative[idx - 1];
    let segment_len = geometry.cumulative[idx] - segment_start;
    if segment_len <= 0.0 {
        return end;
    }
    start.interpolate(end, (target_miles - segment_start) / segment_len)
}

/// `0, step, 2*step, ..., total`, with `total` present exactly once as the last marker.
pub fn sample_markers(total_miles: f64, step_miles: f64) -> PlannerResult<Vec<f64>> {
    if !total_miles.is_finite() || total_miles < 0.0 {
        return Err(PlannerError::InvalidInput(format!(
            "total distance must be a non-negative number, got {total_miles}"
        )));
    }
    if !step_miles.is_finite() || step_miles <= 0.0 {
        return Err(PlannerError::InvalidInput(format!(
            "sample step must be positive, got {step_miles}"
        )));
    }

    let interior = ((total_miles - MARKER_EPSILON_MILES) / step_miles).ceil().max(1.0) as u64;
    let mut markers = vec![0.0];
    markers.extend(
        (1..interior)
            .map(|k| k as f64 * step_miles)
            .take_while(|&marker| marker < total_miles - MARKER_EPSILON_MILES),
    );
    if total_miles > 0.0 {
        markers.push(total_miles);
    }
    Ok(markers)
}
