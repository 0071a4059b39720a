//! Samples points along a route and gathers nearby POIs at each one.
//!
//! Lookups run concurrently. A lookup that fails or times out contributes no
//! results and does not fail the batch; the merged list is deduplicated and
//! ordered by route progress.

use std::{collections::HashSet, time::Duration};

use futures_util::future::join_all;
use shared::{Coordinate, PointOfInterest};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{PlannerError, PlannerResult},
    geo::{self, RouteGeometry},
    providers::{guarded, PoiLookup, ProviderError, RawPoi},
};

pub const DEFAULT_STEP_MILES: f64 = 120.0;
pub const DEFAULT_RADIUS_MILES: f64 = 15.0;
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub route_mile: f64,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone)]
pub struct RouteSampler {
    step_miles: f64,
    radius_miles: f64,
    lookup_timeout: Duration,
}

impl Default for RouteSampler {
    fn default() -> Self {
        Self {
            step_miles: DEFAULT_STEP_MILES,
            radius_miles: DEFAULT_RADIUS_MILES,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

impl RouteSampler {
    pub fn new(step_miles: f64, radius_miles: f64, lookup_timeout: Duration) -> PlannerResult<Self> {
        if !step_miles.is_finite() || step_miles <= 0.0 {
            return Err(PlannerError::InvalidInput(format!(
                "sample step must be positive, got {step_miles}"
            )));
        }
        if !radius_miles.is_finite() || radius_miles <= 0.0 {
            return Err(PlannerError::InvalidInput(format!(
                "lookup radius must be positive, got {radius_miles}"
            )));
        }
        Ok(Self {
            step_miles,
            radius_miles,
            lookup_timeout,
        })
    }

    /// One sample per marker from [`geo::sample_markers`], positioned on `geometry`.
    pub fn sample_points(
        &self,
        geometry: &RouteGeometry,
        total_miles: f64,
    ) -> PlannerResult<Vec<SamplePoint>> {
        let markers = geo::sample_markers(total_miles, self.step_miles)?;
        Ok(markers
            .into_iter()
            .map(|route_mile| SamplePoint {
                route_mile,
                coordinate: geometry.point_at_route_mile(route_mile, total_miles),
            })
            .collect())
    }

    /// Looks up POIs around every sample point and merges the results.
    pub async fn collect(
        &self,
        geometry: &RouteGeometry,
        total_miles: f64,
        lookup: &dyn PoiLookup,
        cancel: &CancellationToken,
    ) -> PlannerResult<Vec<PointOfInterest>> {
        let samples = self.sample_points(geometry, total_miles)?;
        tracing::debug!(samples = samples.len(), "looking up POIs along route");

        let per_sample = join_all(
            samples
                .iter()
                .map(|sample| self.lookup_sample(*sample, lookup, cancel)),
        )
        .await;

        if cancel.is_cancelled() {
            return Err(PlannerError::Cancelled);
        }
        let merged = merge_results(per_sample);
        tracing::debug!(pois = merged.len(), "merged POI results");
        Ok(merged)
    }

    async fn lookup_sample(
        &self,
        sample: SamplePoint,
        lookup: &dyn PoiLookup,
        cancel: &CancellationToken,
    ) -> Vec<PointOfInterest> {
        let outcome = guarded(
            cancel,
            self.lookup_timeout,
            lookup.lookup(sample.coordinate, self.radius_miles),
        )
        .await;

        match outcome {
            Ok(raw) => tag_results(sample, raw),
            Err(ProviderError::Cancelled) => Vec::new(),
            Err(err) => {
                tracing::warn!(
                    route_mile = sample.route_mile,
                    error = %err,
                    "POI lookup failed; continuing without this sample"
                );
                Vec::new()
            }
        }
    }
}

/// Tags provider results with the sample marker. Entries with unusable
/// coordinates are dropped.
pub fn tag_results(sample: SamplePoint, raw: Vec<RawPoi>) -> Vec<PointOfInterest> {
    raw.into_iter()
        .filter_map(|poi| {
            let distance = match poi.distance_miles {
                Some(miles) if miles.is_finite() && miles >= 0.0 => miles,
                _ => match geo::distance_miles(sample.coordinate, poi.coordinate) {
                    Ok(miles) => miles,
                    Err(err) => {
                        tracing::debug!(name = %poi.name, error = %err, "skipping POI");
                        return None;
                    }
                },
            };
            Some(PointOfInterest {
                id: poi.id,
                name: poi.name,
                coordinate: poi.coordinate,
                category: poi.category,
                address: poi.address,
                opening_hours: poi.opening_hours,
                distance_from_center_miles: distance,
                route_mile: Some(sample.route_mile),
            })
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum DedupKey {
    Id(String),
    Place(String, i64, i64),
}

fn dedup_key(poi: &PointOfInterest) -> DedupKey {
    match &poi.id {
        Some(id) => DedupKey::Id(id.clone()),
        None => DedupKey::Place(
            poi.name.clone(),
            (poi.coordinate.lat * 10_000.0).round() as i64,
            (poi.coordinate.lon * 10_000.0).round() as i64,
        ),
    }
}

/// Flattens per-sample results in sample order, keeps the first occurrence
/// of each POI, then orders by route mile and distance from the sample center.
pub fn merge_results(per_sample: Vec<Vec<PointOfInterest>>) -> Vec<PointOfInterest> {
    let mut seen = HashSet::new();
    let mut merged: Vec<PointOfInterest> = per_sample
        .into_iter()
        .flatten()
        .filter(|poi| seen.insert(dedup_key(poi)))
        .collect();

    merged.sort_by(|a, b| {
        a.route_mile
            .unwrap_or_default()
            .total_cmp(&b.route_mile.unwrap_or_default())
            .then_with(|| {
                a.distance_from_center_miles
                    .total_cmp(&b.distance_from_center_miles)
            })
    });
    merged
}
