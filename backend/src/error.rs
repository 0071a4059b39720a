use thiserror::Error;

use crate::providers::{DirectionsError, ProviderError};

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(#[from] ProviderError),
    #[error("route not found: {0}")]
    RouteNotFound(String),
    #[error("planner made no progress: {0}")]
    InternalConsistency(String),
    #[error("planning was cancelled")]
    Cancelled,
}

/// Every directions failure aborts planning as a missing route.
impl From<DirectionsError> for PlannerError {
    fn from(err: DirectionsError) -> Self {
        Self::RouteNotFound(err.to_string())
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;
