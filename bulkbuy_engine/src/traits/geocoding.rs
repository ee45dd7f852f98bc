use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeocodeConfidence {
    /// Resolved from the full postcode.
    Exact,
    /// Resolved from the postal-area prefix only (fallback path).
    Approximate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodedLocation {
    pub point: Coordinate,
    pub area_name: String,
    pub confidence: GeocodeConfidence,
}

/// Postcode resolution. Callers enforce a short timeout and fall back to the
/// prefix-based approximation on failure; commit validation is never blocked on a
/// slow provider.
#[allow(async_fn_in_trait)]
pub trait Geocoder: Clone + Send + Sync {
    async fn geocode(&self, postcode: &str) -> Result<GeocodedLocation, GeocodingError>;
}

#[derive(Debug, Clone, Error)]
pub enum GeocodingError {
    #[error("The geocoding provider is unavailable: {0}")]
    Unavailable(String),
    #[error("Unknown postcode: {0}")]
    UnknownPostcode(String),
}
