//! Postcode resolution.
//!
//! [`StaticGeocoder`] resolves postcodes from a built-in centroid table: a full
//! postcode entry resolves exactly, everything else falls back to the longest known
//! prefix centroid with `Approximate` confidence. [`FallbackGeocoder`] composes a
//! primary provider with that table so a slow or broken provider degrades commit
//! validation to an approximate radius check instead of blocking it.

use std::{collections::HashMap, sync::Arc, time::Duration};

use log::warn;

use crate::{
    db_types::Coordinate,
    helpers::outward_prefix,
    traits::{GeocodeConfidence, GeocodedLocation, Geocoder, GeocodingError},
};

/// Berlin-area seed table. Deployments load their own via [`StaticGeocoder::with_entry`].
const BUILTIN_CENTROIDS: [(&str, f64, f64, &str); 8] = [
    ("10", 52.5200, 13.4050, "Berlin Mitte"),
    ("104", 52.5429, 13.3501, "Berlin Moabit"),
    ("105", 52.5323, 13.4246, "Berlin Friedrichshain"),
    ("12", 52.4500, 13.5000, "Berlin Süd-Ost"),
    ("120", 52.4339, 13.5420, "Berlin Treptow"),
    ("13", 52.5700, 13.3500, "Berlin Nord"),
    ("14", 52.4400, 13.2000, "Berlin Süd-West"),
    ("144", 52.4009, 13.0591, "Potsdam"),
];

#[derive(Clone)]
pub struct StaticGeocoder {
    table: Arc<HashMap<String, (Coordinate, String)>>,
}

impl Default for StaticGeocoder {
    fn default() -> Self {
        let table = BUILTIN_CENTROIDS
            .iter()
            .map(|(prefix, lat, lon, name)| (prefix.to_string(), (Coordinate::new(*lat, *lon), name.to_string())))
            .collect();
        Self { table: Arc::new(table) }
    }
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an entry. A full postcode entry yields `Exact` matches; a
    /// prefix entry yields `Approximate` ones.
    pub fn with_entry<S: Into<String>, N: Into<String>>(mut self, key: S, point: Coordinate, area_name: N) -> Self {
        let table = Arc::make_mut(&mut self.table);
        table.insert(key.into(), (point, area_name.into()));
        self
    }
}

impl Geocoder for StaticGeocoder {
    async fn geocode(&self, postcode: &str) -> Result<GeocodedLocation, GeocodingError> {
        let trimmed = postcode.trim();
        // Garbage that doesn't even yield an outward prefix is rejected outright.
        if outward_prefix(trimmed).is_none() {
            return Err(GeocodingError::UnknownPostcode(trimmed.to_string()));
        }
        // Longest known prefix wins; only a full-postcode match counts as exact.
        let mut candidate = trimmed;
        while !candidate.is_empty() {
            if let Some((point, area_name)) = self.table.get(candidate) {
                let confidence = if candidate == trimmed {
                    GeocodeConfidence::Exact
                } else {
                    GeocodeConfidence::Approximate
                };
                return Ok(GeocodedLocation { point: *point, area_name: area_name.clone(), confidence });
            }
            // Trim at a char boundary so multibyte postcodes cannot panic the slice.
            let cut = candidate.char_indices().last().map(|(i, _)| i).unwrap_or(0);
            candidate = &candidate[..cut];
        }
        Err(GeocodingError::UnknownPostcode(trimmed.to_string()))
    }
}

/// Wraps a primary geocoding provider with a timeout and the static centroid
/// fallback.
#[derive(Clone)]
pub struct FallbackGeocoder<G> {
    primary: G,
    timeout: Duration,
    fallback: StaticGeocoder,
}

impl<G: Geocoder> FallbackGeocoder<G> {
    pub fn new(primary: G, timeout: Duration, fallback: StaticGeocoder) -> Self {
        Self { primary, timeout, fallback }
    }
}

impl<G: Geocoder> Geocoder for FallbackGeocoder<G> {
    async fn geocode(&self, postcode: &str) -> Result<GeocodedLocation, GeocodingError> {
        match tokio::time::timeout(self.timeout, self.primary.geocode(postcode)).await {
            Ok(Ok(location)) => Ok(location),
            Ok(Err(GeocodingError::UnknownPostcode(p))) => Err(GeocodingError::UnknownPostcode(p)),
            Ok(Err(e)) => {
                warn!("🌍 Primary geocoder failed for {postcode}: {e}. Falling back to the centroid table.");
                self.fallback.geocode(postcode).await
            },
            Err(_) => {
                warn!("🌍 Primary geocoder timed out for {postcode}. Falling back to the centroid table.");
                self.fallback.geocode(postcode).await
            },
        }
    }
}
