#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! City geocoding for the client map.
//!
//! Resolves free-text `"<city>, <region>"` queries to coordinates through
//! the public Nominatim / `OpenStreetMap` service, which allows at most one
//! request per second.
//!
//! The request itself ([`Geocoder`]) and the pacing between requests
//! ([`rate_limit::MinIntervalGate`]) are separate so the pacing can be
//! driven by a manual clock in tests.

pub mod nominatim;
pub mod rate_limit;

use async_trait::async_trait;
use client_map_visit_models::Coordinates;
use thiserror::Error;

/// A geocoding result with coordinates and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// The matched/canonical address returned by the geocoder.
    pub matched_address: Option<String>,
}

impl GeocodedAddress {
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed (includes timeouts and connection errors).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an unexpected status code.
    #[error("Unexpected HTTP status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,
}

/// Resolves one free-text query to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Geocodes `query`, returning `Ok(None)` when the service has no match.
    ///
    /// Implementations issue exactly one request per call; pacing is the
    /// caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request or response parsing fails.
    async fn geocode(&self, query: &str) -> Result<Option<GeocodedAddress>, GeocodeError>;
}

/// Builds the free-text query for a city: `"<city>, <region>"`.
#[must_use]
pub fn city_query(city: &str, region: &str) -> String {
    format!("{city}, {region}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_city_query() {
        assert_eq!(city_query("Newark", "NJ"), "Newark, NJ");
        assert_eq!(city_query("Cape May Court House", "NJ"), "Cape May Court House, NJ");
    }
}
