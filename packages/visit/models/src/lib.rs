#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Client visit types shared across the client map pipeline.
//!
//! [`VisitRecord`] is the raw row read from the record source.
//! [`CityAggregate`] is the per-`(city, county, state)` rollup that flows
//! through geocoding and into rendering. [`Tier`] is the activity bucket that
//! drives marker color and layer grouping.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Minimum `record_count` (exclusive) for a city to be [`Tier::High`].
pub const HIGH_TIER_THRESHOLD: u64 = 500;

/// Minimum `record_count` (inclusive) for a city to be [`Tier::Medium`].
pub const MEDIUM_TIER_THRESHOLD: u64 = 100;

/// A single raw client visit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    /// City name as stored in the source, if any.
    pub city: Option<String>,
    /// County name as stored in the source, if any.
    pub county: Option<String>,
    /// State / region code (e.g., `"NJ"`).
    pub state: String,
    /// Opaque client identifier.
    pub client_id: String,
}

impl VisitRecord {
    /// Returns `true` if this row belongs to `region` (case-insensitive) and
    /// has a city.
    #[must_use]
    pub fn matches_region(&self, region: &str) -> bool {
        self.city.is_some() && self.state.eq_ignore_ascii_case(region)
    }
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Per-`(city, county, state)` rollup of visit rows.
///
/// Coordinates are held as a single optional pair so an aggregate can never
/// carry a latitude without a longitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityAggregate {
    /// City name.
    pub city: String,
    /// County name, `None` when the source row had no county.
    pub county: Option<String>,
    /// State / region code as it appeared in the source rows.
    pub state: String,
    /// Number of visit rows in this group.
    pub record_count: u64,
    /// Number of distinct client ids in this group.
    pub unique_client_count: u64,
    /// Resolved coordinates, merged in from the geocode cache.
    pub coordinates: Option<Coordinates>,
    /// Activity tier, assigned once coordinates are known.
    pub tier: Option<Tier>,
}

impl CityAggregate {
    /// Latitude of the resolved coordinates, if any.
    #[must_use]
    pub fn latitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.latitude)
    }

    /// Longitude of the resolved coordinates, if any.
    #[must_use]
    pub fn longitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.longitude)
    }
}

/// Activity tier for a city, from its `record_count`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Tier {
    /// More than 500 records.
    High,
    /// 100 to 500 records, inclusive.
    Medium,
    /// Fewer than 100 records.
    Low,
}

impl Tier {
    /// All tiers, highest activity first.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Classifies a record count.
    #[must_use]
    pub const fn from_record_count(record_count: u64) -> Self {
        if record_count > HIGH_TIER_THRESHOLD {
            Self::High
        } else if record_count >= MEDIUM_TIER_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Marker color for this tier.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::High => "red",
            Self::Medium => "orange",
            Self::Low => "blue",
        }
    }

    /// Layer name shown in the map's layer control.
    #[must_use]
    pub const fn layer_name(self) -> &'static str {
        match self {
            Self::High => "High Activity (>500)",
            Self::Medium => "Medium Activity (100-500)",
            Self::Low => "Low Activity (<100)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit(city: Option<&str>, state: &str) -> VisitRecord {
        VisitRecord {
            city: city.map(String::from),
            county: None,
            state: state.to_string(),
            client_id: "c1".to_string(),
        }
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(Tier::from_record_count(501), Tier::High);
        assert_eq!(Tier::from_record_count(500), Tier::Medium);
        assert_eq!(Tier::from_record_count(100), Tier::Medium);
        assert_eq!(Tier::from_record_count(99), Tier::Low);
        assert_eq!(Tier::from_record_count(1), Tier::Low);
    }

    #[test]
    fn tier_colors() {
        assert_eq!(Tier::High.color(), "red");
        assert_eq!(Tier::Medium.color(), "orange");
        assert_eq!(Tier::Low.color(), "blue");
    }

    #[test]
    fn tier_round_trips_through_strum() {
        for tier in Tier::ALL {
            let parsed: Tier = tier.as_ref().parse().unwrap();
            assert_eq!(parsed, tier);
        }
    }

    #[test]
    fn region_match_is_case_insensitive() {
        assert!(visit(Some("Newark"), "nj").matches_region("NJ"));
        assert!(visit(Some("Newark"), "Nj").matches_region("NJ"));
        assert!(!visit(Some("Newark"), "NY").matches_region("NJ"));
    }

    #[test]
    fn region_match_requires_city() {
        assert!(!visit(None, "NJ").matches_region("NJ"));
    }

    #[test]
    fn coordinates_are_both_or_neither() {
        let mut agg = CityAggregate {
            city: "Newark".to_string(),
            county: None,
            state: "NJ".to_string(),
            record_count: 1,
            unique_client_count: 1,
            coordinates: None,
            tier: None,
        };
        assert_eq!((agg.latitude(), agg.longitude()), (None, None));

        agg.coordinates = Some(Coordinates::new(40.73, -74.17));
        assert_eq!(agg.latitude(), Some(40.73));
        assert_eq!(agg.longitude(), Some(-74.17));
    }
}
