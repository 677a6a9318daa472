//! Tier assignment, marker sizing, and grouping of markers into layers.

use std::collections::BTreeMap;

use client_map_visit_models::{CityAggregate, Tier};
use serde::Serialize;

/// Records per radius unit.
const RECORDS_PER_RADIUS_UNIT: f64 = 50.0;

/// Smallest marker radius, in pixels.
pub const MIN_RADIUS: f64 = 4.0;

/// Largest marker radius, in pixels.
pub const MAX_RADIUS: f64 = 15.0;

/// Marker radius for a record count: `record_count / 50`, clamped to
/// `[4, 15]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn marker_radius(record_count: u64) -> f64 {
    (record_count as f64 / RECORDS_PER_RADIUS_UNIT).clamp(MIN_RADIUS, MAX_RADIUS)
}

/// Sets `tier` on every aggregate that has coordinates and clears it on
/// those that do not.
pub fn assign_tiers(aggregates: &mut [CityAggregate]) {
    for agg in aggregates {
        agg.tier = agg
            .coordinates
            .map(|_| Tier::from_record_count(agg.record_count));
    }
}

/// One circle marker on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    #[serde(skip)]
    pub city: String,
    #[serde(skip)]
    pub county: Option<String>,
    #[serde(skip)]
    pub tier: Tier,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    pub radius: f64,
    pub color: &'static str,
    /// Popup HTML (already escaped).
    pub popup: String,
}

impl MapMarker {
    /// Builds a marker for an aggregate, or `None` if it has no coordinates.
    #[must_use]
    pub fn from_aggregate(agg: &CityAggregate, region: &str) -> Option<Self> {
        let coords = agg.coordinates?;
        let tier = Tier::from_record_count(agg.record_count);
        Some(Self {
            city: agg.city.clone(),
            county: agg.county.clone(),
            tier,
            latitude: coords.latitude,
            longitude: coords.longitude,
            radius: marker_radius(agg.record_count),
            color: tier.color(),
            popup: popup_html(agg, region),
        })
    }
}

/// Popup label: city, record count, and unique client count.
fn popup_html(agg: &CityAggregate, region: &str) -> String {
    format!(
        "<b>{}, {}</b><br>Records: {}<br>Unique Clients: {}",
        crate::html::escape_html(&agg.city),
        crate::html::escape_html(region),
        agg.record_count,
        agg.unique_client_count,
    )
}

/// A togglable group of markers sharing a tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerGroup {
    #[serde(skip)]
    pub tier: Tier,
    pub name: &'static str,
    pub markers: Vec<MapMarker>,
}

/// All three tier layers plus the number of aggregates left off the map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapLayers {
    /// Layers in [`Tier::ALL`] order. Always three, possibly empty.
    pub layers: Vec<LayerGroup>,
    /// Aggregates without coordinates.
    pub excluded: usize,
}

impl MapLayers {
    /// Partitions aggregates into tier layers.
    ///
    /// Markers within a layer are sorted by city and county, so the result
    /// does not depend on the order of `aggregates`.
    #[must_use]
    pub fn build(aggregates: &[CityAggregate], region: &str) -> Self {
        let mut by_tier: BTreeMap<Tier, Vec<MapMarker>> =
            Tier::ALL.iter().map(|t| (*t, Vec::new())).collect();
        let mut excluded = 0;

        for agg in aggregates {
            match MapMarker::from_aggregate(agg, region) {
                Some(marker) => by_tier.entry(marker.tier).or_default().push(marker),
                None => excluded += 1,
            }
        }

        let layers = Tier::ALL
            .iter()
            .map(|&tier| {
                let mut markers = by_tier.remove(&tier).unwrap_or_default();
                markers.sort_by(|a, b| (&a.city, &a.county).cmp(&(&b.city, &b.county)));
                LayerGroup {
                    tier,
                    name: tier.layer_name(),
                    markers,
                }
            })
            .collect();

        Self { layers, excluded }
    }

    /// Total markers across all layers.
    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.layers.iter().map(|l| l.markers.len()).sum()
    }

    /// Marker count for one tier.
    #[must_use]
    pub fn count(&self, tier: Tier) -> usize {
        self.layer(tier).map_or(0, |l| l.markers.len())
    }

    /// The layer for `tier`.
    #[must_use]
    pub fn layer(&self, tier: Tier) -> Option<&LayerGroup> {
        self.layers.iter().find(|l| l.tier == tier)
    }
}
