#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tiered map rendering for the client map.
//!
//! Aggregates with coordinates become circle markers, colored and grouped by
//! activity [`Tier`](client_map_visit_models::Tier) into three layers that
//! can be toggled independently. The result is one self-contained HTML
//! document. Aggregates without coordinates are left off the map and
//! counted.

pub mod html;
pub mod layers;

use client_map_visit_models::CityAggregate;

pub use html::MapView;
pub use layers::MapLayers;

/// Errors from rendering the map.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Marker data could not be serialized.
    #[error("Failed to serialize map data: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A rendered map: its marker layers and the HTML document.
#[derive(Debug, Clone)]
pub struct RenderedMap {
    /// Markers grouped by tier.
    pub layers: MapLayers,
    /// The complete HTML document.
    pub html: String,
}

/// Builds the marker layers for `aggregates` and renders the HTML document.
///
/// A map with no markers is still a complete document.
///
/// # Errors
///
/// Returns [`RenderError`] if the marker data cannot be serialized.
pub fn render_map(
    aggregates: &[CityAggregate],
    region: &str,
    view: &MapView,
) -> Result<RenderedMap, RenderError> {
    let layers = MapLayers::build(aggregates, region);
    if layers.excluded > 0 {
        log::info!(
            "{} aggregates have no coordinates and are left off the map",
            layers.excluded
        );
    }
    if layers.marker_count() == 0 {
        log::warn!("No aggregates have coordinates; rendering an empty map");
    }

    let html = html::render_html(&layers, view)?;
    Ok(RenderedMap { layers, html })
}

#[cfg(test)]
mod tests {
    use client_map_visit_models::{Coordinates, Tier};

    use super::*;

    fn view() -> MapView {
        MapView {
            title: "Clients".to_string(),
            center_latitude: 40.0583,
            center_longitude: -74.4057,
            zoom: 8,
            tile_url: html::DEFAULT_TILE_URL.to_string(),
            tile_attribution: html::DEFAULT_TILE_ATTRIBUTION.to_string(),
        }
    }

    #[test]
    fn renders_only_located_aggregates() {
        let aggs = vec![
            CityAggregate {
                city: "Newark".to_string(),
                county: None,
                state: "NJ".to_string(),
                record_count: 700,
                unique_client_count: 300,
                coordinates: Some(Coordinates::new(40.73, -74.17)),
                tier: None,
            },
            CityAggregate {
                city: "Nowhere".to_string(),
                county: None,
                state: "NJ".to_string(),
                record_count: 5,
                unique_client_count: 5,
                coordinates: None,
                tier: None,
            },
        ];

        let map = render_map(&aggs, "NJ", &view()).unwrap();
        assert_eq!(map.layers.count(Tier::High), 1);
        assert_eq!(map.layers.excluded, 1);
        assert!(map.html.contains("Newark, NJ"));
        assert!(!map.html.contains("Nowhere"));
    }

    #[test]
    fn renders_empty_map() {
        let map = render_map(&[], "NJ", &view()).unwrap();
        assert_eq!(map.layers.marker_count(), 0);
        assert!(map.html.ends_with("</html>\n"));
    }
}
