//! Self-contained Leaflet HTML document.
//!
//! Marker data is embedded as JSON in an inline script; Leaflet itself is
//! loaded from a CDN, so the file can be opened directly in a browser with
//! no server.

use std::fmt::Write as _;

use serde::Serialize;

use crate::RenderError;
use crate::layers::{LayerGroup, MapLayers};

const LEAFLET_VERSION: &str = "1.9.4";

/// CartoDB Positron basemap tiles.
pub const DEFAULT_TILE_URL: &str = "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png";

/// Attribution required by the CartoDB Positron tiles.
pub const DEFAULT_TILE_ATTRIBUTION: &str = "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors &copy; <a href=\"https://carto.com/attributions\">CARTO</a>";

/// Initial view and basemap of the rendered map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    /// Document title.
    #[serde(skip)]
    pub title: String,
    /// Initial center latitude.
    pub center_latitude: f64,
    /// Initial center longitude.
    pub center_longitude: f64,
    /// Initial zoom level.
    pub zoom: u8,
    /// Tile URL template.
    pub tile_url: String,
    /// Tile attribution HTML.
    pub tile_attribution: String,
}

#[derive(Serialize)]
struct Document<'a> {
    view: &'a MapView,
    layers: &'a [LayerGroup],
}

/// Escapes text for inclusion in HTML element content or attributes.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serializes `value` as JSON that is safe inside an inline `<script>`.
fn script_json<T: Serialize>(value: &T) -> Result<String, RenderError> {
    let json = serde_json::to_string(value)?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

/// Renders the full HTML document.
///
/// # Errors
///
/// Returns [`RenderError::Serialize`] if the marker data cannot be encoded.
pub fn render_html(layers: &MapLayers, view: &MapView) -> Result<String, RenderError> {
    let data = script_json(&Document {
        view,
        layers: &layers.layers,
    })?;

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("<meta charset=\"utf-8\" />\n");
    html.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\" />\n",
    );
    let _ = writeln!(html, "<title>{}</title>", escape_html(&view.title));
    let _ = writeln!(
        html,
        "<link rel=\"stylesheet\" href=\"https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.css\" />"
    );
    let _ = writeln!(
        html,
        "<script src=\"https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.js\"></script>"
    );
    html.push_str("<style>html, body, #map { height: 100%; margin: 0; }</style>\n");
    html.push_str("</head>\n<body>\n<div id=\"map\"></div>\n<script>\n");
    let _ = writeln!(html, "const data = {data};");
    html.push_str(MAP_SCRIPT);
    html.push_str("</script>\n</body>\n</html>\n");

    Ok(html)
}

const MAP_SCRIPT: &str = r"const map = L.map('map').setView(
  [data.view.center_latitude, data.view.center_longitude],
  data.view.zoom
);
L.tileLayer(data.view.tile_url, {
  attribution: data.view.tile_attribution,
  subdomains: 'abcd',
  maxZoom: 20
}).addTo(map);
const overlays = {};
for (const layer of data.layers) {
  const group = L.layerGroup();
  for (const m of layer.markers) {
    L.circleMarker([m.lat, m.lon], {
      radius: m.radius,
      color: m.color,
      fill: true,
      fillColor: m.color,
      fillOpacity: 0.6
    }).bindPopup(m.popup).addTo(group);
  }
  group.addTo(map);
  overlays[layer.name] = group;
}
L.control.layers(null, overlays, { collapsed: false }).addTo(map);
";
