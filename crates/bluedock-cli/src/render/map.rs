//! Standalone Leaflet map of a search, written as one HTML file.
//!
//! Markers use the Font Awesome icon set through Leaflet.awesome-markers,
//! colored by how useful each station is for the current mode.

use std::path::Path;

use anyhow::Context;
use bluedock_core::{AppError, SearchMode};
use bluedock_services::{NearbyStation, Station};
use serde::Serialize;

use super::format_radius;
use crate::session::SearchOutcome;

pub const DEFAULT_ZOOM: u8 = 14;
pub const METERS_PER_MILE: f64 = 1609.34;

const ZOOM_BY_RADIUS: [(f64, u8); 7] = [
    (0.1, 17),
    (0.25, 16),
    (0.5, 15),
    (0.75, 14),
    (1.0, 14),
    (1.5, 13),
    (2.0, 13),
];

pub fn zoom_for_radius(radius: f64) -> u8 {
    ZOOM_BY_RADIUS
        .iter()
        .find(|(r, _)| (r - radius).abs() < 1e-9)
        .map(|(_, zoom)| *zoom)
        .unwrap_or(DEFAULT_ZOOM)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkerStyle {
    pub color: &'static str,
    pub icon: &'static str,
}

/// Marker for the searched location.
pub fn origin_marker(mode: SearchMode) -> MarkerStyle {
    match mode {
        SearchMode::Pickup => MarkerStyle {
            color: "red",
            icon: "home",
        },
        SearchMode::Dropoff => MarkerStyle {
            color: "blue",
            icon: "flag",
        },
    }
}

pub fn station_marker(mode: SearchMode, station: &Station) -> MarkerStyle {
    let (color, icon) = match mode {
        SearchMode::Pickup => match station.num_bikes_available {
            0 => ("red", "ban"),
            _ if station.num_ebikes_available > 0 => ("green", "bolt"),
            n if n >= 5 => ("blue", "bicycle"),
            _ => ("orange", "bicycle"),
        },
        SearchMode::Dropoff => match station.num_docks_available {
            0 => ("red", "ban"),
            n if n >= 5 => ("green", "home"),
            _ => ("orange", "home"),
        },
    };
    MarkerStyle { color, icon }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn popup_html(mode: SearchMode, nearby: &NearbyStation) -> String {
    let station = &nearby.station;
    let details = match mode {
        SearchMode::Pickup => format!(
            "E-bikes: {}<br>Regular: {}",
            station.num_ebikes_available,
            station.regular_bikes()
        ),
        SearchMode::Dropoff => format!("Free docks: {}", station.num_docks_available),
    };
    format!(
        "<div style=\"width: 180px;\"><b>{}</b><br>Walk: {:.1} mi<br>{}</div>",
        escape_html(&station.name),
        nearby.walking_distance_miles,
        details
    )
}

pub fn tooltip(mode: SearchMode, station: &Station) -> String {
    let name = escape_html(&station.name);
    match mode {
        SearchMode::Pickup => format!("{} | {} bikes", name, station.num_bikes_available),
        SearchMode::Dropoff => format!("{} | {} docks", name, station.num_docks_available),
    }
}

#[derive(Debug, Serialize)]
struct MapMarker {
    lat: f64,
    lon: f64,
    #[serde(flatten)]
    style: MarkerStyle,
    popup: String,
    tooltip: String,
}

#[derive(Debug, Serialize)]
struct MapData {
    center: [f64; 2],
    zoom: u8,
    radius_meters: f64,
    circle_color: &'static str,
    circle_popup: String,
    origin: MapMarker,
    stations: Vec<MapMarker>,
}

fn map_data(outcome: &SearchOutcome) -> MapData {
    let mode = outcome.mode;
    let origin_style = origin_marker(mode);
    let location = &outcome.location;

    MapData {
        center: [location.lat, location.lon],
        zoom: zoom_for_radius(outcome.radius),
        radius_meters: outcome.radius * METERS_PER_MILE,
        circle_color: origin_style.color,
        circle_popup: format!("{} mile radius", format_radius(outcome.radius)),
        origin: MapMarker {
            lat: location.lat,
            lon: location.lon,
            style: origin_style,
            popup: format!("Your Location: {}", escape_html(&outcome.address)),
            tooltip: "Your Location".to_string(),
        },
        stations: outcome
            .result
            .stations
            .iter()
            .filter(|nearby| nearby.station.position().is_valid())
            .map(|nearby| MapMarker {
                lat: nearby.station.lat,
                lon: nearby.station.lon,
                style: station_marker(mode, &nearby.station),
                popup: popup_html(mode, nearby),
                tooltip: tooltip(mode, &nearby.station),
            })
            .collect(),
    }
}

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.2.0/css/all.min.css">
<link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/Leaflet.awesome-markers/2.0.2/leaflet.awesome-markers.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<script src="https://cdnjs.cloudflare.com/ajax/libs/Leaflet.awesome-markers/2.0.2/leaflet.awesome-markers.js"></script>
<style>html, body, #map { height: 100%; margin: 0; }</style>
"#;

const PAGE_SCRIPT: &str = r#"<div id="map"></div>
<script>
const data = JSON.parse(document.getElementById("map-data").textContent);
const map = L.map("map").setView(data.center, data.zoom);
L.tileLayer("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png", {
  maxZoom: 19,
  attribution: "&copy; OpenStreetMap contributors"
}).addTo(map);
function addMarker(m, maxWidth) {
  const icon = L.AwesomeMarkers.icon({ icon: m.icon, markerColor: m.color, prefix: "fa" });
  L.marker([m.lat, m.lon], { icon: icon })
    .bindPopup(m.popup, { maxWidth: maxWidth })
    .bindTooltip(m.tooltip)
    .addTo(map);
}
addMarker(data.origin, 300);
L.circle(data.center, {
  radius: data.radius_meters,
  color: data.circle_color,
  fill: true,
  fillColor: data.circle_color,
  fillOpacity: 0.1,
  opacity: 0.5
}).bindPopup(data.circle_popup).addTo(map);
data.stations.forEach(function (m) { addMarker(m, 200); });
</script>
</body>
</html>
"#;

/// Render the search as a self-contained HTML page.
pub fn render_map(outcome: &SearchOutcome) -> Result<String, AppError> {
    let data = serde_json::to_string(&map_data(outcome)).context("Failed to encode map data")?;
    // Keep "</script>" inside names from closing the data block.
    let data = data.replace('<', "\\u003c");

    Ok(format!(
        "{}<title>{}</title>\n</head>\n<body>\n<script type=\"application/json\" id=\"map-data\">{}</script>\n{}",
        PAGE_HEAD,
        escape_html(&format!("Bluedock: {}", outcome.mode.title())),
        data,
        PAGE_SCRIPT
    ))
}

pub fn write_map(path: &Path, html: &str) -> Result<(), AppError> {
    std::fs::write(path, html)?;
    tracing::info!("Wrote map to {}", path.display());
    Ok(())
}
