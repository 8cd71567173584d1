//! Location maps: a GeoJSON feature collection and a Leaflet page

use serde::Serialize;
use serde_json::{Value, json};

use crate::analysis::alerts::heat_temperature;
use crate::models::{Location, Variable, WeatherRecord};
use crate::{Result, WeatherError};

const LEAFLET_VERSION: &str = "1.9.4";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapArtifact {
    pub geojson: Value,
    pub html: String,
}

/// Marker colour for a temperature in °C
#[must_use]
pub fn temperature_color(temperature: Option<f64>) -> &'static str {
    match temperature {
        None => "#9e9e9e",
        Some(t) if t < 15.0 => "#2c7bb6",
        Some(t) if t < 25.0 => "#abd9e9",
        Some(t) if t < 30.0 => "#fdae61",
        Some(t) if t < 35.0 => "#f46d43",
        Some(_) => "#d7191c",
    }
}

fn latest_for<'a>(location: &Location, records: &'a [WeatherRecord]) -> Option<&'a WeatherRecord> {
    let id = location.id();
    records
        .iter()
        .filter(|r| r.location.id() == id)
        .max_by_key(|r| r.timestamp)
}

fn feature(location: &Location, latest: Option<&WeatherRecord>) -> Value {
    let temperature = latest.and_then(heat_temperature);
    let mut popup = format!("<b>{}</b>", escape_html(&location.display_name()));
    if let Some(record) = latest {
        for variable in [
            Variable::Temperature,
            Variable::TemperatureMax,
            Variable::Humidity,
            Variable::Precipitation,
            Variable::WindSpeed,
        ] {
            if record.values.contains_key(&variable) {
                popup.push_str(&format!(
                    "<br>{}: {}",
                    variable.label(),
                    record.format_value(variable)
                ));
            }
        }
    }

    json!({
        "type": "Feature",
        "geometry": {
            "type": "Point",
            "coordinates": [location.longitude, location.latitude],
        },
        "properties": {
            "name": location.display_name(),
            "country": location.country,
            "temperature": temperature,
            "color": temperature_color(temperature),
            "observed_at": latest.map(|r| r.timestamp.to_rfc3339()),
            "popup": popup,
        },
    })
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Plot each location with its most recent record from `records`
pub fn render_map(locations: &[Location], records: &[WeatherRecord]) -> Result<MapArtifact> {
    if locations.is_empty() {
        return Err(WeatherError::empty_series("no locations to map"));
    }

    let features: Vec<Value> = locations
        .iter()
        .map(|location| feature(location, latest_for(location, records)))
        .collect();
    let geojson = json!({
        "type": "FeatureCollection",
        "features": features,
    });

    let n = locations.len() as f64;
    let center_lat = locations.iter().map(|l| l.latitude).sum::<f64>() / n;
    let center_lon = locations.iter().map(|l| l.longitude).sum::<f64>() / n;
    let zoom = if locations.len() == 1 { 10 } else { 6 };

    // keep the payload from closing the script element
    let data = serde_json::to_string(&geojson)
        .map_err(|e| WeatherError::render(format!("map encoding failed: {e}")))?
        .replace("</", "<\\/");

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>weatherdash map</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.js"></script>
<style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
const data = {data};
const map = L.map('map').setView([{center_lat}, {center_lon}], {zoom});
L.tileLayer('https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
  attribution: '&copy; OpenStreetMap contributors'
}}).addTo(map);
L.geoJSON(data, {{
  pointToLayer: (feature, latlng) => L.circleMarker(latlng, {{
    radius: 10,
    color: feature.properties.color,
    fillColor: feature.properties.color,
    fillOpacity: 0.8
  }}),
  onEachFeature: (feature, layer) => layer.bindPopup(feature.properties.popup)
}}).addTo(map);
</script>
</body>
</html>
"#
    );

    Ok(MapArtifact { geojson, html })
}
