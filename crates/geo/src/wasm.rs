//! WASM bindings for the geo crate.
//!
//! Structured values cross the boundary as JSON strings so the map front end
//! can pass feed records straight through.

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::{
    analyze_incidents, haversine_km, project_events, rank_shelters_by_safety, AnalysisInput,
    DetectionEvent, EngineConfig, GeoPoint, Shelter, Viewport,
};

fn parse<T: DeserializeOwned>(json: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("JSON parse error: {}", e)))
}

fn render<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&format!("JSON serialize error: {}", e)))
}

fn engine_config(config_toml: &str) -> Result<EngineConfig, JsValue> {
    EngineConfig::from_toml_str(config_toml).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Great-circle distance in kilometers.
#[wasm_bindgen]
pub fn distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    haversine_km(&GeoPoint::new(lat1, lng1), &GeoPoint::new(lat2, lng2))
}

/// Projects a chronological list of detections.
///
/// # Arguments
/// * `events_json` - JSON array of detection events
/// * `config_toml` - engine configuration overrides, empty for defaults
///
/// # Returns
/// JSON trajectory with projected heading and speed
#[wasm_bindgen]
pub fn project_track(events_json: &str, config_toml: &str) -> Result<String, JsValue> {
    let events: Vec<DetectionEvent> = parse(events_json)?;
    let config = engine_config(config_toml)?;
    render(&project_events(&events, &config.trajectory))
}

/// Ranks shelters by safety.
///
/// # Returns
/// JSON array of shelter ids, safest first
#[wasm_bindgen]
pub fn rank_shelters(shelters_json: &str, threats_json: &str, top_k: u32) -> Result<String, JsValue> {
    let shelters: Vec<Shelter> = parse(shelters_json)?;
    let threats: Vec<GeoPoint> = parse(threats_json)?;
    let ranked: Vec<&str> = rank_shelters_by_safety(&shelters, &threats, top_k as usize)
        .into_iter()
        .map(|s| s.id.as_str())
        .collect();
    render(&ranked)
}

/// Screen positions for a batch of markers.
///
/// # Arguments
/// * `viewport_json` - viewport state (center, zoom, size, pan offset)
/// * `points_json` - JSON array of `{lat, lng}`
#[wasm_bindgen]
pub fn marker_positions(viewport_json: &str, points_json: &str) -> Result<String, JsValue> {
    let viewport: Viewport = parse(viewport_json)?;
    let points: Vec<GeoPoint> = parse(points_json)?;
    let viewport = viewport.with_zoom(viewport.zoom);
    let positions: Vec<_> = points.iter().map(|p| viewport.marker_screen_position(p)).collect();
    render(&positions)
}

/// Tiles covering the viewport.
#[wasm_bindgen]
pub fn visible_tiles(viewport_json: &str) -> Result<String, JsValue> {
    let viewport: Viewport = parse(viewport_json)?;
    let viewport = viewport.with_zoom(viewport.zoom);
    render(&viewport.visible_tiles())
}

/// Full analysis pass over detections, summaries and shelters.
#[wasm_bindgen]
pub fn analyze(input_json: &str, config_toml: &str) -> Result<String, JsValue> {
    let input: AnalysisInput = parse(input_json)?;
    let config = engine_config(config_toml)?;
    render(&analyze_incidents(&input, &config))
}
