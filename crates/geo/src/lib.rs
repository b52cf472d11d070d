//! Geospatial analysis engine for UAVO aerial-object sightings.
//!
//! This crate provides:
//! - Web Mercator projection between coordinates, world pixels, tiles and a pannable viewport
//! - Geodesic primitives (Haversine distance, bearings, destination points)
//! - Trajectory extrapolation from a short history of observed positions
//! - Incident clustering, movement-pattern labels and risk normalisation
//! - Shelter safety ranking and evacuation zone/route geometry
//! - Batch processing with optional parallelism
//! - WASM bindings for browser usage
//!
//! Every engine function is a pure transform over its arguments. Malformed
//! numeric input degrades to an empty or neutral result instead of failing.
//!
//! # Example
//!
//! ```
//! use uavo_geo::{haversine_km, GeoPoint};
//!
//! let bialystok = GeoPoint::new(53.1325, 23.1688);
//! let warsaw = GeoPoint::new(52.2297, 21.0122);
//!
//! let distance_km = haversine_km(&bialystok, &warsaw);
//! assert!((distance_km - 176.0).abs() < 5.0);
//! ```

mod error;
mod geodesic;
pub mod batch;
pub mod config;
pub mod detection;
pub mod incident;
pub mod projection;
pub mod shelter;
pub mod trajectory;

#[cfg(feature = "wasm")]
mod wasm;

pub use batch::{analyze_incidents, AnalysisInput, AnalysisReport, IncidentAnalysis};
pub use config::EngineConfig;
pub use detection::{Classification, DetectionEvent, DetectionSource, SensorType};
pub use error::{GeoError, GeoErrorCode, Result};
pub use geodesic::{
    bearing_delta, destination_point, haversine_km, haversine_m, initial_bearing_deg,
    normalize_bearing, planar_distance_sq, EARTH_RADIUS_KM, EARTH_RADIUS_M,
};
pub use incident::{
    centroid, classify_pattern, cluster_detections, evacuation_targeting_order,
    ClusteredIncident, MovementPattern, RiskLevel, ThreatSummary,
};
pub use projection::{to_lat_lng, to_tile, to_world_pixel, PixelPoint, Tile, Viewport};
pub use shelter::{
    build_evacuation_zone, build_route, nearest_shelter, rank_shelters_by_safety, recommend_shelters,
    resolve_order,
    score_shelters, EvacuationOrder, EvacuationPlan, EvacuationRoute, EvacuationZone, Shelter,
    ShelterScore, ShelterType,
};
pub use trajectory::{project_events, project_trajectory, MotionHint, ProjectedTrajectory, TrajectoryPoint};

/// A geographic coordinate with latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
    /// Longitude in degrees (-180 to 180)
    pub lng: f64,
}

impl GeoPoint {
    /// Creates a new point without validation.
    ///
    /// # Arguments
    /// * `lat` - Latitude in degrees (-90 to 90)
    /// * `lng` - Longitude in degrees (-180 to 180)
    #[inline]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Creates a point, rejecting non-finite or out-of-range values.
    pub fn try_new(lat: f64, lng: f64) -> Result<Self> {
        let point = Self::new(lat, lng);
        if point.is_valid() {
            Ok(point)
        } else {
            Err(GeoError::InvalidCoordinate(format!("({lat}, {lng})")))
        }
    }

    /// Returns true if the point is finite and within the WGS84 ranges.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Converts degrees to radians for internal calculations.
    #[inline]
    pub(crate) fn to_radians(self) -> (f64, f64) {
        (self.lat.to_radians(), self.lng.to_radians())
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self::new(lat, lng)
    }
}
