//! Sensor detections and normalisation of raw feed values.
//!
//! Upstream feeds report sensor, source and classification as free-form,
//! upper-case strings ("RADAR", "radar_tracking_v2", "DRONE"). The `from_feed`
//! constructors fold them into the closed enums the engine works with, and
//! deserialization goes through them so raw feed records parse as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::GeoPoint;

/// Kind of sensor that produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SensorType {
    Microphone,
    Camera,
    Radar,
    Visual,
    Manual,
}

impl SensorType {
    /// Maps a raw feed value; unknown values are treated as manual reports.
    pub fn from_feed(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "microphone" | "acoustic" => SensorType::Microphone,
            "camera" | "optical" => SensorType::Camera,
            "radar" | "electromagnetic" => SensorType::Radar,
            "visual" => SensorType::Visual,
            _ => SensorType::Manual,
        }
    }

    /// Marker colour for detections from this sensor.
    pub fn color_hex(self) -> &'static str {
        match self {
            SensorType::Microphone => "#8b5cf6",
            SensorType::Camera => "#10b981",
            SensorType::Radar => "#3b82f6",
            SensorType::Visual | SensorType::Manual => "#f59e0b",
        }
    }
}

impl From<String> for SensorType {
    fn from(raw: String) -> Self {
        Self::from_feed(&raw)
    }
}

/// Physical channel a detection came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum DetectionSource {
    Acoustic,
    Optical,
    Electromagnetic,
    Human,
}

impl DetectionSource {
    /// Maps a raw source tag such as `radar_tracking_v2` by substring.
    pub fn from_feed(raw: &str) -> Self {
        let normalized = raw.to_lowercase();
        if normalized.contains("radar") || normalized.contains("electromagnetic") {
            DetectionSource::Electromagnetic
        } else if normalized.contains("acoustic") || normalized.contains("microphone") {
            DetectionSource::Acoustic
        } else if normalized.contains("optical") || normalized.contains("camera") {
            DetectionSource::Optical
        } else {
            DetectionSource::Human
        }
    }
}

impl From<String> for DetectionSource {
    fn from(raw: String) -> Self {
        Self::from_feed(&raw)
    }
}

/// Confidence class assigned by the upstream classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Classification {
    Confirmed,
    Probable,
    Possible,
    Unknown,
}

impl Classification {
    pub fn from_feed(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "drone" | "confirmed" => Classification::Confirmed,
            "probable" | "likely" => Classification::Probable,
            "possible" | "suspected" => Classification::Possible,
            _ => Classification::Unknown,
        }
    }
}

impl From<String> for Classification {
    fn from(raw: String) -> Self {
        Self::from_feed(&raw)
    }
}

/// One sensor observation. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    pub id: String,
    pub timestamp_utc: DateTime<Utc>,
    pub position: GeoPoint,
    pub sensor_type: SensorType,
    /// Detector confidence in `[0, 1]`
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    /// Heading in degrees, `[0, 360)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_source: Option<DetectionSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// Tracker-assigned identity, shared by detections of the same object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_strength_dbm: Option<f64>,
}

impl DetectionEvent {
    /// Creates a detection with only the mandatory fields set.
    pub fn new(
        id: impl Into<String>,
        timestamp_utc: DateTime<Utc>,
        position: GeoPoint,
        sensor_type: SensorType,
        confidence: f64,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp_utc,
            position,
            sensor_type,
            confidence,
            altitude_m: None,
            speed_mps: None,
            heading_deg: None,
            detection_source: None,
            classification: None,
            drone_id: None,
            signal_strength_dbm: None,
        }
    }

    /// Attaches a reported heading and ground speed.
    pub fn with_motion(mut self, heading_deg: f64, speed_mps: f64) -> Self {
        self.heading_deg = Some(heading_deg);
        self.speed_mps = Some(speed_mps);
        self
    }

    /// Attaches a tracker identity.
    pub fn with_drone_id(mut self, drone_id: impl Into<String>) -> Self {
        self.drone_id = Some(drone_id.into());
        self
    }

    /// Reported speed converted to km/h.
    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed_mps.map(|mps| mps * 3.6)
    }
}
