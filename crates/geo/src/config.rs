//! Tunable heuristics for the engine.
//!
//! Every section deserializes with defaults, so a TOML file only needs the
//! keys it overrides:
//!
//! ```toml
//! [trajectory]
//! projected_points = 8
//! horizon_scale = 0.5
//!
//! [shelters]
//! top_k = 3
//! ```

use serde::{Deserialize, Serialize};

use crate::{GeoError, Result};

/// Root engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub trajectory: TrajectoryConfig,

    #[serde(default)]
    pub patterns: PatternConfig,

    #[serde(default)]
    pub clustering: ClusterConfig,

    #[serde(default)]
    pub shelters: ShelterConfig,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Example
    /// ```
    /// use uavo_geo::EngineConfig;
    ///
    /// let config = EngineConfig::from_toml_str("[shelters]\ntop_k = 3\n").unwrap();
    /// assert_eq!(config.shelters.top_k, 3);
    /// assert_eq!(config.trajectory.projected_points, 12);
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section for values the algorithms cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.trajectory.validate()?;
        self.patterns.validate()?;
        self.clustering.validate()?;
        self.shelters.validate()
    }
}

fn require(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(GeoError::InvalidConfig(message.to_string()))
    }
}

/// Trajectory extrapolation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryConfig {
    /// Number of most recent segments considered for the turn rate
    #[serde(default = "default_turn_window")]
    pub turn_window: usize,

    /// Absolute bound on the extrapolated turn rate, degrees per km
    #[serde(default = "default_max_turn_rate")]
    pub max_turn_rate_deg_per_km: f64,

    /// Number of synthetic points appended to a track of two or more fixes
    #[serde(default = "default_projected_points")]
    pub projected_points: usize,

    /// Projection distance as a multiple of the observed path length
    #[serde(default = "default_horizon_scale")]
    pub horizon_scale: f64,

    /// Horizon for single-fix projection from a heading/speed hint
    #[serde(default = "default_hint_horizon_minutes")]
    pub hint_horizon_minutes: f64,

    /// Synthetic points for a single-fix projection
    #[serde(default = "default_hint_points")]
    pub hint_points: usize,

    /// Denominator floor for zero-length segments, km
    #[serde(default = "default_min_segment_km")]
    pub min_segment_km: f64,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            turn_window: default_turn_window(),
            max_turn_rate_deg_per_km: default_max_turn_rate(),
            projected_points: default_projected_points(),
            horizon_scale: default_horizon_scale(),
            hint_horizon_minutes: default_hint_horizon_minutes(),
            hint_points: default_hint_points(),
            min_segment_km: default_min_segment_km(),
        }
    }
}

impl TrajectoryConfig {
    fn validate(&self) -> Result<()> {
        require(self.turn_window >= 1, "trajectory.turn_window must be at least 1")?;
        require(
            self.max_turn_rate_deg_per_km.is_finite() && self.max_turn_rate_deg_per_km >= 0.0,
            "trajectory.max_turn_rate_deg_per_km must be a non-negative number",
        )?;
        require(
            self.projected_points >= 1,
            "trajectory.projected_points must be at least 1",
        )?;
        require(
            self.horizon_scale.is_finite() && self.horizon_scale >= 0.0,
            "trajectory.horizon_scale must be a non-negative number",
        )?;
        require(
            self.hint_horizon_minutes.is_finite() && self.hint_horizon_minutes > 0.0,
            "trajectory.hint_horizon_minutes must be positive",
        )?;
        require(self.hint_points >= 1, "trajectory.hint_points must be at least 1")?;
        require(
            self.min_segment_km.is_finite() && self.min_segment_km > 0.0,
            "trajectory.min_segment_km must be positive",
        )
    }
}

fn default_turn_window() -> usize {
    5
}

fn default_max_turn_rate() -> f64 {
    30.0
}

fn default_projected_points() -> usize {
    12
}

fn default_horizon_scale() -> f64 {
    1.0
}

fn default_hint_horizon_minutes() -> f64 {
    30.0
}

fn default_hint_points() -> usize {
    5
}

fn default_min_segment_km() -> f64 {
    1e-6
}

/// Movement pattern thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Tracks with at most this many points are treated as hovering
    #[serde(default = "default_hovering_max_points")]
    pub hovering_max_points: usize,

    /// Speeds below this (km/h) are surveillance
    #[serde(default = "default_surveillance_below_kmh")]
    pub surveillance_below_kmh: f64,

    /// Speeds above this (km/h) are crossing
    #[serde(default = "default_crossing_above_kmh")]
    pub crossing_above_kmh: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            hovering_max_points: default_hovering_max_points(),
            surveillance_below_kmh: default_surveillance_below_kmh(),
            crossing_above_kmh: default_crossing_above_kmh(),
        }
    }
}

impl PatternConfig {
    fn validate(&self) -> Result<()> {
        require(
            self.surveillance_below_kmh.is_finite()
                && self.crossing_above_kmh.is_finite()
                && self.surveillance_below_kmh <= self.crossing_above_kmh,
            "patterns.surveillance_below_kmh must not exceed patterns.crossing_above_kmh",
        )
    }
}

fn default_hovering_max_points() -> usize {
    2
}

fn default_surveillance_below_kmh() -> f64 {
    10.0
}

fn default_crossing_above_kmh() -> f64 {
    50.0
}

/// Proximity clustering of detections without a shared drone id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Maximum distance from a cluster's latest member, km
    #[serde(default = "default_cluster_radius_km")]
    pub cluster_radius_km: f64,

    /// Maximum time since a cluster's latest member, minutes
    #[serde(default = "default_max_gap_minutes")]
    pub max_gap_minutes: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cluster_radius_km: default_cluster_radius_km(),
            max_gap_minutes: default_max_gap_minutes(),
        }
    }
}

impl ClusterConfig {
    fn validate(&self) -> Result<()> {
        require(
            self.cluster_radius_km.is_finite() && self.cluster_radius_km > 0.0,
            "clustering.cluster_radius_km must be positive",
        )?;
        require(
            self.max_gap_minutes.is_finite() && self.max_gap_minutes > 0.0,
            "clustering.max_gap_minutes must be positive",
        )
    }
}

fn default_cluster_radius_km() -> f64 {
    15.0
}

fn default_max_gap_minutes() -> f64 {
    30.0
}

/// Shelter recommendation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelterConfig {
    /// Number of shelters recommended by the safety ranking
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Drop unavailable shelters before ranking
    #[serde(default)]
    pub available_only: bool,
}

impl Default for ShelterConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            available_only: false,
        }
    }
}

impl ShelterConfig {
    fn validate(&self) -> Result<()> {
        require(self.top_k >= 1, "shelters.top_k must be at least 1")
    }
}

fn default_top_k() -> usize {
    5
}
