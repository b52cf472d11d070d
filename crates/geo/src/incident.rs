//! Incident aggregation, movement patterns and risk levels.
//!
//! Risk is assessed upstream; the engine only folds the upstream severity
//! score into [`RiskLevel`] and uses it for rendering keys and for the order
//! in which incidents are offered for evacuation targeting.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ClusterConfig, EngineConfig, PatternConfig};
use crate::geodesic::haversine_km;
use crate::trajectory::{project_events, project_trajectory, ProjectedTrajectory, TrajectoryPoint};
use crate::{DetectionEvent, GeoPoint};

/// How a tracked object moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementPattern {
    Crossing,
    Hovering,
    Surveillance,
    Transit,
}

/// Four-level risk scale, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Maps an upstream severity score: `0 → low`, `1 → medium`, `2 → high`,
    /// `3+ → critical`. Negative scores count as low.
    pub fn from_severity(severity: i64) -> Self {
        match severity {
            i64::MIN..=0 => RiskLevel::Low,
            1 => RiskLevel::Medium,
            2 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// Marker and zone colour.
    pub fn color_hex(self) -> &'static str {
        match self {
            RiskLevel::Critical => "#dc2626",
            RiskLevel::High => "#ea580c",
            RiskLevel::Medium => "#f59e0b",
            RiskLevel::Low => "#84cc16",
        }
    }

    /// Icon identifier for the presentation layer.
    pub fn icon_key(self) -> &'static str {
        match self {
            RiskLevel::Critical => "siren",
            RiskLevel::High => "alert-triangle",
            RiskLevel::Medium => "alert-circle",
            RiskLevel::Low => "info",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels a track by its length and speed.
///
/// Short tracks (`≤ hovering_max_points` fixes) hover; otherwise slow tracks
/// are surveillance, fast ones crossing, everything else transit.
///
/// # Example
/// ```
/// use uavo_geo::config::PatternConfig;
/// use uavo_geo::{classify_pattern, MovementPattern};
///
/// let cfg = PatternConfig::default();
/// assert_eq!(classify_pattern(2, 120.0, &cfg), MovementPattern::Hovering);
/// assert_eq!(classify_pattern(4, 5.0, &cfg), MovementPattern::Surveillance);
/// assert_eq!(classify_pattern(4, 30.0, &cfg), MovementPattern::Transit);
/// assert_eq!(classify_pattern(4, 80.0, &cfg), MovementPattern::Crossing);
/// ```
pub fn classify_pattern(point_count: usize, speed_kmh: f64, config: &PatternConfig) -> MovementPattern {
    if point_count <= config.hovering_max_points {
        MovementPattern::Hovering
    } else if speed_kmh < config.surveillance_below_kmh {
        MovementPattern::Surveillance
    } else if speed_kmh > config.crossing_above_kmh {
        MovementPattern::Crossing
    } else {
        MovementPattern::Transit
    }
}

/// Arithmetic mean of the valid points, or `None` if there are none.
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    let (count, lat_sum, lng_sum) = points
        .iter()
        .filter(|p| p.is_valid())
        .fold((0usize, 0.0, 0.0), |(n, lat, lng), p| (n + 1, lat + p.lat, lng + p.lng));

    if count == 0 {
        return None;
    }
    Some(GeoPoint::new(lat_sum / count as f64, lng_sum / count as f64))
}

/// Upstream incident summary: a set of points with a severity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<String>,
    pub timestamp_utc: DateTime<Utc>,
    pub points: Vec<GeoPoint>,
    pub severity: i64,
    #[serde(default)]
    pub description: String,
}

/// Detections believed to come from one tracked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteredIncident {
    pub id: String,
    pub centroid: GeoPoint,
    pub member_events: Vec<DetectionEvent>,
    pub pattern: MovementPattern,
    pub risk_level: RiskLevel,
    pub trajectory: Vec<TrajectoryPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projected_heading_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_speed_kmh: Option<f64>,
}

impl ClusteredIncident {
    /// Builds an incident from its member detections.
    ///
    /// Members are ordered by timestamp before the trajectory is projected.
    /// Returns `None` if no member has a valid position.
    pub fn from_events(
        id: impl Into<String>,
        events: &[DetectionEvent],
        severity: i64,
        config: &EngineConfig,
    ) -> Option<Self> {
        let mut members: Vec<DetectionEvent> =
            events.iter().filter(|e| e.position.is_valid()).cloned().collect();
        if members.len() < events.len() {
            tracing::debug!(
                dropped = events.len() - members.len(),
                "ignoring detections with invalid positions"
            );
        }
        members.sort_by_key(|e| e.timestamp_utc);

        let positions: Vec<GeoPoint> = members.iter().map(|e| e.position).collect();
        let centroid = centroid(&positions)?;
        let projection = project_events(&members, &config.trajectory);

        Some(Self::assemble(
            id.into(),
            centroid,
            members,
            RiskLevel::from_severity(severity),
            projection,
            &config.patterns,
        ))
    }

    /// Builds an incident from an upstream summary.
    ///
    /// Summary points carry no individual timestamps, so the projection is
    /// purely geometric and no speed is reported.
    pub fn from_summary(
        id: impl Into<String>,
        summary: &ThreatSummary,
        config: &EngineConfig,
    ) -> Option<Self> {
        let centroid = centroid(&summary.points)?;
        let track: Vec<TrajectoryPoint> = summary
            .points
            .iter()
            .map(|p| TrajectoryPoint::observed(*p, summary.timestamp_utc))
            .collect();
        let projection = project_trajectory(&track, None, &config.trajectory);

        let mut incident = Self::assemble(
            id.into(),
            centroid,
            Vec::new(),
            RiskLevel::from_severity(summary.severity),
            projection,
            &config.patterns,
        );
        incident.estimated_speed_kmh = None;
        Some(incident)
    }

    fn assemble(
        id: String,
        centroid: GeoPoint,
        member_events: Vec<DetectionEvent>,
        risk_level: RiskLevel,
        projection: ProjectedTrajectory,
        patterns: &PatternConfig,
    ) -> Self {
        let observed = projection.observed().len();
        let has_projection = !projection.projected().is_empty();
        let pattern = classify_pattern(observed, projection.estimated_speed_kmh, patterns);

        Self {
            id,
            centroid,
            member_events,
            pattern,
            risk_level,
            projected_heading_deg: has_projection.then_some(projection.projected_heading_deg),
            estimated_speed_kmh: has_projection.then_some(projection.estimated_speed_kmh),
            trajectory: projection.trajectory,
        }
    }

    /// Number of member detections.
    pub fn signal_count(&self) -> usize {
        self.member_events.len()
    }
}

struct Cluster {
    drone_id: Option<String>,
    events: Vec<DetectionEvent>,
}

impl Cluster {
    fn accepts(&self, event: &DetectionEvent, config: &ClusterConfig) -> bool {
        let Some(latest) = self.events.last() else {
            return false;
        };
        let gap_minutes =
            (event.timestamp_utc - latest.timestamp_utc).num_seconds().abs() as f64 / 60.0;
        gap_minutes <= config.max_gap_minutes
            && haversine_km(&latest.position, &event.position) <= config.cluster_radius_km
    }
}

/// Groups chronological detections into candidate incidents.
///
/// Detections carrying a tracker `drone_id` group by that id. The rest join
/// the first group whose latest member is within `cluster_radius_km` and
/// `max_gap_minutes`, or start a new group. Invalid positions are skipped.
pub fn cluster_detections(events: &[DetectionEvent], config: &ClusterConfig) -> Vec<Vec<DetectionEvent>> {
    let mut clusters: Vec<Cluster> = Vec::new();

    for event in events.iter().filter(|e| e.position.is_valid()) {
        let slot = match &event.drone_id {
            Some(id) => clusters
                .iter()
                .position(|c| c.drone_id.as_deref() == Some(id.as_str())),
            None => clusters.iter().position(|c| c.accepts(event, config)),
        };

        match slot {
            Some(index) => clusters[index].events.push(event.clone()),
            None => clusters.push(Cluster {
                drone_id: event.drone_id.clone(),
                events: vec![event.clone()],
            }),
        }
    }

    tracing::debug!(
        detections = events.len(),
        clusters = clusters.len(),
        "clustered detections"
    );
    clusters.into_iter().map(|c| c.events).collect()
}

/// Incidents in the order they are offered for evacuation targeting:
/// most severe first, input order preserved within a level.
pub fn evacuation_targeting_order(incidents: &[ClusteredIncident]) -> Vec<&ClusteredIncident> {
    let mut ordered: Vec<&ClusteredIncident> = incidents.iter().collect();
    ordered.sort_by(|a, b| b.risk_level.cmp(&a.risk_level));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SensorType;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 4, 12, 0, 0).unwrap()
    }

    fn event(id: &str, lat: f64, lng: f64, minutes: i64) -> DetectionEvent {
        DetectionEvent::new(
            id,
            t0() + Duration::minutes(minutes),
            GeoPoint::new(lat, lng),
            SensorType::Radar,
            0.9,
        )
    }

    #[test]
    fn test_risk_from_severity() {
        assert_eq!(RiskLevel::from_severity(-3), RiskLevel::Low);
        assert_eq!(RiskLevel::from_severity(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_severity(1), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_severity(2), RiskLevel::High);
        assert_eq!(RiskLevel::from_severity(3), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_severity(9), RiskLevel::Critical);
    }

    #[test]
    fn test_risk_ordering_and_keys() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::Medium > RiskLevel::Low);
        assert_eq!(RiskLevel::Critical.color_hex(), "#dc2626");
        assert_eq!(RiskLevel::Low.to_string(), "low");
    }

    #[test]
    fn test_pattern_boundaries() {
        let cfg = PatternConfig::default();
        assert_eq!(classify_pattern(0, 0.0, &cfg), MovementPattern::Hovering);
        assert_eq!(classify_pattern(3, 9.99, &cfg), MovementPattern::Surveillance);
        assert_eq!(classify_pattern(3, 10.0, &cfg), MovementPattern::Transit);
        assert_eq!(classify_pattern(3, 50.0, &cfg), MovementPattern::Transit);
        assert_eq!(classify_pattern(3, 50.01, &cfg), MovementPattern::Crossing);
    }

    #[test]
    fn test_centroid() {
        let points = [GeoPoint::new(52.0, 23.0), GeoPoint::new(53.0, 24.0)];
        assert_eq!(centroid(&points), Some(GeoPoint::new(52.5, 23.5)));
        assert_eq!(centroid(&[]), None);
        assert_eq!(centroid(&[GeoPoint::new(f64::NAN, 1.0)]), None);
    }

    #[test]
    fn test_incident_from_events() {
        // Out of order on purpose; the builder sorts members by time.
        let events = [
            event("c", 52.90, 23.40, 20),
            event("a", 52.80, 23.40, 0),
            event("b", 52.85, 23.40, 10),
        ];
        let config = EngineConfig::default();
        let incident = ClusteredIncident::from_events("cluster-1", &events, 3, &config).unwrap();

        assert_eq!(incident.risk_level, RiskLevel::Critical);
        assert_eq!(incident.signal_count(), 3);
        assert_eq!(incident.member_events[0].id, "a");
        assert!((incident.centroid.lat - 52.85).abs() < 1e-9);
        // ~5.6 km per 10 minutes is ~33 km/h
        assert_eq!(incident.pattern, MovementPattern::Transit);
        assert_eq!(incident.trajectory.len(), 15);
        let heading = incident.projected_heading_deg.unwrap();
        assert!(heading < 0.01 || heading > 359.99);
        assert!(incident.estimated_speed_kmh.unwrap() > 30.0);
    }

    #[test]
    fn test_single_event_incident_without_motion() {
        let config = EngineConfig::default();
        let incident =
            ClusteredIncident::from_events("cluster-2", &[event("a", 52.0, 23.0, 0)], 1, &config)
                .unwrap();
        assert_eq!(incident.pattern, MovementPattern::Hovering);
        assert!(incident.projected_heading_deg.is_none());
        assert!(incident.estimated_speed_kmh.is_none());
        assert_eq!(incident.trajectory.len(), 1);
    }

    #[test]
    fn test_incident_from_no_events() {
        let config = EngineConfig::default();
        assert!(ClusteredIncident::from_events("x", &[], 0, &config).is_none());
    }

    #[test]
    fn test_incident_from_summary() {
        let summary = ThreatSummary {
            incident_id: Some("INC-9".into()),
            timestamp_utc: t0(),
            points: vec![
                GeoPoint::new(52.0, 23.6),
                GeoPoint::new(52.0, 23.5),
                GeoPoint::new(52.0, 23.4),
            ],
            severity: 2,
            description: "westbound group".into(),
        };
        let incident =
            ClusteredIncident::from_summary("INC-9", &summary, &EngineConfig::default()).unwrap();
        assert_eq!(incident.risk_level, RiskLevel::High);
        assert!(incident.member_events.is_empty());
        assert!(incident.estimated_speed_kmh.is_none());
        let heading = incident.projected_heading_deg.unwrap();
        assert!((heading - 270.0).abs() < 0.1);
    }

    #[test]
    fn test_cluster_by_drone_id_and_proximity() {
        let events = [
            event("a", 52.80, 23.40, 0).with_drone_id("UAV-1"),
            event("b", 52.00, 22.00, 1),
            event("c", 52.81, 23.41, 2).with_drone_id("UAV-1"),
            event("d", 52.01, 22.01, 3),
            event("e", 53.50, 23.90, 4),
            // Same place as "b" but long after: a new object
            event("f", 52.00, 22.00, 300),
        ];
        let clusters = cluster_detections(&events, &ClusterConfig::default());
        let ids: Vec<Vec<&str>> = clusters
            .iter()
            .map(|c| c.iter().map(|e| e.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["a", "c"], vec!["b", "d"], vec!["e"], vec!["f"]]);
    }

    #[test]
    fn test_evacuation_targeting_order_is_stable() {
        let config = EngineConfig::default();
        let make = |id: &str, severity| {
            ClusteredIncident::from_events(id, &[event(id, 52.0, 23.0, 0)], severity, &config)
                .unwrap()
        };
        let incidents = vec![make("m1", 1), make("c1", 3), make("m2", 1), make("c2", 3), make("l", 0)];
        let order: Vec<&str> = evacuation_targeting_order(&incidents)
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(order, vec!["c1", "c2", "m1", "m2", "l"]);
    }
}
