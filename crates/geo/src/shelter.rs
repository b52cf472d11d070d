//! Shelter safety scoring and evacuation geometry.
//!
//! A shelter is considered safer the farther it lies, on average, from every
//! active threat. Zones and routes are plain geometry handed to the
//! presentation layer for drawing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ShelterConfig;
use crate::geodesic::{haversine_km, planar_distance_sq};
use crate::incident::{ClusteredIncident, RiskLevel};
use crate::projection::radius_to_pixels;
use crate::GeoPoint;

/// Who operates a shelter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShelterType {
    Public,
    Private,
    Military,
}

/// Static shelter directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shelter {
    pub id: String,
    pub name: String,
    pub position: GeoPoint,
    pub capacity: u32,
    #[serde(rename = "type")]
    pub shelter_type: ShelterType,
    pub available: bool,
}

/// Operator-issued instruction to evacuate around an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvacuationOrder {
    pub id: String,
    pub incident_id: String,
    pub target_shelter_id: String,
    pub issued_at: DateTime<Utc>,
    pub priority: RiskLevel,
    pub radius_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A shelter with its mean distance to the threats it was scored against.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelterScore<'a> {
    pub shelter: &'a Shelter,
    pub mean_distance_km: f64,
}

fn mean_distance_km(shelter: &Shelter, threats: &[GeoPoint]) -> f64 {
    let total: f64 = threats.iter().map(|t| haversine_km(&shelter.position, t)).sum();
    total / threats.len() as f64
}

/// Scores every shelter by its mean great-circle distance to the threats.
///
/// Shelters and threats with invalid coordinates are ignored. With no usable
/// threat there is nothing to score against and the result is empty. Output
/// order follows input order.
pub fn score_shelters<'a>(shelters: &'a [Shelter], threats: &[GeoPoint]) -> Vec<ShelterScore<'a>> {
    score_matching(shelters, threats, |_| true)
}

/// [`score_shelters`] restricted to shelters accepted by `include`.
fn score_matching<'a, F>(
    shelters: &'a [Shelter],
    threats: &[GeoPoint],
    include: F,
) -> Vec<ShelterScore<'a>>
where
    F: Fn(&Shelter) -> bool + Sync,
{
    let threats: Vec<GeoPoint> = threats.iter().copied().filter(GeoPoint::is_valid).collect();
    if threats.is_empty() {
        tracing::debug!("no valid threats, nothing to score");
        return Vec::new();
    }

    let score = |shelter: &'a Shelter| {
        (include(shelter) && shelter.position.is_valid()).then(|| ShelterScore {
            shelter,
            mean_distance_km: mean_distance_km(shelter, &threats),
        })
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        shelters.par_iter().filter_map(score).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        shelters.iter().filter_map(score).collect()
    }
}

fn rank_scores<'a>(mut scores: Vec<ShelterScore<'a>>, top_k: usize) -> Vec<&'a Shelter> {
    scores.sort_by(|a, b| b.mean_distance_km.total_cmp(&a.mean_distance_km));
    scores.truncate(top_k);
    scores.into_iter().map(|s| s.shelter).collect()
}

/// Top `top_k` shelters, safest (farthest on average from the threats) first.
///
/// Ties keep input order, so identical input always ranks identically.
///
/// # Example
/// ```
/// use uavo_geo::{rank_shelters_by_safety, GeoPoint, Shelter, ShelterType};
///
/// let shelter = |id: &str, lat: f64| Shelter {
///     id: id.into(),
///     name: id.into(),
///     position: GeoPoint::new(lat, 23.0),
///     capacity: 100,
///     shelter_type: ShelterType::Public,
///     available: true,
/// };
/// let shelters = [shelter("near", 52.01), shelter("far", 52.9)];
/// let threats = [GeoPoint::new(52.0, 23.0)];
///
/// let ranked = rank_shelters_by_safety(&shelters, &threats, 5);
/// assert_eq!(ranked[0].id, "far");
/// ```
pub fn rank_shelters_by_safety<'a>(
    shelters: &'a [Shelter],
    threats: &[GeoPoint],
    top_k: usize,
) -> Vec<&'a Shelter> {
    rank_scores(score_shelters(shelters, threats), top_k)
}

/// Ranks shelters using the configured `top_k`, optionally skipping
/// unavailable ones.
pub fn recommend_shelters<'a>(
    shelters: &'a [Shelter],
    threats: &[GeoPoint],
    config: &ShelterConfig,
) -> Vec<&'a Shelter> {
    let available_only = config.available_only;
    let scores = score_matching(shelters, threats, |s| s.available || !available_only);
    rank_scores(scores, config.top_k)
}

/// Closest shelter by squared degree distance.
///
/// A cheap preview for drawing a quick evacuation line; it ignores Earth
/// curvature and is not meant for final routing.
pub fn nearest_shelter<'a>(point: &GeoPoint, shelters: &'a [Shelter]) -> Option<&'a Shelter> {
    if !point.is_valid() {
        return None;
    }
    shelters
        .iter()
        .filter(|s| s.position.is_valid())
        .min_by(|a, b| {
            planar_distance_sq(point, &a.position).total_cmp(&planar_distance_sq(point, &b.position))
        })
}

/// Circular danger zone around an incident.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvacuationZone {
    pub center: GeoPoint,
    pub radius_km: f64,
}

impl EvacuationZone {
    /// Radius on screen at the given zoom, corrected for Mercator scale.
    pub fn radius_px(&self, zoom: u8) -> f64 {
        radius_to_pixels(self.radius_km, self.center.lat, zoom)
    }

    /// True if `point` lies inside the zone.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        haversine_km(&self.center, point) <= self.radius_km
    }
}

/// Straight evacuation line from an incident to a shelter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvacuationRoute {
    pub from: GeoPoint,
    pub to: GeoPoint,
}

impl EvacuationRoute {
    pub fn distance_km(&self) -> f64 {
        haversine_km(&self.from, &self.to)
    }
}

/// Zone geometry, or `None` for an invalid center or a non-positive radius.
pub fn build_evacuation_zone(center: GeoPoint, radius_km: f64) -> Option<EvacuationZone> {
    (center.is_valid() && radius_km.is_finite() && radius_km > 0.0)
        .then_some(EvacuationZone { center, radius_km })
}

/// Route geometry, or `None` if either end is invalid.
pub fn build_route(from: GeoPoint, to: GeoPoint) -> Option<EvacuationRoute> {
    (from.is_valid() && to.is_valid()).then_some(EvacuationRoute { from, to })
}

/// Everything needed to render one evacuation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvacuationPlan {
    pub order_id: String,
    pub priority: RiskLevel,
    pub zone: EvacuationZone,
    pub route: EvacuationRoute,
    pub route_distance_km: f64,
    pub shelter_id: String,
    pub shelter_name: String,
}

/// Resolves an order against the current incidents and shelter directory.
///
/// Returns `None` if the incident or shelter is unknown or the geometry is
/// invalid.
pub fn resolve_order(
    order: &EvacuationOrder,
    incidents: &[ClusteredIncident],
    shelters: &[Shelter],
) -> Option<EvacuationPlan> {
    let Some(incident) = incidents.iter().find(|i| i.id == order.incident_id) else {
        tracing::debug!(order = %order.id, incident = %order.incident_id, "unknown incident");
        return None;
    };
    let Some(shelter) = shelters.iter().find(|s| s.id == order.target_shelter_id) else {
        tracing::debug!(order = %order.id, shelter = %order.target_shelter_id, "unknown shelter");
        return None;
    };

    let zone = build_evacuation_zone(incident.centroid, order.radius_km)?;
    let route = build_route(incident.centroid, shelter.position)?;

    Some(EvacuationPlan {
        order_id: order.id.clone(),
        priority: order.priority,
        zone,
        route_distance_km: route.distance_km(),
        route,
        shelter_id: shelter.id.clone(),
        shelter_name: shelter.name.clone(),
    })
}
