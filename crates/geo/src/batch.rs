//! Multi-incident analysis with optional parallelism.
//!
//! Takes one snapshot of the detection feed, the upstream threat summaries
//! and the shelter directory, and produces every incident the map needs to
//! draw together with the shelter recommendations for the current threats.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::incident::{evacuation_targeting_order, ClusteredIncident, ThreatSummary};
use crate::shelter::{nearest_shelter, recommend_shelters, Shelter};
use crate::{cluster_detections, DetectionEvent, GeoPoint};

/// Everything fed into one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    #[serde(default)]
    pub detections: Vec<DetectionEvent>,
    #[serde(default)]
    pub summaries: Vec<ThreatSummary>,
    #[serde(default)]
    pub shelters: Vec<Shelter>,
    /// Upstream severity scores keyed by drone id or cluster id
    #[serde(default)]
    pub severities: HashMap<String, i64>,
}

impl AnalysisInput {
    /// Severity assigned upstream to a detection cluster.
    ///
    /// A tracker drone id shared by the members wins over the generated
    /// cluster id. Clusters nobody scored are low risk.
    pub fn cluster_severity(&self, cluster_id: &str, members: &[DetectionEvent]) -> i64 {
        members
            .iter()
            .filter_map(|e| e.drone_id.as_deref())
            .chain(std::iter::once(cluster_id))
            .find_map(|key| self.severities.get(key).copied())
            .unwrap_or(0)
    }
}

/// One incident with its quick evacuation preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentAnalysis {
    pub incident: ClusteredIncident,
    /// Closest shelter to the incident centroid
    pub nearest_shelter_id: Option<String>,
}

/// Result of [`analyze_incidents`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Incidents in evacuation targeting order
    pub incidents: Vec<IncidentAnalysis>,
    /// Shelter ids ranked by mean distance to all incident centroids
    pub safest_shelter_ids: Vec<String>,
}

/// Clusters detections, folds in threat summaries and ranks shelters.
///
/// Detection clusters are named `cluster-<n>` in feed order and take their
/// severity from [`AnalysisInput::severities`]. Summaries keep their upstream
/// id or fall back to `summary-<n>`. Clusters or summaries
/// without a valid position are dropped.
///
/// # Example
/// ```
/// use uavo_geo::{analyze_incidents, AnalysisInput, EngineConfig};
///
/// let report = analyze_incidents(&AnalysisInput::default(), &EngineConfig::default());
/// assert!(report.incidents.is_empty());
/// assert!(report.safest_shelter_ids.is_empty());
/// ```
pub fn analyze_incidents(input: &AnalysisInput, config: &EngineConfig) -> AnalysisReport {
    let clusters = cluster_detections(&input.detections, &config.clustering);

    let build_cluster = |(index, members): (usize, &Vec<DetectionEvent>)| {
        let id = format!("cluster-{}", index + 1);
        let severity = input.cluster_severity(&id, members);
        ClusteredIncident::from_events(id, members, severity, config)
    };
    let build_summary = |(index, summary): (usize, &ThreatSummary)| {
        let id = summary
            .incident_id
            .clone()
            .unwrap_or_else(|| format!("summary-{}", index + 1));
        ClusteredIncident::from_summary(id, summary, config)
    };

    #[cfg(feature = "parallel")]
    let incidents: Vec<ClusteredIncident> = {
        use rayon::prelude::*;
        let mut built: Vec<ClusteredIncident> = clusters
            .par_iter()
            .enumerate()
            .filter_map(build_cluster)
            .collect();
        built.par_extend(
            input
                .summaries
                .par_iter()
                .enumerate()
                .filter_map(build_summary),
        );
        built
    };

    #[cfg(not(feature = "parallel"))]
    let incidents: Vec<ClusteredIncident> = {
        let mut built: Vec<ClusteredIncident> =
            clusters.iter().enumerate().filter_map(build_cluster).collect();
        built.extend(input.summaries.iter().enumerate().filter_map(build_summary));
        built
    };

    let threats: Vec<GeoPoint> = incidents.iter().map(|i| i.centroid).collect();
    let safest_shelter_ids = recommend_shelters(&input.shelters, &threats, &config.shelters)
        .into_iter()
        .map(|s| s.id.clone())
        .collect();

    let ordered: Vec<IncidentAnalysis> = evacuation_targeting_order(&incidents)
        .into_iter()
        .map(|incident| IncidentAnalysis {
            nearest_shelter_id: nearest_shelter(&incident.centroid, &input.shelters)
                .map(|s| s.id.clone()),
            incident: incident.clone(),
        })
        .collect();

    tracing::debug!(
        detections = input.detections.len(),
        summaries = input.summaries.len(),
        incidents = ordered.len(),
        "analyzed incidents"
    );

    AnalysisReport {
        incidents: ordered,
        safest_shelter_ids,
    }
}
