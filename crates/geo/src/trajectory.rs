//! Trajectory extrapolation from a short history of observed positions.
//!
//! A track is extended by estimating how fast its bearing changes per
//! kilometre travelled (the turn rate) over the most recent segments and
//! stepping forward along that curve. The median of the recent turn rates is
//! used so that a single noisy fix cannot bend the whole projection.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TrajectoryConfig;
use crate::geodesic::{
    bearing_delta, destination_point, haversine_km, initial_bearing_deg, normalize_bearing,
};
use crate::{DetectionEvent, GeoPoint};

/// One point of a trajectory, either observed or synthesised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryPoint {
    pub position: GeoPoint,
    pub timestamp_utc: DateTime<Utc>,
    #[serde(default)]
    pub is_projected: bool,
}

impl TrajectoryPoint {
    /// An observed (non-projected) point.
    pub fn observed(position: GeoPoint, timestamp_utc: DateTime<Utc>) -> Self {
        Self {
            position,
            timestamp_utc,
            is_projected: false,
        }
    }

    fn projected(position: GeoPoint, timestamp_utc: DateTime<Utc>) -> Self {
        Self {
            position,
            timestamp_utc,
            is_projected: true,
        }
    }
}

/// Externally reported motion used when a track has a single fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionHint {
    pub heading_deg: f64,
    pub speed_kmh: f64,
}

impl MotionHint {
    fn is_usable(&self) -> bool {
        self.heading_deg.is_finite() && self.speed_kmh.is_finite() && self.speed_kmh > 0.0
    }
}

/// Observed track followed by its extrapolated continuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedTrajectory {
    pub trajectory: Vec<TrajectoryPoint>,
    pub projected_heading_deg: f64,
    pub estimated_speed_kmh: f64,
}

impl ProjectedTrajectory {
    fn unprojected(trajectory: Vec<TrajectoryPoint>) -> Self {
        Self {
            trajectory,
            projected_heading_deg: 0.0,
            estimated_speed_kmh: 0.0,
        }
    }

    /// The observed prefix, drawn as a solid path.
    pub fn observed(&self) -> &[TrajectoryPoint] {
        let split = self.split_index();
        &self.trajectory[..split]
    }

    /// The projected suffix, drawn as a dashed path.
    pub fn projected(&self) -> &[TrajectoryPoint] {
        let split = self.split_index();
        &self.trajectory[split..]
    }

    /// True if no observed point follows a projected one.
    pub fn is_well_formed(&self) -> bool {
        self.trajectory
            .windows(2)
            .all(|w| !(w[0].is_projected && !w[1].is_projected))
    }

    fn split_index(&self) -> usize {
        self.trajectory
            .iter()
            .position(|p| p.is_projected)
            .unwrap_or(self.trajectory.len())
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    bearing_deg: f64,
    distance_km: f64,
    duration_hours: f64,
}

fn segments(points: &[TrajectoryPoint]) -> Vec<Segment> {
    points
        .windows(2)
        .map(|w| {
            let millis = (w[1].timestamp_utc - w[0].timestamp_utc).num_milliseconds();
            Segment {
                bearing_deg: initial_bearing_deg(&w[0].position, &w[1].position),
                distance_km: haversine_km(&w[0].position, &w[1].position),
                duration_hours: millis as f64 / 3_600_000.0,
            }
        })
        .collect()
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Median signed turn rate (degrees per km) over the most recent segments.
fn turn_rate(segments: &[Segment], config: &TrajectoryConfig) -> f64 {
    let window = config.turn_window.min(segments.len());
    let recent = &segments[segments.len() - window..];

    let mut rates: Vec<f64> = recent
        .windows(2)
        .map(|w| {
            let turn = bearing_delta(w[0].bearing_deg, w[1].bearing_deg);
            turn / w[1].distance_km.max(config.min_segment_km)
        })
        .collect();

    let limit = config.max_turn_rate_deg_per_km;
    median(&mut rates).map_or(0.0, |rate| rate.clamp(-limit, limit))
}

/// Mean of per-segment speeds in km/h; segments without elapsed time are skipped.
fn mean_speed_kmh(segments: &[Segment]) -> f64 {
    let speeds: Vec<f64> = segments
        .iter()
        .filter(|s| s.duration_hours > 0.0)
        .map(|s| s.distance_km / s.duration_hours)
        .collect();

    if speeds.is_empty() {
        0.0
    } else {
        speeds.iter().sum::<f64>() / speeds.len() as f64
    }
}

/// `timestamp + millis`, or `None` past the representable date range.
fn offset(timestamp: DateTime<Utc>, millis: f64) -> Option<DateTime<Utc>> {
    Duration::try_milliseconds(millis.round() as i64)
        .and_then(|delta| timestamp.checked_add_signed(delta))
}

/// Extends a single fix along a reported heading and speed.
fn project_from_hint(
    fix: TrajectoryPoint,
    hint: MotionHint,
    config: &TrajectoryConfig,
) -> ProjectedTrajectory {
    let heading = normalize_bearing(hint.heading_deg);
    let mut trajectory = Vec::with_capacity(config.hint_points + 1);
    trajectory.push(fix);
    let mut stamp = fix.timestamp_utc;

    for step in 1..=config.hint_points {
        let minutes = config.hint_horizon_minutes * step as f64 / config.hint_points as f64;
        let distance_km = hint.speed_kmh * minutes / 60.0;
        stamp = offset(fix.timestamp_utc, minutes * 60_000.0).unwrap_or(stamp);
        trajectory.push(TrajectoryPoint::projected(
            destination_point(&fix.position, heading, distance_km),
            stamp,
        ));
    }

    ProjectedTrajectory {
        trajectory,
        projected_heading_deg: heading,
        estimated_speed_kmh: hint.speed_kmh,
    }
}

/// Projects a chronological track forward.
///
/// Previously projected points in the input are discarded, so the output of
/// an earlier run can be fed back in together with new fixes. Points with
/// invalid coordinates are dropped.
///
/// With two or more fixes the result holds every observed fix followed by
/// exactly `config.projected_points` projected ones. A single fix is only
/// extended when `hint` carries a usable heading and positive speed.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use uavo_geo::config::TrajectoryConfig;
/// use uavo_geo::{project_trajectory, GeoPoint, TrajectoryPoint};
///
/// let t0 = Utc.with_ymd_and_hms(2025, 10, 4, 12, 0, 0).unwrap();
/// let track = [
///     TrajectoryPoint::observed(GeoPoint::new(52.0, 23.0), t0),
///     TrajectoryPoint::observed(GeoPoint::new(52.1, 23.0), t0 + Duration::seconds(60)),
/// ];
///
/// let result = project_trajectory(&track, None, &TrajectoryConfig::default());
/// assert_eq!(result.projected().len(), 12);
/// assert!(result.projected()[0].position.lat > 52.1);
/// ```
pub fn project_trajectory(
    observed: &[TrajectoryPoint],
    hint: Option<MotionHint>,
    config: &TrajectoryConfig,
) -> ProjectedTrajectory {
    let actual: Vec<TrajectoryPoint> = observed
        .iter()
        .filter(|p| !p.is_projected && p.position.is_valid())
        .copied()
        .collect();

    let discarded = observed.iter().filter(|p| !p.is_projected).count() - actual.len();
    if discarded > 0 {
        tracing::warn!(discarded, "dropped track points with invalid coordinates");
    }

    if actual.len() < 2 {
        return match (actual.first(), hint) {
            (Some(fix), Some(hint)) if hint.is_usable() => project_from_hint(*fix, hint, config),
            _ => ProjectedTrajectory::unprojected(actual),
        };
    }

    let segments = segments(&actual);
    let rate = turn_rate(&segments, config);
    let estimated_speed_kmh = mean_speed_kmh(&segments);

    let path_km: f64 = segments.iter().map(|s| s.distance_km).sum();
    let steps = config.projected_points;
    let step_km = path_km * config.horizon_scale / steps as f64;

    let (first, last) = (actual[0], actual[actual.len() - 1]);
    let observed_millis = (last.timestamp_utc - first.timestamp_utc)
        .num_milliseconds()
        .max(0) as f64;
    let step_millis = observed_millis * config.horizon_scale / steps as f64;

    let mut bearing = segments[segments.len() - 1].bearing_deg;
    let projected_heading_deg = bearing;

    tracing::trace!(
        turn_rate = rate,
        step_km,
        speed_kmh = estimated_speed_kmh,
        "extrapolating track"
    );

    let mut trajectory = actual;
    trajectory.reserve(steps);
    let mut position = last.position;
    let mut stamp = last.timestamp_utc;
    for step in 1..=steps {
        position = destination_point(&position, bearing, step_km);
        // Past the end of the calendar the clock stops at the last stamp.
        stamp = offset(last.timestamp_utc, step_millis * step as f64).unwrap_or(stamp);
        trajectory.push(TrajectoryPoint::projected(position, stamp));
        bearing = normalize_bearing(bearing + rate * step_km);
    }

    ProjectedTrajectory {
        trajectory,
        projected_heading_deg,
        estimated_speed_kmh,
    }
}

/// Projects the track formed by detection events, in the order given.
///
/// A lone event supplies its own heading and speed as the motion hint.
pub fn project_events(events: &[DetectionEvent], config: &TrajectoryConfig) -> ProjectedTrajectory {
    let track: Vec<TrajectoryPoint> = events
        .iter()
        .map(|e| TrajectoryPoint::observed(e.position, e.timestamp_utc))
        .collect();

    let hint = match events {
        [single] => match (single.heading_deg, single.speed_kmh()) {
            (Some(heading_deg), Some(speed_kmh)) => Some(MotionHint {
                heading_deg,
                speed_kmh,
            }),
            _ => None,
        },
        _ => None,
    };

    project_trajectory(&track, hint, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SensorType;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 4, 12, 0, 0).unwrap()
    }

    fn fix(lat: f64, lng: f64, secs: i64) -> TrajectoryPoint {
        TrajectoryPoint::observed(GeoPoint::new(lat, lng), t0() + Duration::seconds(secs))
    }

    fn config() -> TrajectoryConfig {
        TrajectoryConfig::default()
    }

    #[test]
    fn test_straight_north_projection() {
        let track = [fix(52.0, 23.0, 0), fix(52.1, 23.0, 60)];
        let result = project_trajectory(&track, None, &config());

        let heading = result.projected_heading_deg;
        assert!(heading < 1e-6 || heading > 360.0 - 1e-6, "heading {}", heading);
        assert!(result.estimated_speed_kmh > 0.0);
        // ~11.1 km in one minute
        assert!((result.estimated_speed_kmh - 667.0).abs() < 5.0);

        let first = result.projected()[0];
        assert!(first.position.lat > 52.1);
        assert!((first.position.lng - 23.0).abs() < 1e-9);
        assert!(first.timestamp_utc > track[1].timestamp_utc);

        // Projection covers the observed path length again.
        let last = result.trajectory.last().unwrap();
        assert!((last.position.lat - 52.2).abs() < 1e-3);
        assert_eq!(last.timestamp_utc, t0() + Duration::seconds(120));
    }

    #[test]
    fn test_turning_track_keeps_curving_left() {
        let p0 = GeoPoint::new(52.0, 23.0);
        let p1 = destination_point(&p0, 90.0, 1.0);
        let p2 = destination_point(&p1, 80.0, 1.0);
        let track = [
            TrajectoryPoint::observed(p0, t0()),
            TrajectoryPoint::observed(p1, t0() + Duration::seconds(30)),
            TrajectoryPoint::observed(p2, t0() + Duration::seconds(60)),
        ];

        let result = project_trajectory(&track, None, &config());
        assert!((result.projected_heading_deg - 80.0).abs() < 0.1);

        let mut path = vec![p2];
        path.extend(result.projected().iter().map(|p| p.position));
        let headings: Vec<f64> = path
            .windows(2)
            .map(|w| initial_bearing_deg(&w[0], &w[1]))
            .collect();

        assert_eq!(headings.len(), 12);
        for pair in headings.windows(2) {
            let turn = bearing_delta(pair[0], pair[1]);
            assert!(turn < 0.0, "turned right: {:?}", pair);
        }
        // 2 km of projection at ~10°/km
        let total_turn = bearing_delta(headings[0], headings[11]);
        assert!(total_turn < -15.0 && total_turn > -25.0, "total {}", total_turn);
    }

    #[test]
    fn test_single_segment_is_straight() {
        let p0 = GeoPoint::new(52.0, 23.0);
        let p1 = destination_point(&p0, 45.0, 2.0);
        let track = [
            TrajectoryPoint::observed(p0, t0()),
            TrajectoryPoint::observed(p1, t0() + Duration::seconds(120)),
        ];
        let result = project_trajectory(&track, None, &config());
        let end = result.trajectory.last().unwrap().position;
        let straight = destination_point(&p1, initial_bearing_deg(&p0, &p1), 2.0);
        assert!(haversine_km(&end, &straight) < 0.01);
    }

    #[test]
    fn test_median_ignores_single_noisy_segment() {
        // Four straight eastward segments with one kink in the middle.
        let mut points = vec![GeoPoint::new(52.0, 23.0)];
        for bearing in [90.0, 90.0, 140.0, 90.0, 90.0] {
            let next = destination_point(points.last().unwrap(), bearing, 1.0);
            points.push(next);
        }
        let segs = segments(
            &points
                .iter()
                .enumerate()
                .map(|(i, p)| TrajectoryPoint::observed(*p, t0() + Duration::seconds(i as i64 * 10)))
                .collect::<Vec<_>>(),
        );
        let rate = turn_rate(&segs, &config());
        assert!(rate.abs() < 0.1, "rate {}", rate);
    }

    #[test]
    fn test_turn_rate_is_clamped() {
        let p0 = GeoPoint::new(52.0, 23.0);
        let p1 = destination_point(&p0, 0.0, 1.0);
        let p2 = destination_point(&p1, 90.0, 0.5);
        let segs = segments(&[
            TrajectoryPoint::observed(p0, t0()),
            TrajectoryPoint::observed(p1, t0() + Duration::seconds(10)),
            TrajectoryPoint::observed(p2, t0() + Duration::seconds(20)),
        ]);
        assert_eq!(turn_rate(&segs, &config()), 30.0);
    }

    #[test]
    fn test_coincident_points_do_not_produce_nan() {
        let track = [fix(52.0, 23.0, 0), fix(52.0, 23.0, 30), fix(52.1, 23.0, 60)];
        let result = project_trajectory(&track, None, &config());
        assert_eq!(result.trajectory.len(), 15);
        assert!(result.projected_heading_deg.is_finite());
        assert!(result
            .trajectory
            .iter()
            .all(|p| p.position.lat.is_finite() && p.position.lng.is_finite()));
    }

    #[test]
    fn test_speed_skips_zero_duration_segments() {
        let track = [fix(52.0, 23.0, 0), fix(52.1, 23.0, 0), fix(52.2, 23.0, 60)];
        let result = project_trajectory(&track, None, &config());
        assert!((result.estimated_speed_kmh - 667.0).abs() < 5.0);
    }

    #[test]
    fn test_single_fix_with_hint() {
        let track = [fix(52.0, 23.0, 0)];
        let hint = MotionHint {
            heading_deg: 270.0,
            speed_kmh: 60.0,
        };
        let result = project_trajectory(&track, Some(hint), &config());
        assert_eq!(result.trajectory.len(), 6);
        assert_eq!(result.projected_heading_deg, 270.0);
        assert_eq!(result.estimated_speed_kmh, 60.0);

        // 60 km/h over 30 minutes, in five even steps
        let last = result.trajectory.last().unwrap();
        assert!((haversine_km(&track[0].position, &last.position) - 30.0).abs() < 1e-6);
        assert_eq!(last.timestamp_utc, t0() + Duration::minutes(30));
        let second = result.trajectory[1];
        assert_eq!(second.timestamp_utc, t0() + Duration::minutes(6));
        assert!(second.position.lng < 23.0);
    }

    #[test]
    fn test_projection_near_end_of_calendar_does_not_overflow() {
        let early = Utc.with_ymd_and_hms(-100_000, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(200_000, 1, 1, 0, 0, 0).unwrap();
        let track = [
            TrajectoryPoint::observed(GeoPoint::new(52.0, 23.0), early),
            TrajectoryPoint::observed(GeoPoint::new(52.1, 23.0), late),
        ];
        let result = project_trajectory(&track, None, &config());
        assert_eq!(result.projected().len(), 12);
        assert!(result.is_well_formed());
        assert!(result
            .trajectory
            .windows(2)
            .all(|pair| pair[0].timestamp_utc <= pair[1].timestamp_utc));

        let stretched = TrajectoryConfig {
            horizon_scale: 1e12,
            ..config()
        };
        let hint = MotionHint {
            heading_deg: 90.0,
            speed_kmh: 50.0,
        };
        let result = project_trajectory(&track[..1], Some(hint), &stretched);
        assert_eq!(result.projected().len(), 5);
        let result = project_trajectory(&track, None, &stretched);
        assert_eq!(result.projected().len(), 12);
        assert!(result.projected().iter().all(|p| p.timestamp_utc >= late));
    }

    #[test]
    fn test_single_fix_without_hint() {
        let track = [fix(52.0, 23.0, 0)];
        let result = project_trajectory(&track, None, &config());
        assert_eq!(result.trajectory, track.to_vec());
        assert_eq!(result.projected_heading_deg, 0.0);
        assert_eq!(result.estimated_speed_kmh, 0.0);

        let stalled = MotionHint {
            heading_deg: 90.0,
            speed_kmh: 0.0,
        };
        let result = project_trajectory(&track, Some(stalled), &config());
        assert_eq!(result.trajectory.len(), 1);
    }

    #[test]
    fn test_empty_and_invalid_input() {
        let result = project_trajectory(&[], None, &config());
        assert!(result.trajectory.is_empty());

        let track = [fix(f64::NAN, 23.0, 0), fix(52.0, 23.0, 10), fix(52.1, 23.0, 70)];
        let result = project_trajectory(&track, None, &config());
        assert_eq!(result.observed().len(), 2);
        assert_eq!(result.projected().len(), 12);
    }

    #[test]
    fn test_reprojection_discards_previous_projection() {
        let track = [fix(52.0, 23.0, 0), fix(52.1, 23.0, 60)];
        let first = project_trajectory(&track, None, &config());

        let mut extended = first.trajectory.clone();
        extended.push(fix(52.2, 23.0, 120));
        let second = project_trajectory(&extended, None, &config());

        assert_eq!(second.observed().len(), 3);
        assert_eq!(second.projected().len(), 12);
        assert!(second.is_well_formed());
    }

    #[test]
    fn test_project_events_uses_hint_for_single_event() {
        let event = DetectionEvent::new(
            "DET-1",
            t0(),
            GeoPoint::new(52.6, 22.8),
            SensorType::Camera,
            0.75,
        )
        .with_motion(270.0, 10.0);
        let result = project_events(&[event], &config());
        assert_eq!(result.projected().len(), 5);
        assert!((result.estimated_speed_kmh - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_configured_point_count() {
        let cfg = TrajectoryConfig {
            projected_points: 4,
            ..TrajectoryConfig::default()
        };
        let track = [fix(52.0, 23.0, 0), fix(52.1, 23.0, 60), fix(52.2, 23.1, 120)];
        assert_eq!(project_trajectory(&track, None, &cfg).projected().len(), 4);
    }

    proptest! {
        #[test]
        fn prop_projection_count_and_order(
            steps in prop::collection::vec((0.0f64..360.0, 0.0f64..5.0, 0i64..600), 1..10),
        ) {
            let mut track = vec![fix(52.0, 23.0, 0)];
            for (bearing, distance, secs) in steps {
                let prev = *track.last().unwrap();
                track.push(TrajectoryPoint::observed(
                    destination_point(&prev.position, bearing, distance),
                    prev.timestamp_utc + Duration::seconds(secs),
                ));
            }

            let result = project_trajectory(&track, None, &config());
            prop_assert_eq!(result.observed().len(), track.len());
            prop_assert_eq!(result.projected().len(), 12);
            prop_assert!(result.is_well_formed());
            prop_assert!(result.trajectory.iter().all(|p| p.position.is_valid()));
        }
    }
}
