use super::geometry::{self, SnappedPoint};
use super::{BoundingBox, RoadFeature, RoadNetworkIndex};
use crate::config::TrackerConfig;
use crate::types::PositionSample;
use log::debug;
use serde::Serialize;
use std::sync::Arc;

/// Where the movement bearing of a sample came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BearingSource {
    /// Receiver heading, trusted at speed
    Heading,
    /// Displacement from the previous sample
    Displacement,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MovementBearing {
    pub degrees: f64,
    pub source: BearingSource,
}

/// Result of matching one position sample to a road
#[derive(Clone, Debug)]
pub struct MatchResult<'a> {
    pub road: &'a RoadFeature,
    pub snapped: SnappedPoint,
    pub distance_m: f64,
    pub movement: Option<MovementBearing>,
}

impl MatchResult<'_> {
    pub fn movement_bearing(&self) -> Option<f64> {
        self.movement.map(|m| m.degrees)
    }
}

/// Matching thresholds, split out of `TrackerConfig`
#[derive(Clone, Copy, Debug)]
pub struct MatchSettings {
    pub search_radius_deg: f64,
    pub max_snap_distance_m: f64,
    pub max_bearing_diff_deg: f64,
    pub heading_speed_floor_mps: f64,
    pub arc_length_progress: bool,
}

impl From<&TrackerConfig> for MatchSettings {
    fn from(config: &TrackerConfig) -> Self {
        MatchSettings {
            search_radius_deg: config.search_radius_deg,
            max_snap_distance_m: config.max_snap_distance_m,
            max_bearing_diff_deg: config.max_bearing_diff_deg,
            heading_speed_floor_mps: config.heading_speed_floor_mps,
            arc_length_progress: config.arc_length_progress,
        }
    }
}

/// Snaps position samples onto the road network
///
/// # Algorithm
/// 1. Coarse: bounding-box query around the sample
/// 2. Movement bearing: heading at speed, else previous-sample displacement
/// 3. Fine: snap to each candidate, drop those beyond the snap distance limit
/// 4. Bearing filter (only with a movement bearing): drop candidates whose
///    segment is off by more than the limit in both orientations
/// 5. Nearest surviving snap wins; earlier candidates win ties
///
/// Parallel carriageways and ramps often lie within a few hundred metres, so
/// distance alone picks the wrong road; the bearing filter separates them
/// whenever the vehicle is moving.
///
/// # Usage
/// ```no_run
/// use sapa_tracker::map_match::{RoadMatcher, RoadNetworkIndex};
/// use sapa_tracker::{PositionSample, TrackerConfig};
/// use std::sync::Arc;
///
/// let index = Arc::new(RoadNetworkIndex::build(vec![/* features */]));
/// let matcher = RoadMatcher::new(index, (&TrackerConfig::default()).into());
///
/// let sample = PositionSample::new(0.0, 35.6, 139.7).with_speed(25.0);
/// if let Some(m) = matcher.match_sample(&sample, None, 5.0) {
///     println!("{} at {:.1} m", m.road.name, m.distance_m);
/// }
/// ```
pub struct RoadMatcher {
    network: Arc<RoadNetworkIndex>,
    settings: MatchSettings,
}

impl RoadMatcher {
    pub fn new(network: Arc<RoadNetworkIndex>, settings: MatchSettings) -> Self {
        RoadMatcher { network, settings }
    }

    pub fn network(&self) -> &RoadNetworkIndex {
        &self.network
    }

    /// Match a sample to the best road, or `None` if nothing qualifies
    ///
    /// # Arguments
    /// * `sample` - Position to match
    /// * `previous` - Preceding sample of the same stream, for displacement bearing
    /// * `min_displacement_m` - Displacement needed before a bearing is derived
    pub fn match_sample(
        &self,
        sample: &PositionSample,
        previous: Option<&PositionSample>,
        min_displacement_m: f64,
    ) -> Option<MatchResult<'_>> {
        let point = sample.point();
        let bbox = BoundingBox::around(point, self.settings.search_radius_deg);
        let candidates = self.network.query(&bbox);

        if candidates.is_empty() {
            debug!(
                "No candidate roads near ({:.5}, {:.5})",
                sample.latitude, sample.longitude
            );
            return None;
        }

        let movement = movement_bearing(
            sample,
            previous,
            self.settings.heading_speed_floor_mps,
            min_displacement_m,
        );

        let mut best: Option<MatchResult<'_>> = None;

        for road in candidates {
            let snapped = match road.snap(point, self.settings.arc_length_progress) {
                Some(s) => s,
                None => continue,
            };
            let distance_m = snapped.distance_m;

            if distance_m > self.settings.max_snap_distance_m {
                continue;
            }

            if let Some(m) = movement {
                let deviation = match self.bearing_deviation(road, &snapped, m.degrees) {
                    Some(d) => d,
                    None => continue,
                };
                if deviation > self.settings.max_bearing_diff_deg {
                    debug!(
                        "Rejecting road {}: bearing off by {:.1} deg",
                        road.id, deviation
                    );
                    continue;
                }
            }

            let closer = match &best {
                Some(current) => distance_m < current.distance_m,
                None => true,
            };
            if closer {
                best = Some(MatchResult {
                    road,
                    snapped,
                    distance_m,
                    movement,
                });
            }
        }

        best
    }

    /// Smaller deviation of `movement` from the snapped segment, either way
    fn bearing_deviation(&self, road: &RoadFeature, snapped: &SnappedPoint, movement: f64) -> Option<f64> {
        let segment = road.bearing_at(snapped)?;
        let forward = geometry::bearing_difference(movement, segment);
        let reverse = geometry::bearing_difference(movement, geometry::normalize_bearing(segment + 180.0));
        Some(forward.min(reverse))
    }
}

/// Movement bearing of a sample.
///
/// Heading wins when present and the speed exceeds `heading_speed_floor`.
/// Otherwise the bearing from `previous` is used if the two samples are more
/// than `min_displacement_m` apart. Anything else yields `None`.
pub fn movement_bearing(
    sample: &PositionSample,
    previous: Option<&PositionSample>,
    heading_speed_floor: f64,
    min_displacement_m: f64,
) -> Option<MovementBearing> {
    if let (Some(heading), Some(speed)) = (sample.heading, sample.speed) {
        if heading.is_finite() && speed > heading_speed_floor {
            return Some(MovementBearing {
                degrees: geometry::normalize_bearing(heading),
                source: BearingSource::Heading,
            });
        }
    }

    let prev = previous?;
    let displacement = geometry::distance(prev.point(), sample.point());
    if displacement > min_displacement_m {
        Some(MovementBearing {
            degrees: geometry::bearing(prev.point(), sample.point()),
            source: BearingSource::Displacement,
        })
    } else {
        None
    }
}
