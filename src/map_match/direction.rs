use super::geometry::{self, SnappedPoint};
use super::{RoadDirection, RoadFeature};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Markers in road names that identify inner/outer loop carriageways
const INNER_LOOP_MARKERS: [&str; 2] = ["内回", "inner loop"];
const OUTER_LOOP_MARKERS: [&str; 2] = ["外回", "outer loop"];

/// Label shown for a travel direction. Loop roads name their carriageways
/// inner/outer instead of up/down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionLabel {
    Up,
    Down,
    InnerLoop,
    OuterLoop,
}

impl DirectionLabel {
    pub fn for_road(raw: RoadDirection, road_name: &str) -> Self {
        let lowered = road_name.to_lowercase();
        let inner = INNER_LOOP_MARKERS.iter().any(|m| lowered.contains(m));
        let outer = OUTER_LOOP_MARKERS.iter().any(|m| lowered.contains(m));

        match raw {
            RoadDirection::Up if inner => DirectionLabel::InnerLoop,
            RoadDirection::Up if outer => DirectionLabel::OuterLoop,
            RoadDirection::Up => DirectionLabel::Up,
            RoadDirection::Down if outer => DirectionLabel::OuterLoop,
            RoadDirection::Down if inner => DirectionLabel::InnerLoop,
            RoadDirection::Down => DirectionLabel::Down,
        }
    }
}

impl Display for DirectionLabel {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            DirectionLabel::Up => write!(f, "up"),
            DirectionLabel::Down => write!(f, "down"),
            DirectionLabel::InnerLoop => write!(f, "inner loop"),
            DirectionLabel::OuterLoop => write!(f, "outer loop"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DirectionResult {
    pub raw: RoadDirection,
    pub label: DirectionLabel,
}

/// Direction of travel and kilopost at a snapped point
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Resolution {
    pub direction: Option<DirectionResult>,
    pub progress: Option<f64>,
}

/// Infers travel direction relative to a road's digitized direction
#[derive(Clone, Copy, Debug)]
pub struct DirectionResolver {
    direction_speed_floor_mps: f64,
}

impl DirectionResolver {
    pub fn new(direction_speed_floor_mps: f64) -> Self {
        DirectionResolver {
            direction_speed_floor_mps,
        }
    }

    /// Resolve direction and progress for one match.
    ///
    /// Direction is `None` without a movement bearing or when speed is absent
    /// or below the floor. Travelling more than 90 degrees off the segment
    /// bearing means travelling against the digitized direction.
    pub fn resolve(
        &self,
        road: &RoadFeature,
        snapped: &SnappedPoint,
        movement_bearing: Option<f64>,
        speed: Option<f64>,
    ) -> Resolution {
        Resolution {
            direction: self.direction(road, snapped, movement_bearing, speed),
            progress: snapped.progress,
        }
    }

    pub fn direction(
        &self,
        road: &RoadFeature,
        snapped: &SnappedPoint,
        movement_bearing: Option<f64>,
        speed: Option<f64>,
    ) -> Option<DirectionResult> {
        let movement = movement_bearing?;
        let speed = speed?;
        if speed.is_nan() || speed < self.direction_speed_floor_mps {
            return None;
        }

        let segment = road.bearing_at(snapped)?;
        let raw = if geometry::bearing_difference(movement, segment) > 90.0 {
            road.direction.opposite()
        } else {
            road.direction
        };

        Some(DirectionResult {
            raw,
            label: DirectionLabel::for_road(raw, &road.name),
        })
    }
}
