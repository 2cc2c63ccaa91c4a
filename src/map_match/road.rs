use super::geometry::{self, SnappedPoint};
use geo::{Coord, LineString, Point};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Dataset identifier of a road feature
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoadId(pub String);

impl RoadId {
    pub fn new(id: impl Into<String>) -> Self {
        RoadId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoadId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction tag of a carriageway.
///
/// Used both for the digitized direction of a geometry and for the actual
/// direction of travel. `Down` runs with increasing kilopost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadDirection {
    Up,
    Down,
}

impl RoadDirection {
    pub fn opposite(self) -> Self {
        match self {
            RoadDirection::Up => RoadDirection::Down,
            RoadDirection::Down => RoadDirection::Up,
        }
    }

    pub fn progress_increasing(self) -> bool {
        self == RoadDirection::Down
    }
}

impl Display for RoadDirection {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            RoadDirection::Up => write!(f, "up"),
            RoadDirection::Down => write!(f, "down"),
        }
    }
}

/// A digitized road (one carriageway) with optional kilopost per vertex
#[derive(Clone, Debug)]
pub struct RoadFeature {
    pub id: RoadId,
    pub name: String,
    pub geometry: LineString<f64>,
    pub direction: RoadDirection,
    /// Kilopost of each vertex; same length as the geometry when present
    pub vertex_progress: Option<Vec<Option<f64>>>,
}

impl RoadFeature {
    /// Build a feature from (lon, lat) pairs
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        coords: Vec<(f64, f64)>,
        direction: RoadDirection,
    ) -> Self {
        let points: Vec<Coord<f64>> = coords
            .into_iter()
            .map(|(lon, lat)| Coord { x: lon, y: lat })
            .collect();

        RoadFeature {
            id: RoadId::new(id),
            name: name.into(),
            geometry: LineString::new(points),
            direction,
            vertex_progress: None,
        }
    }

    pub fn with_vertex_progress(mut self, progress: Vec<Option<f64>>) -> Self {
        self.vertex_progress = Some(progress);
        self
    }

    /// Reason this feature cannot be indexed, if any
    pub fn degenerate_reason(&self) -> Option<String> {
        let coords = &self.geometry.0;
        if coords.len() < 2 {
            return Some(format!("geometry has {} point(s), need at least 2", coords.len()));
        }
        if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Some("geometry has non-finite coordinates".to_string());
        }
        if let Some(progress) = &self.vertex_progress {
            if progress.len() != coords.len() {
                return Some(format!(
                    "{} kilopost values for {} vertices",
                    progress.len(),
                    coords.len()
                ));
            }
        }
        None
    }

    /// Snap a position onto this road and attach its progress value.
    ///
    /// With per-vertex kilopost the progress interpolates between the two
    /// vertices of the snapped segment and is `None` if either is missing.
    /// Without it, progress is the arc length when `arc_length_fallback` is
    /// set and `None` otherwise.
    pub fn snap(&self, point: Point<f64>, arc_length_fallback: bool) -> Option<SnappedPoint> {
        let mut snapped = geometry::nearest_point_on_line(&self.geometry, point)?;

        snapped.progress = match &self.vertex_progress {
            Some(values) => {
                let i = snapped.segment_index;
                match (values.get(i).copied().flatten(), values.get(i + 1).copied().flatten()) {
                    (Some(start), Some(end)) => {
                        Some(start + (end - start) * snapped.segment_fraction)
                    }
                    _ => None,
                }
            }
            None if arc_length_fallback => Some(snapped.arc_length_km),
            None => None,
        };

        Some(snapped)
    }

    /// Bearing of the segment a snap fell on
    pub fn bearing_at(&self, snapped: &SnappedPoint) -> Option<f64> {
        geometry::segment_bearing(&self.geometry, snapped.segment_index)
    }

    pub fn length_km(&self) -> f64 {
        geometry::line_length_km(&self.geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn north_road() -> RoadFeature {
        RoadFeature::new(
            "r1",
            "Test Expressway",
            vec![(139.0, 35.0), (139.0, 35.01), (139.0, 35.02)],
            RoadDirection::Down,
        )
    }

    #[test]
    fn test_direction_serde() {
        let dir: RoadDirection = serde_json::from_str("\"up\"").unwrap();
        assert_eq!(dir, RoadDirection::Up);
        assert_eq!(serde_json::to_string(&RoadDirection::Down).unwrap(), "\"down\"");
        assert!(serde_json::from_str::<RoadDirection>("\"sideways\"").is_err());
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(RoadDirection::Up.opposite(), RoadDirection::Down);
        assert_eq!(RoadDirection::Down.opposite().opposite(), RoadDirection::Down);
        assert!(RoadDirection::Down.progress_increasing());
        assert!(!RoadDirection::Up.progress_increasing());
    }

    #[test]
    fn test_degenerate_reason() {
        assert!(north_road().degenerate_reason().is_none());

        let single = RoadFeature::new("r2", "Stub", vec![(139.0, 35.0)], RoadDirection::Up);
        assert!(single.degenerate_reason().is_some());

        let nan = RoadFeature::new(
            "r3",
            "Broken",
            vec![(139.0, 35.0), (f64::NAN, 35.0)],
            RoadDirection::Up,
        );
        assert!(nan.degenerate_reason().is_some());

        let mismatched = north_road().with_vertex_progress(vec![Some(0.0), Some(1.0)]);
        assert!(mismatched.degenerate_reason().is_some());
    }

    #[test]
    fn test_snap_arc_length_progress() {
        let road = north_road();
        let snap = road.snap(Point::new(139.0005, 35.015), true).unwrap();
        assert_eq!(snap.segment_index, 1);
        assert_relative_eq!(snap.progress.unwrap(), snap.arc_length_km);
        assert!((snap.progress.unwrap() - 1.668).abs() < 0.01);

        let snap = road.snap(Point::new(139.0005, 35.015), false).unwrap();
        assert_eq!(snap.progress, None);
    }

    #[test]
    fn test_snap_vertex_progress_interpolation() {
        let road = north_road().with_vertex_progress(vec![Some(100.0), Some(101.0), Some(102.0)]);
        let snap = road.snap(Point::new(139.0, 35.015), false).unwrap();
        assert_relative_eq!(snap.progress.unwrap(), 101.5, epsilon = 1e-3);

        // zero is a real kilopost, not a missing one
        let road = north_road().with_vertex_progress(vec![Some(0.0), Some(0.0), Some(1.0)]);
        let snap = road.snap(Point::new(139.0, 35.005), true).unwrap();
        assert_eq!(snap.progress, Some(0.0));
    }

    #[test]
    fn test_snap_vertex_progress_gap() {
        let road = north_road().with_vertex_progress(vec![Some(10.0), None, Some(12.0)]);
        let snap = road.snap(Point::new(139.0, 35.015), true).unwrap();
        assert_eq!(snap.progress, None);
    }

    #[test]
    fn test_bearing_at() {
        let road = north_road();
        let snap = road.snap(Point::new(139.0, 35.005), true).unwrap();
        assert_relative_eq!(road.bearing_at(&snap).unwrap(), 0.0, epsilon = 1e-6);
    }
}
