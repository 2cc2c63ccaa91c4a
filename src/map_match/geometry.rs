//! Geodesic helpers used by the matcher and the direction resolver.
//!
//! Coordinates follow the geo crate convention: `x` is longitude and `y` is
//! latitude, both in degrees. Distances are haversine metres; bearings are
//! degrees in (-180, 180] with north at 0 and east at 90.

use geo::{Coord, HaversineBearing, HaversineDistance, LineString, Point};
use serde::Serialize;

/// Mean earth radius used for the local tangent-plane projection
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Closest point of a line string to a query position
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SnappedPoint {
    /// Snapped coordinate as (lon, lat)
    pub coord: (f64, f64),
    /// Index of the segment `coords[i]..coords[i + 1]` the snap fell on
    pub segment_index: usize,
    /// Projection parameter on that segment, clamped to [0, 1]
    pub segment_fraction: f64,
    /// Haversine distance from the query position, metres
    pub distance_m: f64,
    /// Arc length from the first vertex to the snap, kilometres
    pub arc_length_km: f64,
    /// Progress measure at the snap; `None` when the road cannot report it
    pub progress: Option<f64>,
}

impl SnappedPoint {
    pub fn point(&self) -> Point<f64> {
        Point::new(self.coord.0, self.coord.1)
    }
}

/// Surface distance between two positions in metres
pub fn distance(a: Point<f64>, b: Point<f64>) -> f64 {
    a.haversine_distance(&b)
}

/// Initial bearing from `a` to `b`, in (-180, 180]
pub fn bearing(a: Point<f64>, b: Point<f64>) -> f64 {
    normalize_bearing(a.haversine_bearing(b))
}

/// Wrap any angle into (-180, 180]
pub fn normalize_bearing(degrees: f64) -> f64 {
    let mut wrapped = degrees % 360.0;
    if wrapped > 180.0 {
        wrapped -= 360.0;
    }
    if wrapped <= -180.0 {
        wrapped += 360.0;
    }
    wrapped
}

/// Unsigned angular difference between two bearings, in [0, 180]
pub fn bearing_difference(a: f64, b: f64) -> f64 {
    normalize_bearing(a - b).abs()
}

/// Bearing of segment `index` of the line, clamped to the last segment
pub fn segment_bearing(line: &LineString<f64>, index: usize) -> Option<f64> {
    let coords = &line.0;
    if coords.len() < 2 {
        return None;
    }
    let i = index.min(coords.len() - 2);
    Some(bearing(Point::from(coords[i]), Point::from(coords[i + 1])))
}

/// Orthogonal projection of `point` onto the nearest segment of `line`.
///
/// Each segment is projected in a local tangent plane centred on the query
/// position, with the projection parameter clamped to [0, 1]. The winning
/// segment is the one whose snapped coordinate has the smallest haversine
/// distance; the first minimum wins ties.
///
/// Returns `None` for lines with fewer than two vertices. The returned
/// `progress` is the arc length; callers with dataset-provided progress
/// values replace it.
pub fn nearest_point_on_line(line: &LineString<f64>, point: Point<f64>) -> Option<SnappedPoint> {
    let coords = &line.0;
    if coords.len() < 2 {
        return None;
    }

    // metres per degree
    let lat_scale = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
    let lon_scale = lat_scale * point.y().to_radians().cos();
    let to_local = |c: &Coord<f64>| ((c.x - point.x()) * lon_scale, (c.y - point.y()) * lat_scale);

    let mut best: Option<(usize, f64, Coord<f64>, f64)> = None;

    for (i, window) in coords.windows(2).enumerate() {
        let (a, b) = (&window[0], &window[1]);
        let (ax, ay) = to_local(a);
        let (bx, by) = to_local(b);
        let (dx, dy) = (bx - ax, by - ay);
        let length_sq = dx * dx + dy * dy;

        let t = if length_sq < 1e-12 {
            0.0
        } else {
            // Query point is the origin of the local frame
            ((-ax * dx - ay * dy) / length_sq).clamp(0.0, 1.0)
        };

        let snapped = Coord {
            x: a.x + t * (b.x - a.x),
            y: a.y + t * (b.y - a.y),
        };
        let dist = distance(point, Point::from(snapped));

        match best {
            Some((_, _, _, best_dist)) if dist >= best_dist => {}
            _ => best = Some((i, t, snapped, dist)),
        }
    }

    let (segment_index, segment_fraction, snapped, distance_m) = best?;

    let preceding_m: f64 = coords[..=segment_index]
        .windows(2)
        .map(|w| distance(Point::from(w[0]), Point::from(w[1])))
        .sum();
    let partial_m = distance(Point::from(coords[segment_index]), Point::from(snapped));
    let arc_length_km = (preceding_m + partial_m) / 1000.0;

    Some(SnappedPoint {
        coord: (snapped.x, snapped.y),
        segment_index,
        segment_fraction,
        distance_m,
        arc_length_km,
        progress: Some(arc_length_km),
    })
}

/// Total haversine length of a line string in kilometres
pub fn line_length_km(line: &LineString<f64>) -> f64 {
    line.0
        .windows(2)
        .map(|w| distance(Point::from(w[0]), Point::from(w[1])))
        .sum::<f64>()
        / 1000.0
}
