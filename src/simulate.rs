//! Synthetic drives along a road, used as the simulated sample source.

use crate::error::{TrackerError, TrackerResult};
use crate::map_match::geometry;
use crate::map_match::RoadFeature;
use crate::types::PositionSample;
use geo::{HaversineIntermediate, Point};

#[derive(Clone, Debug)]
pub struct DriveOptions {
    pub speed_mps: f64,
    /// Seconds between samples
    pub interval_s: f64,
    pub start_timestamp: f64,
    /// Drive from the last vertex to the first
    pub against_digitization: bool,
    /// Populate the receiver heading; without it bearing comes from displacement
    pub include_heading: bool,
}

impl Default for DriveOptions {
    fn default() -> Self {
        DriveOptions {
            speed_mps: 80.0 / 3.6,
            interval_s: 1.0,
            start_timestamp: 0.0,
            against_digitization: false,
            include_heading: true,
        }
    }
}

/// Evenly spaced samples along `road` at constant speed.
///
/// The first sample sits on the starting vertex; the last one is the final
/// vertex, which may be closer than a full step.
pub fn drive_along(road: &RoadFeature, options: &DriveOptions) -> TrackerResult<Vec<PositionSample>> {
    if !(options.speed_mps.is_finite() && options.speed_mps > 0.0) {
        return Err(TrackerError::InvalidConfig(format!(
            "drive speed must be positive, got {}",
            options.speed_mps
        )));
    }
    if !(options.interval_s.is_finite() && options.interval_s > 0.0) {
        return Err(TrackerError::InvalidConfig(format!(
            "drive interval must be positive, got {}",
            options.interval_s
        )));
    }
    if let Some(reason) = road.degenerate_reason() {
        return Err(TrackerError::InvalidConfig(format!(
            "cannot drive along road {}: {}",
            road.id, reason
        )));
    }

    let mut vertices: Vec<Point<f64>> = road.geometry.points().collect();
    if options.against_digitization {
        vertices.reverse();
    }

    let step_m = options.speed_mps * options.interval_s;
    let mut samples = Vec::new();
    let mut push = |position: Point<f64>, heading: f64| {
        let timestamp = options.start_timestamp + samples.len() as f64 * options.interval_s;
        let mut sample =
            PositionSample::new(timestamp, position.y(), position.x()).with_speed(options.speed_mps);
        if options.include_heading {
            sample = sample.with_heading(compass(heading));
        }
        samples.push(sample);
    };

    // Distance already covered past the last emitted sample
    let mut carried = 0.0;
    let mut last_heading = 0.0;

    for pair in vertices.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let length = geometry::distance(from, to);
        if length == 0.0 {
            continue;
        }
        last_heading = geometry::bearing(from, to);

        // Offset of the next sample from `from`
        let mut offset = if carried == 0.0 { 0.0 } else { step_m - carried };
        while offset < length {
            push(from.haversine_intermediate(&to, offset / length), last_heading);
            offset += step_m;
        }
        carried = length - (offset - step_m);
    }

    if let Some(end) = vertices.last() {
        push(*end, last_heading);
    }

    Ok(samples)
}

/// Compass heading in [0, 360)
fn compass(bearing: f64) -> f64 {
    bearing.rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_match::RoadDirection;
    use approx::assert_relative_eq;

    fn road() -> RoadFeature {
        // ~1.11 km north, then ~0.91 km east
        RoadFeature::new(
            "R",
            "Test Road",
            vec![(139.0, 35.0), (139.0, 35.01), (139.01, 35.01)],
            RoadDirection::Up,
        )
    }

    #[test]
    fn test_even_spacing_and_timestamps() {
        let options = DriveOptions {
            speed_mps: 25.0,
            interval_s: 2.0,
            start_timestamp: 100.0,
            ..DriveOptions::default()
        };
        let samples = drive_along(&road(), &options).unwrap();

        assert_relative_eq!(samples[0].latitude, 35.0);
        assert_relative_eq!(samples[0].longitude, 139.0);
        assert_relative_eq!(samples[1].timestamp, 102.0);

        // Every full step is 50 m, including across the corner
        for pair in samples[..samples.len() - 1].windows(2) {
            let along = geometry::distance(pair[0].point(), pair[1].point());
            assert!(along <= 50.0 + 1e-6, "step {}", along);
            assert!(along > 30.0, "step {}", along);
        }

        let last = samples.last().unwrap();
        assert_relative_eq!(last.latitude, 35.01);
        assert_relative_eq!(last.longitude, 139.01);
    }

    #[test]
    fn test_headings_follow_geometry() {
        let samples = drive_along(&road(), &DriveOptions::default()).unwrap();
        assert_relative_eq!(samples[0].heading.unwrap(), 0.0, epsilon = 1e-6);
        let last = samples.last().unwrap();
        assert!((last.heading.unwrap() - 90.0).abs() < 0.1);
        assert!(samples.iter().all(|s| s.speed == Some(80.0 / 3.6)));

        let options = DriveOptions {
            against_digitization: true,
            ..DriveOptions::default()
        };
        let samples = drive_along(&road(), &options).unwrap();
        assert!((samples[0].heading.unwrap() - 270.0).abs() < 0.1);
        assert!(samples.iter().all(|s| (0.0..360.0).contains(&s.heading.unwrap())));
        assert_relative_eq!(samples.last().unwrap().latitude, 35.0);
    }

    #[test]
    fn test_without_heading() {
        let options = DriveOptions {
            include_heading: false,
            ..DriveOptions::default()
        };
        let samples = drive_along(&road(), &options).unwrap();
        assert!(samples.iter().all(|s| s.heading.is_none()));
    }

    #[test]
    fn test_rejects_bad_options() {
        let options = DriveOptions {
            speed_mps: 0.0,
            ..DriveOptions::default()
        };
        assert!(drive_along(&road(), &options).is_err());

        let options = DriveOptions {
            interval_s: f64::NAN,
            ..DriveOptions::default()
        };
        assert!(drive_along(&road(), &options).is_err());

        let stub = RoadFeature::new("S", "Stub", vec![(139.0, 35.0)], RoadDirection::Up);
        assert!(drive_along(&stub, &DriveOptions::default()).is_err());
    }
}
