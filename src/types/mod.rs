use geo::Point;
use serde::{Deserialize, Serialize};

/// One position fix from a sample source.
///
/// `speed` is in m/s and `heading` in compass degrees; either may be absent
/// depending on the receiver. `timestamp` is seconds since the Unix epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub accuracy: f64,
}

impl PositionSample {
    pub fn new(timestamp: f64, latitude: f64, longitude: f64) -> Self {
        PositionSample {
            timestamp,
            latitude,
            longitude,
            speed: None,
            heading: None,
            accuracy: 0.0,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Position as a geo point (x = lon, y = lat)
    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    /// Coordinates are finite and inside WGS84 bounds
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}
