use crate::error::{TrackerError, TrackerResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunable thresholds for matching, direction and POI search.
///
/// Every field has a default, so a config file only needs the values it
/// overrides:
///
/// ```json
/// { "max_snap_distance_m": 300.0, "poi_result_count": 3 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Half-width of the coarse index query box, in degrees
    pub search_radius_deg: f64,
    /// Candidates snapping further than this are rejected
    pub max_snap_distance_m: f64,
    /// Max deviation between movement bearing and either segment orientation
    pub max_bearing_diff_deg: f64,
    /// Receiver heading is trusted only above this speed
    pub heading_speed_floor_mps: f64,
    /// Direction of travel is asserted only at or above this speed
    pub direction_speed_floor_mps: f64,
    /// ETA is reported only above this speed
    pub eta_speed_floor_mps: f64,
    /// Displacement needed to derive a bearing from consecutive live samples
    pub min_displacement_live_m: f64,
    /// Same, for low-noise simulated samples
    pub min_displacement_simulated_m: f64,
    pub simulated_interval_ms: u64,
    pub poi_result_count: usize,
    /// Derive progress from arc length when a road has no per-vertex values
    pub arc_length_progress: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            search_radius_deg: 0.5,
            max_snap_distance_m: 500.0,
            max_bearing_diff_deg: 45.0,
            heading_speed_floor_mps: 1.5,
            direction_speed_floor_mps: 0.5,
            eta_speed_floor_mps: 0.5,
            min_displacement_live_m: 5.0,
            min_displacement_simulated_m: 1.0,
            simulated_interval_ms: 1000,
            poi_result_count: 2,
            arc_length_progress: true,
        }
    }
}

impl TrackerConfig {
    /// Load overrides from a JSON file and validate the result
    pub fn from_file(path: &Path) -> TrackerResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| TrackerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: TrackerConfig = serde_json::from_str(&text)
            .map_err(|e| TrackerError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TrackerResult<()> {
        let thresholds = [
            ("search_radius_deg", self.search_radius_deg),
            ("max_snap_distance_m", self.max_snap_distance_m),
            ("max_bearing_diff_deg", self.max_bearing_diff_deg),
            ("heading_speed_floor_mps", self.heading_speed_floor_mps),
            ("direction_speed_floor_mps", self.direction_speed_floor_mps),
            ("eta_speed_floor_mps", self.eta_speed_floor_mps),
            ("min_displacement_live_m", self.min_displacement_live_m),
            ("min_displacement_simulated_m", self.min_displacement_simulated_m),
        ];

        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(TrackerError::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.max_bearing_diff_deg > 180.0 {
            return Err(TrackerError::InvalidConfig(format!(
                "max_bearing_diff_deg must be at most 180, got {}",
                self.max_bearing_diff_deg
            )));
        }

        if self.poi_result_count == 0 {
            return Err(TrackerError::InvalidConfig(
                "poi_result_count must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
