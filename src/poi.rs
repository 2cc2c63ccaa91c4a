use crate::map_match::{RoadDirection, RoadId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Facility available at a service area
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Facility {
    Gas,
    Ev,
    Shop,
    Restaurant,
    Wc,
    Info,
    Cafe,
    Snack,
    Other(String),
}

impl From<String> for Facility {
    fn from(tag: String) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "GAS" => Facility::Gas,
            "EV" => Facility::Ev,
            "SHOP" => Facility::Shop,
            "RESTAURANT" => Facility::Restaurant,
            "WC" => Facility::Wc,
            "INFO" => Facility::Info,
            "CAFE" => Facility::Cafe,
            "SNACK" => Facility::Snack,
            _ => Facility::Other(tag),
        }
    }
}

impl From<Facility> for String {
    fn from(facility: Facility) -> Self {
        facility.to_string()
    }
}

impl Display for Facility {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Facility::Gas => write!(f, "GAS"),
            Facility::Ev => write!(f, "EV"),
            Facility::Shop => write!(f, "SHOP"),
            Facility::Restaurant => write!(f, "RESTAURANT"),
            Facility::Wc => write!(f, "WC"),
            Facility::Info => write!(f, "INFO"),
            Facility::Cafe => write!(f, "CAFE"),
            Facility::Snack => write!(f, "SNACK"),
            Facility::Other(tag) => write!(f, "{}", tag),
        }
    }
}

/// Service or parking area on a road, located by kilopost
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceArea {
    pub id: String,
    pub road_id: RoadId,
    pub kp: f64,
    pub name: String,
    #[serde(default)]
    pub facilities: Vec<Facility>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A service area ahead of the vehicle
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NextPoi {
    pub poi: ServiceArea,
    /// Kilometres along the road, never negative
    pub distance_km: f64,
    /// Minutes at the current speed; `None` when too slow to estimate
    pub eta_minutes: Option<f64>,
}

/// Read-only service areas grouped by road
#[derive(Clone, Debug, Default)]
pub struct PoiCatalog {
    by_road: HashMap<RoadId, Vec<ServiceArea>>,
    count: usize,
}

impl PoiCatalog {
    pub fn new(areas: Vec<ServiceArea>) -> Self {
        let count = areas.len();
        let mut by_road: HashMap<RoadId, Vec<ServiceArea>> = HashMap::new();
        for area in areas {
            by_road.entry(area.road_id.clone()).or_default().push(area);
        }

        PoiCatalog { by_road, count }
    }

    pub fn on_road(&self, road_id: &RoadId) -> &[ServiceArea] {
        self.by_road.get(road_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Nearest-ahead search over a `PoiCatalog`
#[derive(Clone, Copy, Debug)]
pub struct ForwardSearch {
    pub result_count: usize,
    pub eta_speed_floor_mps: f64,
}

impl ForwardSearch {
    pub fn new(result_count: usize, eta_speed_floor_mps: f64) -> Self {
        ForwardSearch {
            result_count,
            eta_speed_floor_mps,
        }
    }

    /// Next service areas ahead on `road_id`, nearest first.
    ///
    /// Empty when progress or direction is unknown. "Ahead" means a larger
    /// kilopost when travelling `Down` and a smaller one when travelling `Up`.
    pub fn find_next(
        &self,
        catalog: &PoiCatalog,
        road_id: &RoadId,
        progress: Option<f64>,
        direction: Option<RoadDirection>,
        speed: Option<f64>,
    ) -> Vec<NextPoi> {
        let (current, direction) = match (progress, direction) {
            (Some(p), Some(d)) => (p, d),
            _ => return Vec::new(),
        };
        let increasing = direction.progress_increasing();

        let mut ahead: Vec<(&ServiceArea, f64)> = catalog
            .on_road(road_id)
            .iter()
            .filter(|area| {
                if increasing {
                    area.kp > current
                } else {
                    area.kp < current
                }
            })
            .map(|area| (area, (area.kp - current).abs()))
            .collect();

        ahead.sort_by(|a, b| a.1.total_cmp(&b.1));
        ahead.truncate(self.result_count);

        ahead
            .into_iter()
            .map(|(area, distance_km)| NextPoi {
                poi: area.clone(),
                distance_km,
                eta_minutes: self.eta_minutes(distance_km, speed),
            })
            .collect()
    }

    /// Minutes to cover `distance_km`, or `None` at or below the speed floor
    pub fn eta_minutes(&self, distance_km: f64, speed: Option<f64>) -> Option<f64> {
        let speed = speed?;
        if speed > self.eta_speed_floor_mps {
            Some(distance_km * 1000.0 / speed / 60.0)
        } else {
            None
        }
    }
}
