use super::{RoadFeature, RoadId};
use geo::{Coord, LineString, Point};
use log::{debug, warn};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;

/// Bounding-box entry pointing back at a feature slot
#[derive(Clone, Debug)]
pub struct IndexedRoad {
    pub slot: usize,
    pub envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedRoad {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Axis-aligned query box in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Square box centred on `point` with the given half-width
    pub fn around(point: Point<f64>, half_width_deg: f64) -> Self {
        BoundingBox {
            min_lon: point.x() - half_width_deg,
            min_lat: point.y() - half_width_deg,
            max_lon: point.x() + half_width_deg,
            max_lat: point.y() + half_width_deg,
        }
    }

    fn to_aabb(self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_lon, self.min_lat], [self.max_lon, self.max_lat])
    }
}

/// R-Tree over road bounding boxes for coarse candidate lookup
///
/// # Architecture
/// - Owns every indexed `RoadFeature`; the tree stores envelopes + slots
/// - Built once; a rebuilt network replaces the whole index
/// - Queries return loose candidates; exact distance checks happen in the matcher
///
/// # Usage
/// ```no_run
/// use sapa_tracker::map_match::{BoundingBox, RoadNetworkIndex};
/// use geo::Point;
///
/// let index = RoadNetworkIndex::build(vec![/* features */]);
/// let bbox = BoundingBox::around(Point::new(139.7, 35.6), 0.5);
/// for road in index.query(&bbox) {
///     println!("{} {}", road.id, road.name);
/// }
/// ```
pub struct RoadNetworkIndex {
    tree: RTree<IndexedRoad>,
    features: Vec<RoadFeature>,
    slots: HashMap<RoadId, usize>,
}

impl RoadNetworkIndex {
    /// Index every usable feature.
    ///
    /// Degenerate geometries and duplicate ids are skipped with a warning;
    /// neither aborts the build.
    pub fn build(features: Vec<RoadFeature>) -> Self {
        let mut kept: Vec<RoadFeature> = Vec::with_capacity(features.len());
        let mut slots = HashMap::with_capacity(features.len());

        for feature in features {
            if let Some(reason) = feature.degenerate_reason() {
                warn!("Skipping road {} ({}): {}", feature.id, feature.name, reason);
                continue;
            }
            if slots.contains_key(&feature.id) {
                warn!("Skipping road {} ({}): duplicate id", feature.id, feature.name);
                continue;
            }
            slots.insert(feature.id.clone(), kept.len());
            kept.push(feature);
        }

        let entries: Vec<IndexedRoad> = kept
            .iter()
            .enumerate()
            .map(|(slot, feature)| IndexedRoad {
                slot,
                envelope: compute_envelope(&feature.geometry),
            })
            .collect();

        debug!("Indexed {} road feature(s)", entries.len());

        RoadNetworkIndex {
            tree: RTree::bulk_load(entries),
            features: kept,
            slots,
        }
    }

    /// Features whose bounding boxes intersect `bbox`, in dataset order
    pub fn query(&self, bbox: &BoundingBox) -> Vec<&RoadFeature> {
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&bbox.to_aabb())
            .map(|entry| entry.slot)
            .collect();
        hits.sort_unstable();

        hits.into_iter().map(|slot| &self.features[slot]).collect()
    }

    /// Ids of the features intersecting `bbox`, in dataset order
    pub fn query_ids(&self, bbox: &BoundingBox) -> Vec<RoadId> {
        self.query(bbox).into_iter().map(|f| f.id.clone()).collect()
    }

    pub fn get(&self, id: &RoadId) -> Option<&RoadFeature> {
        self.slots.get(id).map(|&slot| &self.features[slot])
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Compute bounding box (envelope) for a LineString
fn compute_envelope(line_string: &LineString<f64>) -> AABB<[f64; 2]> {
    let coords: Vec<&Coord<f64>> = line_string.coords().collect();

    let (mut min_lon, mut max_lon, mut min_lat, mut max_lat) = (
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
    );

    for coord in coords {
        min_lon = min_lon.min(coord.x);
        max_lon = max_lon.max(coord.x);
        min_lat = min_lat.min(coord.y);
        max_lat = max_lat.max(coord.y);
    }

    AABB::from_corners([min_lon, min_lat], [max_lon, max_lat])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_match::RoadDirection;

    fn make_test_road(id: &str, coords: Vec<(f64, f64)>) -> RoadFeature {
        RoadFeature::new(id, format!("Road {}", id), coords, RoadDirection::Up)
    }

    fn ids(roads: Vec<&RoadFeature>) -> Vec<&str> {
        roads.into_iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_build_skips_degenerate() {
        let index = RoadNetworkIndex::build(vec![
            make_test_road("1", vec![(139.70, 35.60), (139.71, 35.61)]),
            make_test_road("2", vec![(139.72, 35.62)]),
            make_test_road("3", vec![]),
            make_test_road("4", vec![(139.80, 35.70), (139.81, 35.71)]),
        ]);

        assert_eq!(index.len(), 2);
        assert!(index.get(&RoadId::new("1")).is_some());
        assert!(index.get(&RoadId::new("2")).is_none());
        assert!(index.get(&RoadId::new("3")).is_none());
    }

    #[test]
    fn test_build_skips_duplicate_ids() {
        let index = RoadNetworkIndex::build(vec![
            make_test_road("1", vec![(139.70, 35.60), (139.71, 35.61)]),
            make_test_road("1", vec![(140.70, 36.60), (140.71, 36.61)]),
        ]);

        assert_eq!(index.len(), 1);
        let kept = index.get(&RoadId::new("1")).unwrap();
        assert_eq!(kept.geometry.0[0].x, 139.70);
    }

    #[test]
    fn test_query_box() {
        let index = RoadNetworkIndex::build(vec![
            make_test_road("near", vec![(139.70, 35.60), (139.71, 35.61)]),
            make_test_road("mid", vec![(139.95, 35.80), (139.96, 35.81)]),
            make_test_road("far", vec![(141.00, 37.00), (141.01, 37.01)]),
        ]);

        let bbox = BoundingBox::around(Point::new(139.70, 35.60), 0.5);
        assert_eq!(ids(index.query(&bbox)), vec!["near", "mid"]);

        let bbox = BoundingBox::around(Point::new(139.70, 35.60), 0.01);
        assert_eq!(ids(index.query(&bbox)), vec!["near"]);

        let bbox = BoundingBox::around(Point::new(130.0, 30.0), 0.5);
        assert!(index.query(&bbox).is_empty());
    }

    #[test]
    fn test_query_returns_box_overlap_not_line_overlap() {
        // Diagonal road whose envelope covers the query but whose line does not
        let index = RoadNetworkIndex::build(vec![make_test_road(
            "diag",
            vec![(139.0, 35.0), (139.1, 35.1)],
        )]);
        let bbox = BoundingBox::around(Point::new(139.09, 35.01), 0.001);
        assert_eq!(index.query_ids(&bbox), vec![RoadId::new("diag")]);
    }

    #[test]
    fn test_query_order_is_dataset_order() {
        let roads: Vec<RoadFeature> = (0..50)
            .map(|i| {
                let offset = i as f64 * 0.001;
                make_test_road(
                    &format!("{:02}", i),
                    vec![(139.70 + offset, 35.60), (139.70 + offset, 35.61)],
                )
            })
            .collect();
        let index = RoadNetworkIndex::build(roads);

        let bbox = BoundingBox::around(Point::new(139.725, 35.605), 0.5);
        let found = index.query_ids(&bbox);
        assert_eq!(found.len(), 50);
        let mut sorted = found.clone();
        sorted.sort();
        assert_eq!(found, sorted);
    }

    #[test]
    fn test_empty_index() {
        let index = RoadNetworkIndex::build(Vec::new());
        assert!(index.is_empty());
        let bbox = BoundingBox::around(Point::new(139.7, 35.6), 0.5);
        assert!(index.query(&bbox).is_empty());
    }
}
