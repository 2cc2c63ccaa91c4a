//! Loading of the road network and service-area datasets.
//!
//! Roads come from a GeoJSON `FeatureCollection` of `LineString` features:
//!
//! ```json
//! { "type": "Feature",
//!   "geometry": { "type": "LineString", "coordinates": [[139.7, 35.6], [139.8, 35.7]] },
//!   "properties": { "id": "E1-up", "name": "Tomei Expressway", "dir": "up",
//!                   "kp": [0.0, 12.4] } }
//! ```
//!
//! `kp` is optional and may contain `null` for vertices without a kilopost.
//! Service areas come from a JSON array of
//! `{ "id", "road_id", "kp", "name", "facilities", "url" }` objects.
//!
//! Either file may be gzip-compressed (`.gz`). Individual malformed records
//! are skipped with a warning; an unreadable file or a file with no usable
//! records is an initialization error.

use crate::error::{TrackerError, TrackerResult};
use crate::map_match::{RoadDirection, RoadFeature, RoadId};
use crate::poi::{Facility, ServiceArea};
use flate2::read::GzDecoder;
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Roads and service areas ready for the engine
#[derive(Clone, Debug)]
pub struct Dataset {
    pub roads: Vec<RoadFeature>,
    pub service_areas: Vec<ServiceArea>,
}

impl Dataset {
    pub fn load(roads_path: &Path, service_areas_path: &Path) -> TrackerResult<Self> {
        let roads = load_roads(roads_path)?;
        let service_areas = load_service_areas(service_areas_path)?;
        info!(
            "Loaded {} road(s) from {} and {} service area(s) from {}",
            roads.len(),
            roads_path.display(),
            service_areas.len(),
            service_areas_path.display()
        );
        Ok(Dataset {
            roads,
            service_areas,
        })
    }
}

/// Identifiers may be strings or integers in the source data
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFeatureCollection {
    features: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawRoadFeature {
    geometry: RawGeometry,
    properties: RawRoadProperties,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawGeometry {
    LineString { coordinates: Vec<Vec<f64>> },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct RawRoadProperties {
    id: RawId,
    #[serde(default)]
    name: Option<String>,
    dir: RoadDirection,
    #[serde(default)]
    kp: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct RawServiceArea {
    id: RawId,
    road_id: RawId,
    kp: f64,
    name: String,
    #[serde(default)]
    facilities: Vec<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Read a whole file, transparently un-gzipping `.gz` paths
pub(crate) fn read_text(path: &Path) -> TrackerResult<String> {
    let io_err = |source: std::io::Error| TrackerError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut text = String::new();
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let mut reader = BufReader::new(GzDecoder::new(file));
        reader.read_to_string(&mut text).map_err(io_err)?;
    } else {
        let mut reader = BufReader::new(file);
        reader.read_to_string(&mut text).map_err(io_err)?;
    }
    Ok(text)
}

pub fn load_roads(path: &Path) -> TrackerResult<Vec<RoadFeature>> {
    let text = read_text(path)?;
    parse_roads(&text, path)
}

pub fn load_service_areas(path: &Path) -> TrackerResult<Vec<ServiceArea>> {
    let text = read_text(path)?;
    parse_service_areas(&text, path)
}

/// Parse a GeoJSON road collection; `origin` is used in diagnostics only
pub fn parse_roads(json: &str, origin: &Path) -> TrackerResult<Vec<RoadFeature>> {
    let collection: RawFeatureCollection =
        serde_json::from_str(json).map_err(|e| format_error(origin, e.to_string()))?;

    let mut roads = Vec::with_capacity(collection.features.len());
    for (position, value) in collection.features.into_iter().enumerate() {
        match road_from_value(value) {
            Ok(road) => roads.push(road),
            Err(reason) => warn!(
                "{}: skipping road feature #{}: {}",
                origin.display(),
                position,
                reason
            ),
        }
    }

    if roads.is_empty() {
        return Err(TrackerError::EmptyDataset("road"));
    }
    Ok(roads)
}

/// Parse a JSON array of service areas; `origin` is used in diagnostics only
pub fn parse_service_areas(json: &str, origin: &Path) -> TrackerResult<Vec<ServiceArea>> {
    let records: Vec<Value> =
        serde_json::from_str(json).map_err(|e| format_error(origin, e.to_string()))?;

    let mut areas = Vec::with_capacity(records.len());
    for (position, value) in records.into_iter().enumerate() {
        match service_area_from_value(value) {
            Ok(area) => areas.push(area),
            Err(reason) => warn!(
                "{}: skipping service area #{}: {}",
                origin.display(),
                position,
                reason
            ),
        }
    }

    if areas.is_empty() {
        return Err(TrackerError::EmptyDataset("service area"));
    }
    Ok(areas)
}

fn format_error(origin: &Path, reason: String) -> TrackerError {
    TrackerError::DatasetFormat {
        path: PathBuf::from(origin),
        reason,
    }
}

fn road_from_value(value: Value) -> Result<RoadFeature, String> {
    let raw: RawRoadFeature = serde_json::from_value(value).map_err(|e| e.to_string())?;
    let id = raw.properties.id.into_string();

    let coordinates = match raw.geometry {
        RawGeometry::LineString { coordinates } => coordinates,
        RawGeometry::Unsupported => return Err(format!("road {}: geometry is not a LineString", id)),
    };

    let mut coords = Vec::with_capacity(coordinates.len());
    for position in &coordinates {
        match position.as_slice() {
            [lon, lat, ..]
                if lon.is_finite()
                    && lat.is_finite()
                    && (-180.0..=180.0).contains(lon)
                    && (-90.0..=90.0).contains(lat) =>
            {
                coords.push((*lon, *lat))
            }
            other => return Err(format!("road {}: invalid position {:?}", id, other)),
        }
    }

    let mut road = RoadFeature::new(
        id,
        raw.properties.name.unwrap_or_default(),
        coords,
        raw.properties.dir,
    );
    if let Some(kp) = raw.properties.kp {
        if kp.iter().flatten().any(|v| !v.is_finite()) {
            return Err(format!("road {}: non-finite kilopost", road.id));
        }
        road = road.with_vertex_progress(kp);
    }

    if let Some(reason) = road.degenerate_reason() {
        return Err(format!("road {}: {}", road.id, reason));
    }
    Ok(road)
}

fn service_area_from_value(value: Value) -> Result<ServiceArea, String> {
    let raw: RawServiceArea = serde_json::from_value(value).map_err(|e| e.to_string())?;
    let id = raw.id.into_string();

    if !raw.kp.is_finite() {
        return Err(format!("service area {}: non-finite kp", id));
    }

    Ok(ServiceArea {
        id,
        road_id: RoadId::new(raw.road_id.into_string()),
        kp: raw.kp,
        name: raw.name,
        facilities: raw.facilities.into_iter().map(Facility::from).collect(),
        url: raw.url.filter(|u| !u.trim().is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const ROADS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[139.70, 35.60], [139.71, 35.61, 12.0]]},
                "properties": {"id": "E1-up", "name": "Tomei Expressway", "dir": "up"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[139.70, 35.60], [139.71, 35.61], [139.72, 35.61]]},
                "properties": {"id": 42, "name": "Shuto C1 内回り", "dir": "down", "kp": [0.0, null, 2.5]}
            },
            {
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[139.70, 35.60]]},
                "properties": {"id": "stub", "dir": "up"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [139.70, 35.60]},
                "properties": {"id": "point", "dir": "up"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[139.70, 35.60], [139.71, 35.61]]},
                "properties": {"id": "nodir"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[139.70, 35.60], [139.71, 35.61]]},
                "properties": {"id": "badkp", "dir": "up", "kp": [1.0]}
            },
            {"type": "Feature", "geometry": null, "properties": {"id": "nogeom", "dir": "up"}}
        ]
    }"#;

    const AREAS: &str = r#"[
        {"id": "sa1", "road_id": "E1-up", "kp": 12.5, "name": "Ebina SA",
         "facilities": ["GAS", "EV", "WC"], "url": "https://example.com/ebina"},
        {"id": 7, "road_id": 42, "kp": 0.0, "name": "Shibaura PA", "url": ""},
        {"id": "bad", "road_id": "E1-up", "name": "No kp"},
        {"road_id": "E1-up", "kp": 3.0, "name": "No id"}
    ]"#;

    #[test]
    fn test_parse_roads_skips_malformed() {
        let roads = parse_roads(ROADS, Path::new("roads.geojson")).unwrap();
        assert_eq!(roads.len(), 2);

        assert_eq!(roads[0].id.as_str(), "E1-up");
        assert_eq!(roads[0].direction, RoadDirection::Up);
        assert_eq!(roads[0].geometry.0.len(), 2);
        assert!(roads[0].vertex_progress.is_none());

        assert_eq!(roads[1].id.as_str(), "42");
        assert_eq!(roads[1].direction, RoadDirection::Down);
        assert_eq!(
            roads[1].vertex_progress,
            Some(vec![Some(0.0), None, Some(2.5)])
        );
    }

    #[test]
    fn test_parse_roads_fatal_cases() {
        let origin = Path::new("roads.geojson");
        assert!(matches!(
            parse_roads("not json", origin),
            Err(TrackerError::DatasetFormat { .. })
        ));
        assert!(matches!(
            parse_roads(r#"{"type": "FeatureCollection"}"#, origin),
            Err(TrackerError::DatasetFormat { .. })
        ));
        assert!(matches!(
            parse_roads(r#"{"type": "FeatureCollection", "features": []}"#, origin),
            Err(TrackerError::EmptyDataset("road"))
        ));
    }

    #[test]
    fn test_parse_service_areas() {
        let areas = parse_service_areas(AREAS, Path::new("sapas.json")).unwrap();
        assert_eq!(areas.len(), 2);

        assert_eq!(areas[0].road_id.as_str(), "E1-up");
        assert_eq!(areas[0].facilities, vec![Facility::Gas, Facility::Ev, Facility::Wc]);
        assert_eq!(areas[0].url.as_deref(), Some("https://example.com/ebina"));

        assert_eq!(areas[1].id, "7");
        assert_eq!(areas[1].road_id.as_str(), "42");
        assert_eq!(areas[1].kp, 0.0);
        assert!(areas[1].facilities.is_empty());
        assert!(areas[1].url.is_none());
    }

    #[test]
    fn test_parse_service_areas_fatal_cases() {
        let origin = Path::new("sapas.json");
        assert!(matches!(
            parse_service_areas(r#"{"not": "an array"}"#, origin),
            Err(TrackerError::DatasetFormat { .. })
        ));
        assert!(matches!(
            parse_service_areas("[]", origin),
            Err(TrackerError::EmptyDataset("service area"))
        ));
    }

    #[test]
    fn test_load_plain_and_gzip() {
        let dir = std::env::temp_dir().join(format!("sapa_tracker_dataset_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let roads_path = dir.join("roads.geojson.gz");
        let mut encoder = GzEncoder::new(File::create(&roads_path).unwrap(), Compression::default());
        encoder.write_all(ROADS.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let areas_path = dir.join("sapas.json");
        std::fs::write(&areas_path, AREAS).unwrap();

        let dataset = Dataset::load(&roads_path, &areas_path).unwrap();
        assert_eq!(dataset.roads.len(), 2);
        assert_eq!(dataset.service_areas.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file() {
        let missing = Path::new("/definitely/not/here/roads.geojson");
        assert!(matches!(load_roads(missing), Err(TrackerError::Io { .. })));
    }
}
