use crate::config::TrackerConfig;
use crate::dataset::Dataset;
use crate::error::{TrackerError, TrackerResult};
use crate::map_match::{
    DirectionResolver, DirectionResult, MovementBearing, RoadFeature, RoadId, RoadMatcher,
    RoadNetworkIndex,
};
use crate::poi::{ForwardSearch, NextPoi, PoiCatalog, ServiceArea};
use crate::types::PositionSample;
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;

/// Road-level part of a matched report
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoadReport {
    pub road_id: RoadId,
    pub road_name: String,
    pub snap_distance_m: f64,
    pub snapped: (f64, f64),
    pub movement: Option<MovementBearing>,
    pub direction: Option<DirectionResult>,
    /// Kilopost at the snap; `None` means the road cannot report progress
    pub progress_km: Option<f64>,
    pub next_pois: Vec<NextPoi>,
    pub poi_status: PoiStatus,
}

/// Why a matched report has no service areas listed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiStatus {
    Listed,
    NoneAhead,
    ProgressUnknown,
    DirectionUnknown,
}

impl PoiStatus {
    pub fn classify(
        progress_km: Option<f64>,
        direction: Option<&DirectionResult>,
        next_pois: &[NextPoi],
    ) -> Self {
        if progress_km.is_none() {
            PoiStatus::ProgressUnknown
        } else if direction.is_none() {
            PoiStatus::DirectionUnknown
        } else if next_pois.is_empty() {
            PoiStatus::NoneAhead
        } else {
            PoiStatus::Listed
        }
    }
}

/// Outcome of processing one sample
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrackingReport {
    Matched(RoadReport),
    /// No road within reach, or every candidate failed distance/bearing checks
    Unmatched,
    /// Datasets are not loaded (yet)
    DataUnavailable,
    /// The sample source failed; live tracking stops
    SourceError { message: String },
}

impl TrackingReport {
    pub fn road(&self) -> Option<&RoadReport> {
        match self {
            TrackingReport::Matched(road) => Some(road),
            _ => None,
        }
    }
}

/// Immutable matching pipeline: index, resolver, POI search.
///
/// Shared behind an `Arc`; a new dataset means a new engine.
pub struct TrackerEngine {
    config: TrackerConfig,
    matcher: RoadMatcher,
    resolver: DirectionResolver,
    search: ForwardSearch,
    catalog: PoiCatalog,
}

impl TrackerEngine {
    pub fn new(
        roads: Vec<RoadFeature>,
        service_areas: Vec<ServiceArea>,
        config: TrackerConfig,
    ) -> TrackerResult<Self> {
        config.validate()?;

        let index = RoadNetworkIndex::build(roads);
        if index.is_empty() {
            return Err(TrackerError::EmptyDataset("road"));
        }
        if service_areas.is_empty() {
            return Err(TrackerError::EmptyDataset("service area"));
        }

        let catalog = PoiCatalog::new(service_areas);
        info!(
            "Engine ready: {} road(s), {} service area(s)",
            index.len(),
            catalog.len()
        );

        Ok(TrackerEngine {
            matcher: RoadMatcher::new(Arc::new(index), (&config).into()),
            resolver: DirectionResolver::new(config.direction_speed_floor_mps),
            search: ForwardSearch::new(config.poi_result_count, config.eta_speed_floor_mps),
            catalog,
            config,
        })
    }

    pub fn from_dataset(dataset: Dataset, config: TrackerConfig) -> TrackerResult<Self> {
        Self::new(dataset.roads, dataset.service_areas, config)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn network(&self) -> &RoadNetworkIndex {
        self.matcher.network()
    }

    pub fn catalog(&self) -> &PoiCatalog {
        &self.catalog
    }

    /// Look up an indexed road
    pub fn road(&self, id: &RoadId) -> TrackerResult<&RoadFeature> {
        self.network()
            .get(id)
            .ok_or_else(|| TrackerError::UnknownRoad(id.to_string()))
    }

    /// Match, resolve and search for one sample
    pub fn evaluate(
        &self,
        sample: &PositionSample,
        previous: Option<&PositionSample>,
        min_displacement_m: f64,
    ) -> TrackingReport {
        if !sample.is_valid() {
            debug!(
                "Ignoring sample with invalid position ({}, {})",
                sample.latitude, sample.longitude
            );
            return TrackingReport::Unmatched;
        }

        // Out-of-range previous fixes give no displacement bearing
        let previous = previous.filter(|p| p.is_valid());
        let matched = match self.matcher.match_sample(sample, previous, min_displacement_m) {
            Some(m) => m,
            None => return TrackingReport::Unmatched,
        };

        let resolution = self.resolver.resolve(
            matched.road,
            &matched.snapped,
            matched.movement_bearing(),
            sample.speed,
        );

        let next_pois = self.search.find_next(
            &self.catalog,
            &matched.road.id,
            resolution.progress,
            resolution.direction.map(|d| d.raw),
            sample.speed,
        );

        TrackingReport::Matched(RoadReport {
            road_id: matched.road.id.clone(),
            road_name: matched.road.name.clone(),
            snap_distance_m: matched.distance_m,
            snapped: matched.snapped.coord,
            movement: matched.movement,
            direction: resolution.direction,
            progress_km: resolution.progress,
            poi_status: PoiStatus::classify(
                resolution.progress,
                resolution.direction.as_ref(),
                &next_pois,
            ),
            next_pois,
        })
    }
}
