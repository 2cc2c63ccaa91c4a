//! Expressway service/parking-area tracker.
//!
//! Snaps position samples onto a road network, works out which way the
//! vehicle is travelling and lists the next service areas ahead.

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod map_match;
pub mod poi;
pub mod session;
pub mod simulate;
pub mod sink;
pub mod sources;
pub mod types;

pub use config::TrackerConfig;
pub use dataset::Dataset;
pub use engine::{PoiStatus, RoadReport, TrackerEngine, TrackingReport};
pub use error::{TrackerError, TrackerResult};
pub use poi::{Facility, NextPoi, ServiceArea};
pub use session::{run_session, SessionController, SessionMode, SessionStats, TrackingSession};
pub use sink::{JsonLinesSink, LogSink, PresentationSink, StatusFileSink};
pub use sources::{SampleEvent, SourceError};
pub use types::PositionSample;
