use crate::engine::{PoiStatus, TrackerEngine, TrackingReport};
use crate::sink::PresentationSink;
use crate::sources::SampleEvent;
use crate::types::PositionSample;
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

/// Where samples come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Continuous receiver stream; a source failure stops tracking
    Live,
    /// Scripted playback; source failures are skipped
    Simulated,
}

/// The two most recent samples of one stream
#[derive(Debug, Clone, Default)]
pub struct TrackingSession {
    previous: Option<PositionSample>,
    current: Option<PositionSample>,
}

impl TrackingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift current to previous and store `sample` as current
    pub fn advance(&mut self, sample: PositionSample) {
        self.previous = self.current.take();
        self.current = Some(sample);
    }

    pub fn current(&self) -> Option<&PositionSample> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&PositionSample> {
        self.previous.as_ref()
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.current = None;
    }
}

/// Counters for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub started_at: String,
    pub processed: u64,
    pub matched: u64,
    pub unmatched: u64,
    pub unavailable: u64,
    pub progress_unknown: u64,
    pub source_errors: u64,
}

impl SessionStats {
    fn new() -> Self {
        SessionStats {
            session_id: format!("session_{}", Utc::now().timestamp_millis()),
            started_at: Utc::now().to_rfc3339(),
            processed: 0,
            matched: 0,
            unmatched: 0,
            unavailable: 0,
            progress_unknown: 0,
            source_errors: 0,
        }
    }

    fn record(&mut self, report: &TrackingReport) {
        match report {
            TrackingReport::Matched(road) => {
                self.processed += 1;
                self.matched += 1;
                if road.poi_status == PoiStatus::ProgressUnknown {
                    self.progress_unknown += 1;
                }
            }
            TrackingReport::Unmatched => {
                self.processed += 1;
                self.unmatched += 1;
            }
            TrackingReport::DataUnavailable => {
                self.processed += 1;
                self.unavailable += 1;
            }
            TrackingReport::SourceError { .. } => self.source_errors += 1,
        }
    }
}

/// Feeds samples through the engine one at a time.
///
/// Holds the engine slot, the previous/current samples and the mode. Without
/// an engine every sample reports `DataUnavailable`. Installing a new engine
/// replaces the old one wholesale; samples already processed are unaffected.
pub struct SessionController {
    engine: Option<Arc<TrackerEngine>>,
    session: TrackingSession,
    mode: SessionMode,
    stats: SessionStats,
}

impl SessionController {
    pub fn new(mode: SessionMode) -> Self {
        SessionController {
            engine: None,
            session: TrackingSession::new(),
            mode,
            stats: SessionStats::new(),
        }
    }

    pub fn with_engine(engine: Arc<TrackerEngine>, mode: SessionMode) -> Self {
        let mut controller = Self::new(mode);
        controller.install_engine(engine);
        controller
    }

    pub fn install_engine(&mut self, engine: Arc<TrackerEngine>) {
        self.engine = Some(engine);
    }

    pub fn clear_engine(&mut self) {
        self.engine = None;
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Switching mode drops the stored samples so bearings never mix streams
    pub fn set_mode(&mut self, mode: SessionMode) {
        if mode != self.mode {
            self.mode = mode;
            self.session.reset();
        }
    }

    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Process one sample: match, resolve direction and progress, search ahead
    pub fn process(&mut self, sample: PositionSample) -> TrackingReport {
        self.session.advance(sample);

        let report = match (&self.engine, self.session.current()) {
            (Some(engine), Some(current)) => {
                let config = engine.config();
                let min_displacement = match self.mode {
                    SessionMode::Live => config.min_displacement_live_m,
                    SessionMode::Simulated => config.min_displacement_simulated_m,
                };
                engine.evaluate(current, self.session.previous(), min_displacement)
            }
            _ => TrackingReport::DataUnavailable,
        };

        self.stats.record(&report);
        report
    }

    pub fn report_source_error(&mut self, message: impl Into<String>) -> TrackingReport {
        let report = TrackingReport::SourceError {
            message: message.into(),
        };
        self.stats.record(&report);
        report
    }
}

/// Drive `controller` from a sample channel until the source ends.
///
/// Samples are processed strictly in arrival order and each report is
/// published before the next sample is taken. In live mode a source failure
/// is published and ends the run; in simulated mode it is logged and skipped.
pub async fn run_session<S>(
    controller: &mut SessionController,
    rx: &mut Receiver<SampleEvent>,
    sink: &mut S,
) -> SessionStats
where
    S: PresentationSink + ?Sized,
{
    while let Some(event) = rx.recv().await {
        match event {
            SampleEvent::Sample(sample) => {
                let report = controller.process(sample);
                if let Err(e) = sink.publish(controller.session().current(), &report) {
                    warn!("Failed to publish report: {}", e);
                }
            }
            SampleEvent::Failed(err) => match controller.mode() {
                SessionMode::Live => {
                    let report = controller.report_source_error(err.to_string());
                    if let Err(e) = sink.publish(None, &report) {
                        warn!("Failed to publish report: {}", e);
                    }
                    warn!("Live tracking stopped: {}", err);
                    break;
                }
                SessionMode::Simulated => {
                    warn!("Skipping playback error: {}", err);
                }
            },
            SampleEvent::End => break,
        }
    }

    let stats = controller.stats().clone();
    info!(
        "Session {} finished: {} processed, {} matched, {} unmatched, {} unavailable",
        stats.session_id, stats.processed, stats.matched, stats.unmatched, stats.unavailable
    );
    stats
}
