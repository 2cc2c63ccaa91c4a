use crate::engine::{PoiStatus, RoadReport, TrackingReport};
use crate::types::PositionSample;
use chrono::{TimeZone, Utc};
use log::info;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

/// Receives one report per processed sample.
///
/// `sample` is `None` for reports that are not tied to a sample, such as a
/// source failure.
pub trait PresentationSink {
    fn publish(&mut self, sample: Option<&PositionSample>, report: &TrackingReport) -> io::Result<()>;
}

/// Publishes to every sink; the first error is returned after all have run
impl PresentationSink for Vec<Box<dyn PresentationSink + Send>> {
    fn publish(&mut self, sample: Option<&PositionSample>, report: &TrackingReport) -> io::Result<()> {
        let mut first_err = None;
        for sink in self.iter_mut() {
            if let Err(e) = sink.publish(sample, report) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Human-readable one-line summary of a report
pub fn describe(report: &TrackingReport) -> String {
    match report {
        TrackingReport::Matched(road) => describe_road(road),
        TrackingReport::Unmatched => "Not on a tracked road".to_string(),
        TrackingReport::DataUnavailable => "Road data not loaded".to_string(),
        TrackingReport::SourceError { message } => format!("Position source failed: {}", message),
    }
}

fn describe_road(road: &RoadReport) -> String {
    let progress = match road.progress_km {
        Some(kp) => format!("kp {:.2} km", kp),
        None => "kp unknown".to_string(),
    };
    let direction = match &road.direction {
        Some(d) => d.label.to_string(),
        None => "direction unknown".to_string(),
    };
    let mut line = format!("{} {}, {}", road.road_name, progress, direction);

    match road.poi_status {
        PoiStatus::Listed => {
            let entries: Vec<String> = road
                .next_pois
                .iter()
                .map(|next| {
                    let eta = match next.eta_minutes {
                        Some(min) => format!("{:.0} min", min),
                        None => "eta unknown".to_string(),
                    };
                    let facilities: Vec<String> =
                        next.poi.facilities.iter().map(|f| f.to_string()).collect();
                    format!(
                        "{} {:.1} km ({}) [{}]",
                        next.poi.name,
                        next.distance_km,
                        eta,
                        facilities.join("/")
                    )
                })
                .collect();
            line.push_str(&format!(" | next: {}", entries.join("; ")));
        }
        PoiStatus::NoneAhead => line.push_str(" | no service areas ahead"),
        PoiStatus::ProgressUnknown | PoiStatus::DirectionUnknown => {}
    }
    line
}

fn clock(timestamp: f64) -> String {
    match Utc.timestamp_millis_opt((timestamp * 1000.0) as i64).single() {
        Some(t) => t.format("%H:%M:%S").to_string(),
        None => format!("{:.1}", timestamp),
    }
}

/// Logs every report at info level
#[derive(Debug, Default)]
pub struct LogSink;

impl PresentationSink for LogSink {
    fn publish(&mut self, sample: Option<&PositionSample>, report: &TrackingReport) -> io::Result<()> {
        match sample {
            Some(s) => info!("[{}] {}", clock(s.timestamp), describe(report)),
            None => info!("{}", describe(report)),
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Record<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sample: Option<&'a PositionSample>,
    report: &'a TrackingReport,
}

/// Writes one JSON object per report, newline-delimited
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PresentationSink for JsonLinesSink<W> {
    fn publish(&mut self, sample: Option<&PositionSample>, report: &TrackingReport) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, &Record { sample, report })?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

#[derive(Serialize)]
struct Status<'a> {
    updated_at: String,
    #[serde(flatten)]
    record: Record<'a>,
}

/// Keeps a JSON file with the latest report, for dashboards polling the disk
pub struct StatusFileSink {
    path: PathBuf,
}

impl StatusFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StatusFileSink { path: path.into() }
    }
}

impl PresentationSink for StatusFileSink {
    fn publish(&mut self, sample: Option<&PositionSample>, report: &TrackingReport) -> io::Result<()> {
        let status = Status {
            updated_at: Utc::now().to_rfc3339(),
            record: Record { sample, report },
        };
        let json = serde_json::to_string_pretty(&status)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
