use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use sapa_tracker::map_match::RoadId;
use sapa_tracker::simulate::{drive_along, DriveOptions};
use sapa_tracker::sources::{live_loop, load_scripted, scripted_loop};
use sapa_tracker::{
    run_session, Dataset, JsonLinesSink, LogSink, PresentationSink, SampleEvent,
    SessionController, SessionMode, StatusFileSink, TrackerConfig, TrackerEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "sapa_tracker")]
#[command(about = "Track position on the expressway network and list the next service areas ahead", long_about = None)]
struct Args {
    /// Road network, GeoJSON FeatureCollection (.geojson[.gz])
    #[arg(long)]
    roads: PathBuf,

    /// Service/parking areas, JSON array (.json[.gz])
    #[arg(long)]
    sapas: PathBuf,

    /// JSON file overriding tracker thresholds
    #[arg(long)]
    config: Option<PathBuf>,

    /// Milliseconds between simulated samples (overrides config)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Max snap distance in meters (overrides config)
    #[arg(long)]
    max_snap_m: Option<f64>,

    /// Number of service areas to list (overrides config)
    #[arg(long)]
    poi_count: Option<usize>,

    /// Print reports as JSON lines on stdout instead of log lines
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Also keep the latest report in this file
    #[arg(long)]
    status_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play back a recorded drive (JSON array or NDJSON, optionally .gz)
    Replay {
        #[arg(long)]
        samples: PathBuf,
    },
    /// Drive along one road of the network
    Simulate {
        /// Road id as it appears in the dataset
        #[arg(long)]
        road: String,

        #[arg(long, default_value = "80")]
        speed_kmh: f64,

        /// Drive against the digitized direction
        #[arg(long, default_value_t = false)]
        reverse: bool,

        /// Leave heading out so bearing comes from displacement
        #[arg(long, default_value_t = false)]
        no_heading: bool,
    },
    /// Read NDJSON samples from stdin
    Live,
}

fn load_config(args: &Args) -> Result<TrackerConfig> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::from_file(path)?,
        None => TrackerConfig::default(),
    };

    if let Some(ms) = args.interval_ms {
        config.simulated_interval_ms = ms;
    }
    if let Some(m) = args.max_snap_m {
        config.max_snap_distance_m = m;
    }
    if let Some(count) = args.poi_count {
        config.poi_result_count = count;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = load_config(&args).context("Invalid configuration")?;
    let dataset = Dataset::load(&args.roads, &args.sapas).context("Failed to load road data")?;
    let engine = Arc::new(TrackerEngine::from_dataset(dataset, config.clone())?);

    let mut sinks: Vec<Box<dyn PresentationSink + Send>> = Vec::new();
    if args.json {
        sinks.push(Box::new(JsonLinesSink::new(std::io::stdout())));
    } else {
        sinks.push(Box::new(LogSink));
    }
    if let Some(path) = &args.status_file {
        sinks.push(Box::new(StatusFileSink::new(path)));
    }

    let period = Duration::from_millis(config.simulated_interval_ms);
    let (tx, mut rx) = mpsc::channel::<SampleEvent>(64);

    let (mode, producer) = match &args.command {
        Command::Replay { samples } => {
            let samples = load_scripted(samples)
                .with_context(|| format!("Failed to load drive {}", samples.display()))?;
            info!("Replaying {} samples every {:?}", samples.len(), period);
            (SessionMode::Simulated, tokio::spawn(scripted_loop(samples, period, tx)))
        }
        Command::Simulate {
            road,
            speed_kmh,
            reverse,
            no_heading,
        } => {
            let feature = engine.road(&RoadId::new(road.as_str()))?;
            let interval_s = if config.simulated_interval_ms == 0 {
                1.0
            } else {
                config.simulated_interval_ms as f64 / 1000.0
            };
            let options = DriveOptions {
                speed_mps: speed_kmh / 3.6,
                interval_s,
                start_timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
                against_digitization: *reverse,
                include_heading: !*no_heading,
            };
            let samples = drive_along(feature, &options)?;
            info!(
                "Simulating {} samples along {} ({:.1} km)",
                samples.len(),
                feature.name,
                feature.length_km()
            );
            (SessionMode::Simulated, tokio::spawn(scripted_loop(samples, period, tx)))
        }
        Command::Live => {
            info!("Reading samples from stdin");
            let reader = BufReader::new(tokio::io::stdin());
            (SessionMode::Live, tokio::spawn(live_loop(reader, tx)))
        }
    };

    let mut controller = SessionController::with_engine(engine, mode);
    let stats = run_session(&mut controller, &mut rx, &mut sinks).await;

    // Unblocks a producer still waiting to send
    drop(rx);
    let delivered = producer.await?;
    info!("Source delivered {} samples", delivered);

    if args.json {
        eprintln!("{}", serde_json::to_string(&stats)?);
    }

    Ok(())
}
