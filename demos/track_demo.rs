/// Example: tracking a simulated drive on a two-carriageway expressway
///
/// Run with: cargo run --example track_demo
use sapa_tracker::map_match::{RoadDirection, RoadFeature, RoadId};
use sapa_tracker::simulate::{drive_along, DriveOptions};
use sapa_tracker::sink::describe;
use sapa_tracker::{
    Facility, PositionSample, ServiceArea, SessionController, SessionMode,
    TrackerConfig, TrackerEngine,
};
use std::sync::Arc;

fn main() {
    println!("Service Area Tracker Demo\n");

    // Two carriageways ~60 m apart, both kilopost 0 at the southern end
    let northbound = RoadFeature::new(
        "E1-N",
        "Demo Expressway (north)",
        vec![(139.4000, 35.400), (139.4010, 35.430), (139.4030, 35.460)],
        RoadDirection::Down,
    );
    let southbound = RoadFeature::new(
        "E1-S",
        "Demo Expressway (south)",
        vec![(139.4037, 35.460), (139.4017, 35.430), (139.4007, 35.400)],
        RoadDirection::Up,
    )
    .with_vertex_progress(vec![Some(6.7), Some(3.35), Some(0.0)]);

    let areas = vec![
        area("n1", "E1-N", 2.0, "Kita PA", vec![Facility::Wc, Facility::Snack]),
        area("n2", "E1-N", 5.5, "Oka SA", vec![Facility::Gas, Facility::Restaurant]),
        area("s1", "E1-S", 1.0, "Minami PA", vec![Facility::Wc]),
        area("s2", "E1-S", 4.0, "Yama SA", vec![Facility::Gas, Facility::Ev]),
    ];

    let engine = match TrackerEngine::new(
        vec![northbound.clone(), southbound],
        areas,
        TrackerConfig::default(),
    ) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            eprintln!("Failed to build engine: {}", e);
            return;
        }
    };
    println!(
        "Engine: {} roads, {} service areas\n",
        engine.network().len(),
        engine.catalog().len()
    );

    // Drive northbound at 100 km/h, sampling every 20 s
    let options = DriveOptions {
        speed_mps: 100.0 / 3.6,
        interval_s: 20.0,
        ..DriveOptions::default()
    };
    let samples = match drive_along(&northbound, &options) {
        Ok(samples) => samples,
        Err(e) => {
            eprintln!("Failed to simulate drive: {}", e);
            return;
        }
    };

    println!("Northbound drive: {} samples", samples.len());
    let mut controller = SessionController::with_engine(engine.clone(), SessionMode::Simulated);
    for sample in &samples {
        let report = controller.process(sample.clone());
        println!("  t={:>4.0}s  {}", sample.timestamp, describe(&report));
    }
    println!();

    // A stationary fix: matched, but no direction and so no POIs
    println!("Stopped on the hard shoulder:");
    let stopped = PositionSample::new(0.0, 35.415, 139.4005).with_speed(0.0);
    let report = controller.process(stopped);
    if let Some(road) = report.road() {
        println!("  {} ({:?})", describe(&report), road.poi_status);
    }
    println!();

    // Far from any road
    let lost = PositionSample::new(1.0, 34.0, 135.0).with_speed(20.0);
    println!("Off the network: {}", describe(&controller.process(lost)));

    let stats = controller.stats();
    println!(
        "\nProcessed {} samples: {} matched, {} unmatched",
        stats.processed, stats.matched, stats.unmatched
    );
}

fn area(id: &str, road: &str, kp: f64, name: &str, facilities: Vec<Facility>) -> ServiceArea {
    ServiceArea {
        id: id.to_string(),
        road_id: RoadId::new(road),
        kp,
        name: name.to_string(),
        facilities,
        url: None,
    }
}
