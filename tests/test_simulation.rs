use assert_approx_eq::assert_approx_eq;
use macros::integration_test;
use rust_kinsim::simulation::config::{CommandLineArgs, Config};
use rust_kinsim::simulation::controller::{ShutdownHandle, SimulationSummary};
use rust_kinsim::simulation::controller::local_controller::{
    LocalControllerBuilder, OUTPUT_SUMMARY,
};
use rust_kinsim::simulation::engines::ObjectRef;
use rust_kinsim::simulation::scenario::Scenario;
use rust_kinsim::simulation::sensors::LidarScan;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::channel;
use std::time::Duration;

const CONFIG: &str = "tests/resources/kinsim/config.yml";

fn load_config(output_dir: &Path, overrides: &[(&str, &str)]) -> Arc<Config> {
    let mut overrides: Vec<(String, String)> = overrides
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    overrides.push((
        "output.output_dir".to_string(),
        output_dir.to_str().unwrap().to_string(),
    ));
    let args = CommandLineArgs {
        config: CONFIG.to_string(),
        overrides,
    };
    Arc::new(Config::try_from(args).unwrap())
}

#[integration_test(rust_kinsim)]
fn scenario_is_instantiated() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path(), &[("lidar.enabled", "false")]);
    let running = LocalControllerBuilder::default()
        .scenario(Scenario::load(config).unwrap())
        .build()
        .unwrap()
        .start()
        .unwrap();

    let scene = running.scene().clone();
    assert_eq!(Some(ObjectRef::Dynamic(0)), scene.ego);
    assert_eq!(Some(ObjectRef::Static(0)), scene.get("east"));
    assert_eq!(Some(ObjectRef::Dynamic(1)), scene.get("crate"));
    assert_eq!(Some(ObjectRef::Dynamic(2)), scene.get("npc"));
    assert!(running.control_of("east").is_none());
    assert!(running.control_of("npc").is_some());

    running.wait().unwrap();
}

#[integration_test(rust_kinsim)]
fn lidar_sees_the_scene() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path(), &[]);
    let (sender, receiver) = channel::<LidarScan>();

    let summary = LocalControllerBuilder::default()
        .scenario(Scenario::load(config).unwrap())
        .scan_sink(move |scan: &LidarScan| {
            let _ = sender.send(scan.clone());
        })
        .build()
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(100, summary.ticks);

    let scans: Vec<LidarScan> = receiver.try_iter().collect();
    assert!(!scans.is_empty());
    let scan = &scans[0];
    assert_eq!(360, scan.ranges.len());
    // wall face at x = 390
    assert_approx_eq!(290., scan.ranges[0], 1e-6);
    // crate spans y in [280, 320]
    assert_approx_eq!(180., scan.ranges[90], 1e-6);
    assert!(scan.ranges[180].is_infinite());
    // npc body spans y in [-175, -125]
    assert_approx_eq!(225., scan.ranges[270], 1e-6);
    // nothing moves without input
    assert!(scans.iter().all(|s| s.ranges == scan.ranges));
}

#[integration_test(rust_kinsim)]
fn ego_is_driven_through_control_handle() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(
        dir.path(),
        &[("simulation.realtime", "true"), ("simulation.duration", "0.5")],
    );
    let running = LocalControllerBuilder::default()
        .scenario(Scenario::load(config).unwrap())
        .build()
        .unwrap()
        .start()
        .unwrap();

    let control = running.control().unwrap();
    control.set_throttle(1.).unwrap();
    control.set_steering(0.).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert!(control.telemetry().unwrap().speed > 0.);

    let summary = running.wait().unwrap();
    let ego = summary.ego.unwrap();
    assert!(ego.pos.x > 100.);
    assert_approx_eq!(100., ego.pos.y, 1e-9);
    // front bumper at pos.x + 85 never passes the wall face
    assert!(ego.pos.x <= 305. + 1e-6);
}

#[integration_test(rust_kinsim)]
fn stop_ends_open_ended_simulation() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(
        dir.path(),
        &[("simulation.duration", "none"), ("simulation.realtime", "true")],
    );
    let running = LocalControllerBuilder::default()
        .scenario(Scenario::load(config).unwrap())
        .build()
        .unwrap()
        .start()
        .unwrap();

    std::thread::sleep(Duration::from_millis(100));
    assert!(!running.is_finished());
    running.stop();
    let summary = running.wait().unwrap();
    assert!(summary.ticks > 0);
    assert!(summary.time > 0.);
}

#[integration_test(rust_kinsim)]
fn run_writes_output_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path(), &[("lidar.enabled", "false")]);

    let summary = LocalControllerBuilder::default()
        .scenario(Scenario::load(config).unwrap())
        .build()
        .unwrap()
        .run()
        .unwrap();

    let written: SimulationSummary = serde_yaml::from_str(
        &std::fs::read_to_string(dir.path().join(OUTPUT_SUMMARY)).unwrap(),
    )
    .unwrap();
    assert_eq!(summary, written);

    let output_config = Config::from_path(dir.path().join("output_config.yml")).unwrap();
    assert!(!output_config.lidar().enabled);
    assert_eq!(Some(1.), output_config.simulation().duration);
    assert_eq!(
        dir.path(),
        output_config.output().output_dir.as_path()
    );
}

#[integration_test(rust_kinsim)]
fn stopped_run_still_writes_output_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(
        dir.path(),
        &[("simulation.duration", "none"), ("simulation.realtime", "true")],
    );
    let shutdown = ShutdownHandle::new();
    let stopper = shutdown.clone();
    let stop_thread = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        stopper.stop();
    });

    let summary = LocalControllerBuilder::default()
        .scenario(Scenario::load(config).unwrap())
        .shutdown(shutdown)
        .build()
        .unwrap()
        .run()
        .unwrap();
    stop_thread.join().unwrap();

    assert!(summary.ticks > 0);
    assert!(dir.path().join(OUTPUT_SUMMARY).is_file());
    assert!(dir.path().join("output_config.yml").is_file());
}
