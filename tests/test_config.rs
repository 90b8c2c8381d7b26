use macros::integration_test;
use rust_kinsim::simulation::config::{CommandLineArgs, Config};
use rust_kinsim::simulation::error::SimError;
use rust_kinsim::simulation::scenario::Scenario;
use std::path::PathBuf;
use std::sync::Arc;

const CONFIG: &str = "tests/resources/kinsim/config.yml";

#[integration_test(rust_kinsim)]
fn load_config_file() {
    let config = Config::from_path(PathBuf::from(CONFIG)).unwrap();

    let simulation = config.simulation();
    assert_eq!(0.01, simulation.interval);
    assert_eq!(Some(1.), simulation.duration);
    assert!(!simulation.realtime);

    let lidar = config.lidar();
    assert_eq!(360, lidar.num_rays);
    assert_eq!(0.005, lidar.interval);

    let ego = config.ego_vehicle().unwrap();
    assert_eq!(PathBuf::from("models/car.yml"), ego.model);
    assert_eq!("ego", ego.name);
    assert_eq!(PathBuf::from("scenario.yml"), config.scenario().unwrap().path);
}

#[integration_test(rust_kinsim)]
fn overrides_from_command_line() {
    let args = CommandLineArgs {
        config: CONFIG.to_string(),
        overrides: vec![
            ("lidar.num_rays".to_string(), "90".to_string()),
            ("ego_vehicle.position".to_string(), "10,20".to_string()),
            ("unknown.key".to_string(), "ignored".to_string()),
        ],
    };
    let config = Config::try_from(args).unwrap();
    assert_eq!(90, config.lidar().num_rays);
    let ego = config.ego_vehicle().unwrap();
    assert_eq!(10., ego.position.x);
    assert_eq!(20., ego.position.y);
}

#[integration_test(rust_kinsim)]
fn invalid_override_is_rejected() {
    let args = CommandLineArgs {
        config: CONFIG.to_string(),
        overrides: vec![("simulation.interval".to_string(), "fast".to_string())],
    };
    assert!(matches!(
        Config::try_from(args),
        Err(SimError::InvalidOverride { .. })
    ));
}

#[integration_test(rust_kinsim)]
fn missing_config_file() {
    let result = Config::from_path(PathBuf::from("tests/resources/kinsim/missing.yml"));
    assert!(matches!(result, Err(SimError::Io { .. })));
}

#[integration_test(rust_kinsim)]
fn missing_ego_model_fails_scenario_loading() {
    let args = CommandLineArgs {
        config: CONFIG.to_string(),
        overrides: vec![("ego_vehicle.model".to_string(), "models/bus.yml".to_string())],
    };
    let config = Arc::new(Config::try_from(args).unwrap());
    assert!(matches!(Scenario::load(config), Err(SimError::Io { .. })));
}
