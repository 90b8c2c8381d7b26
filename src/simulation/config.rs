use crate::simulation::error::{Result, SimError};
use crate::simulation::io;
use crate::simulation::vector::Vector2D;
use ahash::HashMap;
use clap::Parser;
use dyn_clone::DynClone;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Macro to register an override handler for a specific config key
#[macro_export]
macro_rules! register_override {
    ($key:literal, $func:expr) => {
        inventory::submit! {
            $crate::simulation::config::OverrideHandler {
                key: $key,
                apply: $func,
            }
        }
    };
}

pub struct OverrideHandler {
    pub key: &'static str,
    pub apply: fn(config: &mut Config, value: &str) -> Result<()>,
}

// Collect all OverrideHandler submitted from anywhere in the crate
inventory::collect!(OverrideHandler);

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineArgs {
    #[arg(long, short)]
    pub config: String,
    #[arg(long = "set", value_parser = parse_key_val)]
    pub overrides: Vec<(String, String)>,
}

impl CommandLineArgs {
    pub fn new_with_path(path: impl ToString) -> Self {
        CommandLineArgs {
            config: path.to_string(),
            overrides: Vec::new(),
        }
    }
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let pos = s.find('=');
    match pos {
        Some(pos) => Ok((s[..pos].to_string(), s[pos + 1..].to_string())),
        None => Err(format!("invalid KEY=VALUE: no `=` found in `{}`", s)),
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Config {
    // shared between the simulation and the lidar thread
    modules: Mutex<HashMap<String, Box<dyn ConfigModule>>>,
    #[serde(skip)]
    context: Option<PathBuf>,
}

impl TryFrom<CommandLineArgs> for Config {
    type Error = SimError;

    fn try_from(args: CommandLineArgs) -> Result<Self> {
        let mut config = Config::from_path(PathBuf::from(args.config))?;
        config.apply_overrides(&args.overrides)?;
        Ok(config)
    }
}

impl Config {
    /// Reads the config file. Relative paths inside the config are resolved against its directory.
    pub fn from_path(config_path: PathBuf) -> Result<Self> {
        let mut config: Config = io::read_yaml(&config_path)?;
        config.set_context(Some(config_path));
        Ok(config)
    }

    pub fn set_context(&mut self, context: Option<PathBuf>) {
        self.context = context;
    }

    pub fn context(&self) -> &Option<PathBuf> {
        &self.context
    }

    /// Apply generic key-value overrides to the config, e.g. simulation.duration=10
    pub fn apply_overrides(&mut self, overrides: &[(String, String)]) -> Result<()> {
        info!("Applying overrides: {:?}", overrides);

        for (key, value) in overrides {
            let key_str = key.as_str();

            if let Some(handler) = inventory::iter::<OverrideHandler>().find(|h| h.key == key_str) {
                (handler.apply)(self, value)?;
            } else {
                warn!("No override handler found for key: {}", key);
            }
        }
        Ok(())
    }

    pub fn simulation(&self) -> Simulation {
        self.module_or_default("simulation")
    }

    pub fn set_simulation(&mut self, simulation: Simulation) {
        self.set_module("simulation", simulation);
    }

    pub fn lidar(&self) -> LidarSetup {
        self.module_or_default("lidar")
    }

    pub fn set_lidar(&mut self, lidar: LidarSetup) {
        self.set_module("lidar", lidar);
    }

    pub fn output(&self) -> Output {
        self.module_or_default("output")
    }

    pub fn set_output(&mut self, output: Output) {
        self.set_module("output", output);
    }

    pub fn ego_vehicle(&self) -> Option<EgoVehicle> {
        self.module::<EgoVehicle>("ego_vehicle")
    }

    pub fn set_ego_vehicle(&mut self, ego_vehicle: EgoVehicle) {
        self.set_module("ego_vehicle", ego_vehicle);
    }

    pub fn scenario(&self) -> Option<ScenarioSource> {
        self.module::<ScenarioSource>("scenario")
    }

    pub fn set_scenario(&mut self, scenario: ScenarioSource) {
        self.set_module("scenario", scenario);
    }

    fn module<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.modules
            .lock()
            .get(key)
            .and_then(|boxed| boxed.as_ref().as_any().downcast_ref::<T>())
            .cloned()
    }

    /// Returns the module stored under `key`. A missing module is replaced by its default, so that
    /// the written output config lists all effective values.
    fn module_or_default<T: ConfigModule + Clone + Default + 'static>(&self, key: &str) -> T {
        if let Some(module) = self.module::<T>(key) {
            module
        } else {
            let default = T::default();
            self.modules
                .lock()
                .insert(key.to_string(), Box::new(default.clone()));
            default
        }
    }

    fn set_module(&mut self, key: &str, module: impl ConfigModule + 'static) {
        self.modules.lock().insert(key.to_string(), Box::new(module));
    }
}

/// Writes the effective config to `output_config.yml` inside `output_path`.
pub fn write_config(config: &Config, output_path: &Path) -> Result<()> {
    let output_config = output_path.join("output_config.yml");
    io::write_yaml(config, &output_config)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| SimError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Simulation {
    /// Simulated seconds per tick.
    #[serde(default = "default_interval")]
    pub interval: f64,
    /// Simulated seconds after which the simulation stops by itself. Runs until stopped if unset.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Sleep for `interval` between ticks instead of running as fast as possible.
    #[serde(default = "default_true")]
    pub realtime: bool,
}

impl Default for Simulation {
    fn default() -> Self {
        Simulation {
            interval: default_interval(),
            duration: None,
            realtime: true,
        }
    }
}

register_override!("simulation.interval", |config, value| {
    let mut simulation = config.simulation();
    simulation.interval = parse_value("simulation.interval", value)?;
    config.set_simulation(simulation);
    Ok(())
});

register_override!("simulation.duration", |config, value| {
    let mut simulation = config.simulation();
    simulation.duration = match value.to_lowercase().as_str() {
        "none" | "" => None,
        _ => Some(parse_value("simulation.duration", value)?),
    };
    config.set_simulation(simulation);
    Ok(())
});

register_override!("simulation.realtime", |config, value| {
    let mut simulation = config.simulation();
    simulation.realtime = parse_value("simulation.realtime", value)?;
    config.set_simulation(simulation);
    Ok(())
});

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LidarSetup {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_num_rays")]
    pub num_rays: u32,
    /// Degrees between two rays.
    #[serde(default = "default_ray_angle_increment")]
    pub ray_angle_increment: f64,
    #[serde(default = "default_max_range")]
    pub max_range: f64,
    /// Wall clock seconds between two scans.
    #[serde(default = "default_interval")]
    pub interval: f64,
}

impl Default for LidarSetup {
    fn default() -> Self {
        LidarSetup {
            enabled: true,
            num_rays: default_num_rays(),
            ray_angle_increment: default_ray_angle_increment(),
            max_range: default_max_range(),
            interval: default_interval(),
        }
    }
}

register_override!("lidar.enabled", |config, value| {
    let mut lidar = config.lidar();
    lidar.enabled = parse_value("lidar.enabled", value)?;
    config.set_lidar(lidar);
    Ok(())
});

register_override!("lidar.num_rays", |config, value| {
    let mut lidar = config.lidar();
    lidar.num_rays = parse_value("lidar.num_rays", value)?;
    config.set_lidar(lidar);
    Ok(())
});

register_override!("lidar.ray_angle_increment", |config, value| {
    let mut lidar = config.lidar();
    lidar.ray_angle_increment = parse_value("lidar.ray_angle_increment", value)?;
    config.set_lidar(lidar);
    Ok(())
});

register_override!("lidar.max_range", |config, value| {
    let mut lidar = config.lidar();
    lidar.max_range = parse_value("lidar.max_range", value)?;
    config.set_lidar(lidar);
    Ok(())
});

register_override!("lidar.interval", |config, value| {
    let mut lidar = config.lidar();
    lidar.interval = parse_value("lidar.interval", value)?;
    config.set_lidar(lidar);
    Ok(())
});

/// The vehicle controlled from the outside and carrying the lidar.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EgoVehicle {
    /// Path to the vehicle model file.
    pub model: PathBuf,
    #[serde(default = "default_ego_position")]
    pub position: Vector2D,
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "default_ego_name")]
    pub name: String,
}

impl EgoVehicle {
    pub fn new(model: impl Into<PathBuf>) -> Self {
        EgoVehicle {
            model: model.into(),
            position: default_ego_position(),
            angle: 0.0,
            name: default_ego_name(),
        }
    }
}

register_override!("ego_vehicle.model", |config, value| {
    let ego = match config.ego_vehicle() {
        Some(mut ego) => {
            ego.model = PathBuf::from(value);
            ego
        }
        None => EgoVehicle::new(value),
    };
    config.set_ego_vehicle(ego);
    Ok(())
});

register_override!("ego_vehicle.position", |config, value| {
    let mut ego = config
        .ego_vehicle()
        .ok_or(SimError::MissingConfigModule("ego_vehicle"))?;
    let (x, y) = value.split_once(',').ok_or_else(|| SimError::InvalidOverride {
        key: "ego_vehicle.position".to_string(),
        value: value.to_string(),
    })?;
    ego.position = Vector2D::new(
        parse_value("ego_vehicle.position", x)?,
        parse_value("ego_vehicle.position", y)?,
    );
    config.set_ego_vehicle(ego);
    Ok(())
});

register_override!("ego_vehicle.angle", |config, value| {
    let mut ego = config
        .ego_vehicle()
        .ok_or(SimError::MissingConfigModule("ego_vehicle"))?;
    ego.angle = parse_value("ego_vehicle.angle", value)?;
    config.set_ego_vehicle(ego);
    Ok(())
});

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ScenarioSource {
    pub path: PathBuf,
}

register_override!("scenario.path", |config, value| {
    config.set_scenario(ScenarioSource {
        path: PathBuf::from(value),
    });
    Ok(())
});

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Output {
    pub output_dir: PathBuf,
    #[serde(default)]
    pub logging: Logging,
}

impl Default for Output {
    fn default() -> Self {
        Output {
            output_dir: PathBuf::from("./"),
            logging: Logging::None,
        }
    }
}

register_override!("output.output_dir", |config, value| {
    let mut output = config.output();
    output.output_dir = PathBuf::from(value);
    config.set_output(output);
    Ok(())
});

register_override!("output.logging", |config, value| {
    let mut output = config.output();
    output.logging = match value.to_lowercase().as_str() {
        "none" => Logging::None,
        "info" => Logging::Info,
        _ => {
            return Err(SimError::InvalidOverride {
                key: "output.logging".to_string(),
                value: value.to_string(),
            });
        }
    };
    config.set_output(output);
    Ok(())
});

/// Have this extra layer of log level enum, as tracing subscriber has no
/// off/none option by default. At least it can't be parsed
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub enum Logging {
    #[default]
    None,
    Info,
}

#[typetag::serde(tag = "type")]
pub trait ConfigModule: Debug + Send + DynClone {
    fn as_any(&self) -> &dyn Any;
}

#[typetag::serde]
impl ConfigModule for Simulation {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[typetag::serde]
impl ConfigModule for LidarSetup {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[typetag::serde]
impl ConfigModule for EgoVehicle {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[typetag::serde]
impl ConfigModule for ScenarioSource {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[typetag::serde]
impl ConfigModule for Output {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// This is needed to allow cloning of the trait object and thus cloning of the Config.
dyn_clone::clone_trait_object!(ConfigModule);

fn default_interval() -> f64 {
    1.0 / 60.0
}

fn default_true() -> bool {
    true
}

fn default_num_rays() -> u32 {
    360
}

fn default_ray_angle_increment() -> f64 {
    1.0
}

fn default_max_range() -> f64 {
    1000.0
}

fn default_ego_position() -> Vector2D {
    Vector2D::new(100.0, 100.0)
}

fn default_ego_name() -> String {
    String::from("ego")
}
