use crate::simulation::engines::ObjectRef;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = SimError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("mass must be positive and finite, got {0}")]
    InvalidMass(f64),
    #[error("friction must be non-negative and finite, got {0}")]
    InvalidFriction(f64),
    #[error("{name} must be non-negative and finite, got {value}")]
    InvalidDimension { name: &'static str, value: f64 },
    #[error("wheel base must be positive and finite, got {0}")]
    InvalidWheelBase(f64),
    #[error("max steering angle must be within [0, 90) degrees, got {0}")]
    InvalidSteeringAngle(f64),
    #[error("time step must be non-negative and finite, got {0}")]
    InvalidTimeStep(f64),
    #[error("friction {friction} with time step {dt} would flip the sign of the speed (friction * dt must stay below 1)")]
    UnstableFriction { friction: f64, dt: f64 },
    #[error("{input} must be finite, got {value}")]
    InvalidControl { input: &'static str, value: f64 },
    #[error("lidar ray angle increment must be positive and finite, got {0}")]
    InvalidRayIncrement(f64),
    #[error("lidar max range must be positive and finite, got {0}")]
    InvalidMaxRange(f64),
    #[error("no constructor registered for object type '{0}'")]
    UnknownObjectType(String),
    #[error("scenario references unknown alias '{0}'")]
    UnknownAlias(String),
    #[error("{0:?} does not name an object of the requested kind")]
    UnknownObject(ObjectRef),
    #[error("alias '{0}' has no model file, but its object type requires one")]
    MissingModel(String),
    #[error("model data for '{alias}' is invalid: {source}")]
    InvalidModel {
        alias: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_path_to_error::Error<serde_yaml::Error>,
    },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value '{value}' for config key '{key}'")]
    InvalidOverride { key: String, value: String },
    #[error("config module '{0}' is required but was not set")]
    MissingConfigModule(&'static str),
    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid controller setup: {0}")]
    Builder(String),
    #[error("thread '{0}' panicked")]
    ThreadPanicked(String),
}
