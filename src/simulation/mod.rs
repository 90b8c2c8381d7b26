pub mod config;
pub mod controller;
pub mod engines;
pub mod error;
pub mod geometry;
pub mod inertial_model;
pub mod io;
pub mod logging;
pub mod scenario;
pub mod scene_object;
pub mod sensors;
pub mod vector;
pub mod vehicles;
