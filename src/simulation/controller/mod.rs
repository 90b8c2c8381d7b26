pub mod local_controller;

use crate::simulation::config::Config;
use crate::simulation::engines::ObjectRef;
use crate::simulation::engines::sim_engine::SimEngine;
use crate::simulation::error::{Result, SimError};
use crate::simulation::scenario::SceneHandles;
use crate::simulation::vehicles::VehicleTelemetry;
use nohash_hasher::IntMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, sleep};
use std::time::Duration;
use tracing::{dispatcher, info, warn};

/// The engine shared between the simulation thread, the lidar thread and control handles.
pub type SharedWorld = Arc<RwLock<SimEngine>>;

/// Cooperative stop flag. All threads of a simulation check it between iterations.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    stop: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Stops on Ctrl+C (SIGINT). Only one handler can be installed per process.
    pub fn stop_on_interrupt(&self) -> std::result::Result<(), ctrlc::Error> {
        let shutdown = self.clone();
        // the handler runs on its own thread
        let dispatch = dispatcher::get_default(|d| d.clone());
        ctrlc::set_handler(move || {
            dispatcher::with_default(&dispatch, || {
                warn!("Received interrupt signal, stopping simulation.")
            });
            shutdown.stop();
        })
    }
}

/// Forwards control input to one vehicle of a running simulation. Each call takes the write lock
/// briefly, the last write wins.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    world: SharedWorld,
    target: ObjectRef,
}

impl ControlHandle {
    pub fn new(world: SharedWorld, target: ObjectRef) -> Self {
        ControlHandle { world, target }
    }

    pub fn set_throttle(&self, throttle: f64) -> Result<()> {
        self.world.write().set_throttle(self.target, throttle)
    }

    pub fn set_steering(&self, steering: f64) -> Result<()> {
        self.world.write().set_steering(self.target, steering)
    }

    pub fn telemetry(&self) -> Result<VehicleTelemetry> {
        Ok(self.world.read().vehicle(self.target)?.telemetry())
    }

    pub fn target(&self) -> ObjectRef {
        self.target
    }
}

/// State of the world after a simulation finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub ticks: u64,
    pub time: f64,
    pub ego: Option<VehicleTelemetry>,
}

impl SimulationSummary {
    pub fn from_world(engine: &SimEngine, ego: Option<ObjectRef>) -> Self {
        SimulationSummary {
            ticks: engine.ticks(),
            time: engine.now(),
            ego: ego
                .and_then(|e| engine.vehicle(e).ok())
                .map(|v| v.telemetry()),
        }
    }
}

/// Threads of a started simulation. Dropping it without calling [`RunningSimulation::wait`]
/// detaches the threads.
#[derive(Debug)]
pub struct RunningSimulation {
    handles: IntMap<u32, JoinHandle<Result<()>>>,
    world: SharedWorld,
    scene: SceneHandles,
    shutdown: ShutdownHandle,
    config: Arc<Config>,
}

impl RunningSimulation {
    pub(crate) fn new(
        handles: IntMap<u32, JoinHandle<Result<()>>>,
        world: SharedWorld,
        scene: SceneHandles,
        shutdown: ShutdownHandle,
        config: Arc<Config>,
    ) -> Self {
        RunningSimulation {
            handles,
            world,
            scene,
            shutdown,
            config,
        }
    }

    /// Asks all threads to stop. Returns immediately, use [`Self::wait`] to join them.
    pub fn stop(&self) {
        info!("Stopping simulation.");
        self.shutdown.stop();
    }

    /// Joins all threads and reports the first error any of them returned.
    pub fn wait(self) -> Result<SimulationSummary> {
        try_join(self.handles, &self.shutdown)?;
        let summary = SimulationSummary::from_world(&self.world.read(), self.scene.ego);
        info!(
            ticks = summary.ticks,
            time = summary.time,
            "Simulation finished."
        );
        Ok(summary)
    }

    pub fn is_finished(&self) -> bool {
        self.handles.values().all(|h| h.is_finished())
    }

    /// Control of the ego vehicle, if the scenario has one.
    pub fn control(&self) -> Option<ControlHandle> {
        self.scene
            .ego
            .map(|ego| ControlHandle::new(self.world.clone(), ego))
    }

    /// Control of a named dynamic object of the scenario.
    pub fn control_of(&self, name: &str) -> Option<ControlHandle> {
        self.scene
            .get(name)
            .filter(|r| r.is_dynamic())
            .map(|r| ControlHandle::new(self.world.clone(), r))
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn world(&self) -> SharedWorld {
        self.world.clone()
    }

    pub fn scene(&self) -> &SceneHandles {
        &self.scene
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }
}

/// Joins all threads. If one of them fails or panics, the others are asked to stop and the
/// first failure is returned once all of them are joined.
pub fn try_join(
    mut handles: IntMap<u32, JoinHandle<Result<()>>>,
    shutdown: &ShutdownHandle,
) -> Result<()> {
    let mut first_error = None;
    while !handles.is_empty() {
        sleep(Duration::from_millis(10)); // test for finished threads every 10ms
        let finished: Vec<u32> = handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(i, _)| *i)
            .collect();

        for i in finished {
            let Some(handle) = handles.remove(&i) else {
                continue;
            };
            let name = handle
                .thread()
                .name()
                .unwrap_or("unnamed_thread")
                .to_string();
            let result = match handle.join() {
                Ok(result) => result,
                Err(_) => Err(SimError::ThreadPanicked(name.clone())),
            };
            if let Err(e) = result {
                warn!("Thread {name} failed: {e}");
                shutdown.stop();
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
