use crate::simulation::config::{Simulation, write_config};
use crate::simulation::controller::{
    RunningSimulation, SharedWorld, ShutdownHandle, SimulationSummary,
};
use crate::simulation::engines::ObjectRef;
use crate::simulation::engines::sim_engine::SimEngine;
use crate::simulation::error::{Result, SimError};
use crate::simulation::io;
use crate::simulation::scenario::{ObjectFactory, Scenario};
use crate::simulation::sensors::ScanSink;
use crate::simulation::sensors::lidar::Lidar;
use derive_builder::Builder;
use derive_more::Debug;
use nohash_hasher::IntMap;
use parking_lot::RwLock;
use std::fs;
use std::sync::Arc;
use std::thread::{self, JoinHandle, sleep};
use std::time::{Duration, Instant};
use tracing::{Dispatch, dispatcher, info, trace, warn};

pub const ENGINE_THREAD: &str = "kinsim-engine";
pub const LIDAR_THREAD: &str = "kinsim-lidar";
pub const OUTPUT_SUMMARY: &str = "output_summary.yml";

/// Runs a scenario on two threads: one ticking the engine and one scanning with the lidar of the
/// ego vehicle.
#[derive(Debug, Builder)]
#[builder(pattern = "owned", build_fn(skip))]
pub struct LocalController {
    scenario: Scenario,
    #[builder(default)]
    #[debug(skip)]
    factory: ObjectFactory,
    #[builder(default)]
    #[debug(skip)]
    scan_sinks: Vec<Box<dyn ScanSink>>,
    #[builder(default)]
    shutdown: ShutdownHandle,
}

impl LocalControllerBuilder {
    /// Adds a sink receiving every lidar scan.
    pub fn scan_sink(mut self, sink: impl ScanSink + 'static) -> Self {
        self.scan_sinks
            .get_or_insert_with(Vec::new)
            .push(Box::new(sink));
        self
    }

    // Implementing a custom build function in order to fall back to the default object factory.
    pub fn build(self) -> std::result::Result<LocalController, String> {
        let scenario = self.scenario.ok_or("scenario is required")?;

        Ok(LocalController {
            scenario,
            factory: self.factory.unwrap_or_else(ObjectFactory::with_defaults),
            scan_sinks: self.scan_sinks.unwrap_or_default(),
            shutdown: self.shutdown.unwrap_or_default(),
        })
    }
}

impl LocalController {
    /// Runs the simulation, joins all threads and writes the output files before returning.
    ///
    /// Without a configured duration this only returns after the shutdown handle was triggered.
    pub fn run(self) -> Result<SimulationSummary> {
        let config = self.scenario.config.clone();
        let output_path = io::resolve_path(config.context(), &config.output().output_dir);
        fs::create_dir_all(&output_path).map_err(|source| SimError::Io {
            path: output_path.clone(),
            source,
        })?;

        let summary = self.start()?.wait()?;

        info!("Writing output files:");
        info!("    ... Config ...");
        write_config(&config, &output_path)?;
        info!("    ... Summary ...");
        io::write_yaml(&summary, &output_path.join(OUTPUT_SUMMARY))?;
        Ok(summary)
    }

    /// Instantiates the scenario and starts the threads. The world is left untouched if the
    /// scenario or the setup is invalid.
    pub fn start(self) -> Result<RunningSimulation> {
        let config = self.scenario.config.clone();
        let simulation = config.simulation();
        if simulation.interval <= 0.0 {
            return Err(SimError::InvalidTimeStep(simulation.interval));
        }
        let step = to_duration(simulation.interval)?;

        let lidar_setup = config.lidar();
        let lidar = if lidar_setup.enabled {
            let interval = to_duration(lidar_setup.interval)?;
            let lidar = Lidar::with_max_range(
                lidar_setup.num_rays,
                lidar_setup.ray_angle_increment,
                lidar_setup.max_range,
            )?;
            Some((lidar, interval))
        } else {
            None
        };

        let mut engine = SimEngine::new();
        let scene = self.scenario.instantiate(&mut engine, &self.factory)?;
        let world: SharedWorld = Arc::new(RwLock::new(engine));

        // threads log into the subscriber of the calling thread
        let dispatch = dispatcher::get_default(|d| d.clone());
        let mut handles: IntMap<u32, JoinHandle<Result<()>>> = IntMap::default();

        let engine_world = world.clone();
        let engine_shutdown = self.shutdown.clone();
        handles.insert(
            0,
            spawn_named(ENGINE_THREAD, &dispatch, move || {
                run_engine(engine_world, engine_shutdown, simulation, step)
            })?,
        );

        match (lidar, scene.ego) {
            (Some((lidar, interval)), Some(ego)) => {
                let lidar_world = world.clone();
                let lidar_shutdown = self.shutdown.clone();
                let sinks = self.scan_sinks;
                let lidar_thread = spawn_named(LIDAR_THREAD, &dispatch, move || {
                    run_lidar(lidar_world, lidar_shutdown, lidar, ego, interval, sinks)
                });
                match lidar_thread {
                    Ok(handle) => {
                        handles.insert(1, handle);
                    }
                    Err(e) => {
                        self.shutdown.stop();
                        return Err(e);
                    }
                }
            }
            (Some(_), None) => warn!("Lidar is enabled, but the scenario has no ego vehicle to carry it."),
            (None, _) => info!("Lidar is disabled."),
        }

        Ok(RunningSimulation::new(
            handles,
            world,
            scene,
            self.shutdown,
            config,
        ))
    }
}

fn spawn_named<F>(name: &str, dispatch: &Dispatch, f: F) -> Result<JoinHandle<Result<()>>>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let dispatch = dispatch.clone();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _guard = dispatcher::set_default(&dispatch);
            f()
        })
        .map_err(|source| SimError::Spawn {
            name: name.to_string(),
            source,
        })
}

/// Converts an interval in seconds. Negative, non-finite and overflowing values are rejected.
fn to_duration(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds).map_err(|_| SimError::InvalidTimeStep(seconds))
}

fn run_engine(
    world: SharedWorld,
    shutdown: ShutdownHandle,
    simulation: Simulation,
    step: Duration,
) -> Result<()> {
    let max_ticks = simulation
        .duration
        .map(|d| (d / simulation.interval).round().max(0.0) as u64);
    info!(
        interval = simulation.interval,
        duration = simulation.duration,
        realtime = simulation.realtime,
        "Engine started."
    );

    let mut ticks = 0u64;
    loop {
        if shutdown.is_stopped() {
            break;
        }
        if max_ticks.is_some_and(|max| ticks >= max) {
            info!("Configured duration reached.");
            shutdown.stop();
            break;
        }

        let started = Instant::now();
        let result = world.write().tick(simulation.interval);
        match result {
            Ok(contacts) => {
                for contact in contacts {
                    trace!(subject = ?contact.subject, other = ?contact.other, pushback = ?contact.pushback, "contact");
                }
            }
            Err(e) => {
                shutdown.stop();
                return Err(e);
            }
        }
        ticks += 1;

        if simulation.realtime {
            if let Some(rest) = step.checked_sub(started.elapsed()) {
                sleep(rest);
            }
        }
    }

    info!(ticks, "Engine stopped.");
    Ok(())
}

fn run_lidar(
    world: SharedWorld,
    shutdown: ShutdownHandle,
    lidar: Lidar,
    ego: ObjectRef,
    interval: Duration,
    mut sinks: Vec<Box<dyn ScanSink>>,
) -> Result<()> {
    info!(rays = lidar.ray_count(), sinks = sinks.len(), "Lidar started.");

    let mut scans = 0u64;
    loop {
        let started = Instant::now();
        // hold the read lock only while copying the world
        let (origin, angle, objects, time) = {
            let world = world.read();
            let vehicle = world.vehicle(ego)?;
            (vehicle.pos(), vehicle.angle(), world.snapshot(), world.now())
        };
        let scan = lidar.measure(origin, angle, &objects, &[ego], time);
        for sink in sinks.iter_mut() {
            sink.receive(&scan);
        }
        scans += 1;

        if shutdown.is_stopped() {
            break;
        }
        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            sleep(rest);
        }
    }

    info!(scans, "Lidar stopped.");
    Ok(())
}
