use clap::Parser;
use rust_kinsim::simulation::config::{CommandLineArgs, Config};
use rust_kinsim::simulation::controller::ShutdownHandle;
use rust_kinsim::simulation::controller::local_controller::LocalControllerBuilder;
use rust_kinsim::simulation::error::SimError;
use rust_kinsim::simulation::io::resolve_path;
use rust_kinsim::simulation::logging::{init_logging, init_std_out_logging_thread_local};
use rust_kinsim::simulation::scenario::Scenario;
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let args = CommandLineArgs::parse();

    // Load and adapt config
    let config = {
        let _guard = init_std_out_logging_thread_local();
        info!("Started with args: {:?}", args);
        let config = match Config::try_from(args) {
            Ok(config) => Arc::new(config),
            Err(e) => {
                error!("Could not load config: {e}");
                return ExitCode::FAILURE;
            }
        };

        // the log file is written into the output directory
        let output_dir = resolve_path(config.context(), &config.output().output_dir);
        if let Err(e) = fs::create_dir_all(&output_dir) {
            error!("Could not create output directory {output_dir:?}: {e}");
            return ExitCode::FAILURE;
        }
        config
    };

    let _guards = init_logging(&config);

    // Ctrl+C stops the simulation like a reached duration
    let shutdown = ShutdownHandle::new();
    if let Err(e) = shutdown.stop_on_interrupt() {
        warn!(%e, "error setting interrupt signal handler");
    }

    match run(config, shutdown) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Simulation failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Arc<Config>, shutdown: ShutdownHandle) -> Result<(), SimError> {
    // Load and adapt scenario
    let scenario = Scenario::load(config)?;

    // Create and run simulation
    let controller = LocalControllerBuilder::default()
        .scenario(scenario)
        .shutdown(shutdown)
        .build()
        .map_err(SimError::Builder)?;

    let summary = controller.run()?;
    match summary.ego {
        Some(ego) => info!(
            ticks = summary.ticks,
            time = summary.time,
            "Ego vehicle ended at {} facing {:.1} deg with speed {:.2}.",
            ego.pos,
            ego.angle,
            ego.speed
        ),
        None => info!(ticks = summary.ticks, time = summary.time, "Simulation ended."),
    }
    Ok(())
}
