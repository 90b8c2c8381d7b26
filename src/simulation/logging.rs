use std::io;
use tracing::dispatcher::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::{fmt, registry};

use crate::simulation::config::{Config, Logging};
use crate::simulation::io::resolve_path;

pub const LOG_FILE_NAME: &str = "log.json";

// This is a helper struct to store the logger guards. When they are dropped, logging can be reset.
#[allow(dead_code)]
pub struct LogGuards {
    log_guard: Option<WorkerGuard>,
    default: DefaultGuard,
}

pub fn init_std_out_logging_thread_local() -> DefaultGuard {
    let collector = tracing_subscriber::registry().with(
        fmt::Layer::new()
            .with_writer(io::stdout)
            .with_filter(LevelFilter::INFO),
    );
    tracing::subscriber::set_default(collector)
}

/// Installs the subscriber for the current thread. Threads spawned by the controller inherit it.
///
/// The console level can be changed through `RUST_LOG`, the json log file is written with level
/// info into the output directory if `output.logging` is `Info`.
pub fn init_logging(config: &Config) -> LogGuards {
    let dir = resolve_path(config.context(), &config.output().output_dir);

    let (log_layer, log_guard) = if Logging::Info == config.output().logging {
        let log_file_appender = rolling::never(&dir, LOG_FILE_NAME);
        let (log_file, log_guard) = non_blocking(log_file_appender);
        let layer = fmt::Layer::new()
            .with_writer(log_file)
            .json()
            .with_ansi(false)
            .with_filter(LevelFilter::INFO);
        (Some(layer), Some(log_guard))
    } else {
        (None, None)
    };

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer()
        .with_writer(io::stdout)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(console_filter);

    // Add `Optional`s. If None, then the corresponding layer is not added.
    let collector = registry().with(log_layer).with(console_layer);

    let default = tracing::subscriber::set_default(collector);

    LogGuards { log_guard, default }
}

#[cfg(test)]
mod tests {
    use crate::simulation::config::{Config, Logging, Output};
    use crate::simulation::logging::{LOG_FILE_NAME, init_logging};
    use tracing::info;

    #[test]
    fn writes_json_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.set_output(Output {
            output_dir: dir.path().to_path_buf(),
            logging: Logging::Info,
        });

        let guards = init_logging(&config);
        info!(answer = 42, "logged to file");
        // flushes the non-blocking writer
        drop(guards);

        let content = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
        assert!(content.contains("logged to file"));
        assert!(content.contains("\"answer\":42"));
    }

    #[test]
    fn no_log_file_without_logging() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.set_output(Output {
            output_dir: dir.path().to_path_buf(),
            logging: Logging::None,
        });

        let guards = init_logging(&config);
        info!("console only");
        drop(guards);

        assert!(!dir.path().join(LOG_FILE_NAME).exists());
    }
}
