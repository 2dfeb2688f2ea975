//! Logging configuration using the tracing framework
//!
//! Logs can be controlled via the RUST_LOG environment variable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "timesheet=info,warn";

/// Initialize the logging system
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log level
///   - Default: "timesheet=info,warn"
///   - Examples:
///     - `RUST_LOG=timesheet=debug` - every backend call
///     - `RUST_LOG=timesheet::transitions=debug` - status changes only
///
/// `verbose` raises the default to debug when `RUST_LOG` is unset.
pub fn init(verbose: bool) {
    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(false),
        )
        .init();
}

/// Initialize logging into a daily rolling file only
///
/// Used by the terminal UI, where console output would corrupt the screen.
/// The file lives in the platform data directory under `logs/`.
pub fn init_with_file(log_file_name: &str, verbose: bool) -> std::io::Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};

    let log_dir = match directories::ProjectDirs::from("com", "timesheet", "timesheet") {
        Some(proj_dirs) => proj_dirs.data_dir().join("logs"),
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, log_file_name);

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .init();

    Ok(())
}

/// Initialize logging for tests
///
/// Only errors are shown unless RUST_LOG says otherwise.
pub fn init_test() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_test_writer())
        .try_init()
        .ok(); // Ignore errors if already initialized
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("timesheet=debug,warn")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    })
}
