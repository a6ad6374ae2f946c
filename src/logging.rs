//! Tracing setup: rolling file plus stdout

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Unknown values fall back to a single unrotated file
fn rotation(name: &str) -> Rotation {
    match name.to_ascii_lowercase().as_str() {
        "minutely" => Rotation::MINUTELY,
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `log_level`. The returned guard must live as long as
/// the process, otherwise buffered file output is dropped.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<WorkerGuard> {
    let appender = RollingFileAppender::builder()
        .rotation(rotation(&config.rotation))
        .filename_prefix(&config.log_file)
        .build(&config.log_dir)
        .with_context(|| format!("Failed to open log directory {}", config.log_dir))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let installed = if config.use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(file_writer))
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(file_writer))
            .with(fmt::layer().with_target(false))
            .try_init()
    };
    installed.context("Global tracing subscriber already installed")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_names() {
        assert_eq!(rotation("hourly"), Rotation::HOURLY);
        assert_eq!(rotation("Daily"), Rotation::DAILY);
        assert_eq!(rotation("weekly"), Rotation::NEVER);
    }
}
