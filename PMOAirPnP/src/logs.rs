use pmoconfig::get_config;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Registry, reload};

/// Handle to change the log level of the running process.
#[derive(Clone)]
pub struct LogControl {
    handle: reload::Handle<LevelFilter, Registry>,
}

impl LogControl {
    pub fn set_level(&self, name: &str) -> anyhow::Result<()> {
        let level = parse_level(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown log level '{}'", name))?;
        self.handle.reload(LevelFilter::from_level(level))?;
        Ok(())
    }
}

pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARN" | "WARNING" => Some(Level::WARN),
        "ERROR" => Some(Level::ERROR),
        _ => None,
    }
}

/// Installs the global subscriber from the `host.logger` configuration.
pub fn init_logging() -> LogControl {
    let config = get_config();

    let level = parse_level(&config.get_log_min_level())
        .map(LevelFilter::from_level)
        .unwrap_or(LevelFilter::INFO);
    let (filter, handle) = reload::Layer::new(level);
    let subscriber = Registry::default().with(filter);

    if config.get_log_enable_console() {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .init();
    } else {
        subscriber.init();
    }

    LogControl { handle }
}
