//! Log subscriber setup for the binary
//!
//! The library only emits `tracing` events; installing a subscriber is
//! left to the binary (or to tests that want to see output).

use tracing_subscriber::EnvFilter;

use crate::config::{GeneralConfig, LogFormat, LogLevel};

/// Configuration for logging behavior
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Include file and line numbers
    pub include_location: bool,
    /// Include the target module
    pub include_target: bool,
    /// Explicit filter directives; `RUST_LOG` is used when unset
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Compact,
            level: LogLevel::Info,
            include_location: false,
            include_target: false,
            filter: None,
        }
    }
}

impl From<&GeneralConfig> for LogConfig {
    fn from(general: &GeneralConfig) -> Self {
        Self {
            format: general.log_format,
            level: general.log_level,
            include_location: general.verbose,
            include_target: general.verbose,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Filter in effect: explicit directives, else `RUST_LOG`, else the level
    fn env_filter(&self) -> anyhow::Result<EnvFilter> {
        if let Some(filter) = &self.filter {
            return Ok(EnvFilter::try_new(filter)?);
        }
        Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str())))
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed; callers that may run more
/// than once (tests) can ignore the error.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter()?)
        .with_target(config.include_target)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Pretty => subscriber
            .pretty()
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize pretty logger: {}", e))?,
        LogFormat::Compact => subscriber
            .compact()
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize compact logger: {}", e))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize JSON logger: {}", e))?,
    }

    tracing::debug!(format = ?config.format, level = config.level.as_str(), "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_general_config() {
        let general = GeneralConfig { log_level: LogLevel::Debug, log_format: LogFormat::Json, verbose: true };
        let config = LogConfig::from(&general);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.include_location);
    }

    #[test]
    fn test_explicit_filter_is_validated() {
        let config = LogConfig { filter: Some("rulepipe=[".into()), ..Default::default() };
        assert!(config.env_filter().is_err());

        let config = LogConfig { filter: Some("warn,rulepipe::print=info".into()), ..Default::default() };
        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig { filter: Some("off".into()), ..Default::default() };
        let first = init_logging(&config);
        let second = init_logging(&config);
        assert!(first.is_err() || second.is_err());
    }
}
