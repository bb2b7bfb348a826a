//! Configuration for rulepipe
//!
//! Provides:
//! - TOML configuration files
//! - Environment variable overrides
//! - Validation of the values the pipeline and service rely on
//!
//! # Configuration File Locations
//!
//! Searched in order, first found wins:
//! 1. the path given with `--config` (must exist)
//! 2. `./rulepipe.toml`
//! 3. `<config dir>/rulepipe/config.toml` (e.g. `~/.config/rulepipe/config.toml`)
//! 4. `~/.rulepipe.toml`
//! 5. `/etc/rulepipe/config.toml`
//!
//! # Environment Variables
//!
//! Applied after the file:
//! - `RULEPIPE_PORT` - service port
//! - `RULEPIPE_LOG_LEVEL` - error, warn, info, debug, trace
//! - `RULEPIPE_WORKERS` - reasoning worker count
//! - `RULEPIPE_MAX_ITERATIONS` - fixpoint iteration cap
//! - `RULEPIPE_PREFIX` - namespace prefix taken from the first rule source
//! - `RULEPIPE_CACHE_MAX_ENTRIES` - reasoner cache bound
//! - `RULEPIPE_REQUEST_TIMEOUT` - service request deadline in seconds
//!
//! # Example Configuration
//!
//! ```toml
//! [general]
//! log_level = "info"
//! log_format = "compact"
//!
//! [reasoning]
//! prefix = "my"
//! max_iterations = 1000
//!
//! [server]
//! port = 20299
//! workers = 8
//!
//! [cache]
//! max_entries = 256
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::error::{ErrorCode, ReasonError};
use crate::http_client::HttpClientConfig;
use crate::parser::RdfFormat;
use crate::reasoner::EngineConfig;

/// Port the service listens on unless configured otherwise
pub const DEFAULT_PORT: u16 = 20299;

/// Fixpoint iteration cap unless configured otherwise
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

// ============================================================================
// Configuration Schema
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RulepipeConfig {
    pub general: GeneralConfig,
    pub reasoning: ReasoningConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: LogLevel,
    pub log_format: LogFormat,
    /// Include targets and source locations in log lines
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: LogFormat::Compact,
            verbose: false,
        }
    }
}

/// Reasoning configuration options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Prefix whose IRI is read from the first rule source of a request
    pub prefix: String,
    /// Cap on fixpoint update iterations
    pub max_iterations: usize,
    /// Forward engine round limit (0 = unlimited)
    pub max_rounds: usize,
    /// Input graph format; detected from the source when unset
    pub input_format: Option<String>,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            prefix: "my".to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_rounds: 0,
            input_format: None,
        }
    }
}

impl ReasoningConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig { max_rounds: self.max_rounds }
    }

    /// The configured input format, if any
    pub fn input_format(&self) -> Option<RdfFormat> {
        self.input_format.as_deref().and_then(RdfFormat::from_name)
    }
}

/// Reasoning service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests reasoned concurrently; later ones queue
    pub workers: usize,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Per-request deadline in seconds (0 = none)
    pub request_timeout_secs: u64,
    /// Allow any origin
    pub cors_permissive: bool,
    /// Enable `POST /save`
    pub allow_save: bool,
    /// Directory `POST /save` writes into
    pub save_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            workers: default_workers(),
            max_body_size: 16 * 1024 * 1024,
            request_timeout_secs: 0,
            cors_permissive: true,
            allow_save: false,
            save_dir: PathBuf::from("./saved"),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Reasoner cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entry bound; unbounded when unset
    pub max_entries: Option<u64>,
    /// Time to live in seconds; entries never expire when unset
    pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, max_entries: None, ttl_secs: None }
    }
}

/// Remote fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_response_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let client = HttpClientConfig::default();
        Self {
            timeout_secs: client.request_timeout_secs,
            user_agent: client.user_agent,
            max_response_bytes: client.max_response_bytes,
        }
    }
}

impl HttpConfig {
    pub fn client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            request_timeout_secs: self.timeout_secs,
            user_agent: self.user_agent.clone(),
            max_response_bytes: self.max_response_bytes,
            ..Default::default()
        }
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Logging verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" | "quiet" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" | "normal" => Some(LogLevel::Info),
            "debug" | "verbose" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Log line layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration Loading
// ============================================================================

impl RulepipeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration: `explicit` if given, else the first file found
    /// in the search path, else defaults. Environment overrides are applied
    /// and the result is validated.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, ignored) = Self::load_reporting(explicit)?;
        for skipped in &ignored {
            skipped.log();
        }
        Ok(config)
    }

    /// As [`load`](Self::load), returning ignored environment overrides
    /// instead of logging them. The binary reads its configuration before
    /// any subscriber exists and logs them once logging is up.
    pub fn load_reporting(explicit: Option<&Path>) -> Result<(Self, Vec<IgnoredOverride>), ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_paths().into_iter().find(|p| p.exists()) {
                Some(path) => Self::load_from_file(&path)?,
                None => Self::default(),
            },
        };

        let ignored = config.apply_env_overrides();
        config.validate()?;
        Ok((config, ignored))
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))
    }

    /// Load configuration from a TOML string
    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(PathBuf::from("<string>"), e.to_string()))
    }

    /// Config file search paths, in priority order
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./rulepipe.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("rulepipe").join("config.toml"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".rulepipe.toml"));
        }

        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/rulepipe/config.toml"));

        paths
    }

    /// Apply `RULEPIPE_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Vec<IgnoredOverride> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    /// Apply overrides from any variable lookup. Values that do not parse
    /// leave the setting unchanged and are returned.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<IgnoredOverride> {
        let mut ignored = Vec::new();
        let parsed = |key: &'static str| lookup(key).map(|value| value.trim().to_string());
        let mut ignore = |variable: &'static str, value: String| {
            ignored.push(IgnoredOverride { variable, value });
        };

        if let Some(val) = parsed("RULEPIPE_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => ignore("RULEPIPE_PORT", val),
            }
        }

        if let Some(val) = parsed("RULEPIPE_LOG_LEVEL") {
            match LogLevel::from_str(&val) {
                Some(level) => self.general.log_level = level,
                None => ignore("RULEPIPE_LOG_LEVEL", val),
            }
        }

        if let Some(val) = parsed("RULEPIPE_WORKERS") {
            match val.parse() {
                Ok(workers) => self.server.workers = workers,
                Err(_) => ignore("RULEPIPE_WORKERS", val),
            }
        }

        if let Some(val) = parsed("RULEPIPE_MAX_ITERATIONS") {
            match val.parse() {
                Ok(cap) => self.reasoning.max_iterations = cap,
                Err(_) => ignore("RULEPIPE_MAX_ITERATIONS", val),
            }
        }

        if let Some(val) = parsed("RULEPIPE_PREFIX") {
            self.reasoning.prefix = val;
        }

        if let Some(val) = parsed("RULEPIPE_CACHE_MAX_ENTRIES") {
            match val.parse() {
                Ok(max) => self.cache.max_entries = Some(max),
                Err(_) => ignore("RULEPIPE_CACHE_MAX_ENTRIES", val),
            }
        }

        if let Some(val) = parsed("RULEPIPE_REQUEST_TIMEOUT") {
            match val.parse() {
                Ok(secs) => self.server.request_timeout_secs = secs,
                Err(_) => ignore("RULEPIPE_REQUEST_TIMEOUT", val),
            }
        }

        ignored
    }

    /// Check the values the pipeline and service depend on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.server.workers == 0 {
            return Err(ConfigError::Invalid("server.workers must be at least 1".into()));
        }
        if self.reasoning.max_iterations == 0 {
            return Err(ConfigError::Invalid("reasoning.max_iterations must be at least 1".into()));
        }
        if self.reasoning.prefix.contains(|c: char| c.is_whitespace() || c == ':') {
            return Err(ConfigError::Invalid(format!(
                "reasoning.prefix '{}' is not a prefix name",
                self.reasoning.prefix
            )));
        }
        if let Some(name) = &self.reasoning.input_format {
            if RdfFormat::from_name(name).is_none() {
                return Err(ConfigError::Invalid(format!("reasoning.input_format '{}' is not known", name)));
            }
        }
        if self.cache.max_entries == Some(0) {
            return Err(ConfigError::Invalid("cache.max_entries must be at least 1 when set".into()));
        }
        Ok(())
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Generate a default configuration file content
    pub fn default_config_content() -> &'static str {
        r#"# rulepipe configuration

[general]
# Logging level: error, warn, info, debug, trace (RUST_LOG takes precedence)
log_level = "info"
# Log layout: pretty, compact, json
log_format = "compact"
# Include targets and source locations in log lines
verbose = false

[reasoning]
# Prefix whose IRI is read from the first rule source of each request
prefix = "my"
# Cap on fixpoint update iterations
max_iterations = 1000
# Forward engine round limit per stage (0 = unlimited)
max_rounds = 0
# Input graph format: turtle, ntriples or rdfxml (detected when unset)
# input_format = "turtle"

[server]
host = "0.0.0.0"
port = 20299
# Requests reasoned concurrently (defaults to the number of CPUs)
# workers = 8
# Maximum request body size (bytes)
max_body_size = 16777216
# Per-request deadline in seconds (0 = none)
request_timeout_secs = 0
# Allow any origin
cors_permissive = true
# Enable POST /save and the directory it writes to
allow_save = false
save_dir = "./saved"

[cache]
enabled = true
# Bound on cached reasoners (unbounded when unset)
# max_entries = 256
# Expire cached reasoners after this many seconds (never when unset)
# ttl_secs = 3600

[http]
# Timeout for fetching remote graphs and rules (seconds)
timeout_secs = 30
# Largest remote document accepted (bytes)
max_response_bytes = 67108864
"#
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// An environment override whose value did not parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredOverride {
    pub variable: &'static str,
    pub value: String,
}

impl IgnoredOverride {
    pub fn log(&self) {
        warn!(variable = self.variable, value = %self.value, "Ignoring unparseable environment override");
    }
}

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {1}", .0.display())]
    Io(PathBuf, String),
    #[error("Parse error in {}: {1}", .0.display())]
    Parse(PathBuf, String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for ReasonError {
    fn from(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::Invalid(_) | ConfigError::Parse(..) => ErrorCode::InvalidConfig,
            _ => ErrorCode::Config,
        };
        ReasonError::new(code, err.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = RulepipeConfig::default();
        assert_eq!(config.server.port, 20299);
        assert_eq!(config.reasoning.prefix, "my");
        assert_eq!(config.reasoning.max_iterations, 1000);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_entries, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"

[reasoning]
prefix = "onto"
max_iterations = 50

[server]
port = 9000
workers = 2

[cache]
max_entries = 10
ttl_secs = 60
"#;
        let config = RulepipeConfig::load_from_str(toml).unwrap();
        assert_eq!(config.general.log_level, LogLevel::Debug);
        assert_eq!(config.general.log_format, LogFormat::Json);
        assert_eq!(config.reasoning.prefix, "onto");
        assert_eq!(config.reasoning.max_iterations, 50);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.workers, 2);
        assert_eq!(config.cache.max_entries, Some(10));
        // untouched sections keep their defaults
        assert_eq!(config.http, HttpConfig::default());
    }

    #[test]
    fn test_default_content_parses_to_defaults() {
        let config = RulepipeConfig::load_from_str(RulepipeConfig::default_config_content()).unwrap();
        let mut expected = RulepipeConfig::default();
        expected.server.workers = config.server.workers;
        expected.http.user_agent = config.http.user_agent.clone();
        assert_eq!(config, expected);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RULEPIPE_PORT", "8088"),
            ("RULEPIPE_LOG_LEVEL", "trace"),
            ("RULEPIPE_MAX_ITERATIONS", "12"),
            ("RULEPIPE_PREFIX", "ex"),
            ("RULEPIPE_CACHE_MAX_ENTRIES", "3"),
            ("RULEPIPE_WORKERS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = RulepipeConfig::default();
        let workers = config.server.workers;
        let ignored = config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(ignored, vec![IgnoredOverride { variable: "RULEPIPE_WORKERS", value: "not-a-number".into() }]);

        assert_eq!(config.server.port, 8088);
        assert_eq!(config.general.log_level, LogLevel::Trace);
        assert_eq!(config.reasoning.max_iterations, 12);
        assert_eq!(config.reasoning.prefix, "ex");
        assert_eq!(config.cache.max_entries, Some(3));
        assert_eq!(config.server.workers, workers);
    }

    #[test]
    fn test_bad_overrides_are_returned_not_applied() {
        let mut config = RulepipeConfig::default();
        let ignored = config.apply_overrides_from(|key| match key {
            "RULEPIPE_PORT" => Some("99999".into()),
            "RULEPIPE_LOG_LEVEL" => Some("loud".into()),
            "RULEPIPE_REQUEST_TIMEOUT" => Some(" 30 ".into()),
            _ => None,
        });

        let variables: Vec<_> = ignored.iter().map(|i| i.variable).collect();
        assert_eq!(variables, vec!["RULEPIPE_PORT", "RULEPIPE_LOG_LEVEL"]);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.general.log_level, LogLevel::Info);
        assert_eq!(config.server.request_timeout_secs, 30);
    }

    #[test]
    fn test_validation() {
        let mut config = RulepipeConfig::default();
        config.server.workers = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = RulepipeConfig::default();
        config.reasoning.max_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = RulepipeConfig::default();
        config.reasoning.input_format = Some("jsonld".into());
        assert!(config.validate().is_err());

        config.reasoning.input_format = Some("rdfxml".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_round_trip_toml() {
        let config = RulepipeConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(RulepipeConfig::load_from_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = RulepipeConfig::load(Some(Path::new("/nonexistent/rulepipe.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
        let reason: ReasonError = err.into();
        assert_eq!(reason.code, ErrorCode::Config);
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::from_str("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("verbose"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("loud"), None);
    }
}
