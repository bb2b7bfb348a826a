//! Structured error handling for rulepipe
//!
//! Every failure a reasoning run or a service request can hit is a
//! [`ReasonError`] carrying:
//! - an [`ErrorCode`] for programmatic handling
//! - a message, an optional source location and cause chain
//! - an HTTP status mapping used by the service
//!
//! # Error Categories
//!
//! - parse (`1xxx`): rule text, update batches, input graphs
//! - sources (`2xxx`): reading rules, loading graphs, writing output
//! - reasoning (`3xxx`): update execution, iteration cap, deadlines
//! - validation (`4xxx`): malformed requests
//! - configuration (`5xxx`)
//!
//! # Example
//!
//! ```rust
//! use rulepipe::error::{ErrorCode, ReasonError};
//!
//! let err = ReasonError::rule_source_read("rules/missing.rules", "No such file")
//!     .with_hint("check the ';'-separated rule paths");
//! assert_eq!(err.code, ErrorCode::RuleSourceRead);
//! assert_eq!(err.http_status(), 422);
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Error Codes
// ============================================================================

/// Unique error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Parse errors (1xxx)
    /// Malformed forward rule text
    RuleParse = 1000,
    /// Malformed SPARQL update batch
    UpdateParse = 1001,
    /// Namespace prefix missing from a rule source (reported as a warning)
    PrefixResolution = 1004,

    // Source errors (2xxx)
    /// Rule source unreadable
    RuleSourceRead = 2000,
    /// Input graph cannot be fetched or parsed
    GraphLoad = 2001,
    /// Result destination cannot be written
    OutputWrite = 2002,

    // Reasoning errors (3xxx)
    /// An update operation failed during execution
    UpdateExecution = 3000,
    /// Fixpoint loop hit its iteration cap
    IterationCapExceeded = 3001,
    /// Request exceeded its deadline
    RequestTimeout = 3002,
    /// Forward engine hit its round limit
    RoundLimitExceeded = 3003,

    // Validation errors (4xxx)
    /// Generic validation error
    Validation = 4000,
    /// Required input missing or empty
    EmptyInput = 4001,
    /// Unknown input or output format
    UnsupportedFormat = 4003,
    /// Operation disabled by configuration
    Forbidden = 4004,

    // Configuration errors (5xxx)
    /// Generic configuration error
    Config = 5000,
    /// Invalid configuration value
    InvalidConfig = 5001,

    // Internal errors (9xxx)
    /// Internal error
    Internal = 9000,
    /// Worker pool unavailable
    ServiceUnavailable = 9001,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a short description of the error code
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::RuleParse => "Rule parse error",
            ErrorCode::UpdateParse => "Update parse error",
            ErrorCode::PrefixResolution => "Prefix not resolved",

            ErrorCode::RuleSourceRead => "Rule source unreadable",
            ErrorCode::GraphLoad => "Graph load error",
            ErrorCode::OutputWrite => "Output write error",

            ErrorCode::UpdateExecution => "Update execution failed",
            ErrorCode::IterationCapExceeded => "Iteration cap exceeded",
            ErrorCode::RequestTimeout => "Request timed out",
            ErrorCode::RoundLimitExceeded => "Inference round limit exceeded",

            ErrorCode::Validation => "Validation error",
            ErrorCode::EmptyInput => "Empty input",
            ErrorCode::UnsupportedFormat => "Unsupported format",
            ErrorCode::Forbidden => "Operation disabled",

            ErrorCode::Config => "Configuration error",
            ErrorCode::InvalidConfig => "Invalid configuration value",

            ErrorCode::Internal => "Internal error",
            ErrorCode::ServiceUnavailable => "Service unavailable",
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::RuleParse
            | ErrorCode::UpdateParse
            | ErrorCode::PrefixResolution
            | ErrorCode::Validation
            | ErrorCode::EmptyInput
            | ErrorCode::UnsupportedFormat => 400,

            ErrorCode::Forbidden => 403,

            ErrorCode::RuleSourceRead | ErrorCode::GraphLoad | ErrorCode::UpdateExecution => 422,

            ErrorCode::ServiceUnavailable => 503,

            ErrorCode::RequestTimeout | ErrorCode::IterationCapExceeded | ErrorCode::RoundLimitExceeded => 504,

            ErrorCode::OutputWrite | ErrorCode::Config | ErrorCode::InvalidConfig | ErrorCode::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

// ============================================================================
// Error Context
// ============================================================================

/// Additional context information for an error
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Key-value pairs of context information
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, String>,
    /// Source location (path, URL or line:column)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Stack of error causes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for rulepipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonError {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,
    /// Hint for resolving the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ReasonError {
    /// Create a new error with a code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
        }
    }

    // ========================================================================
    // Factory methods, one per failure kind
    // ========================================================================

    /// Rule text cannot be read from its source
    pub fn rule_source_read(source: &str, reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::RuleSourceRead, format!("Cannot read rule source {}: {}", source, reason))
            .with_context("source", source)
    }

    /// Rule text is malformed
    pub fn rule_parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RuleParse, message)
    }

    /// Update batch is malformed
    pub fn update_parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpdateParse, message)
    }

    /// Input graph cannot be fetched or parsed
    pub fn graph_load(source: &str, reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::GraphLoad, format!("Cannot load graph {}: {}", source, reason))
            .with_context("source", source)
    }

    /// Result destination cannot be written
    pub fn output_write(destination: &str, reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::OutputWrite, format!("Cannot write to {}: {}", destination, reason))
            .with_context("destination", destination)
    }

    /// Namespace prefix missing from a rule source. Never returned as an
    /// `Err`; callers log it and continue with an empty binding.
    pub fn prefix_unresolved(prefix: &str, source: &str) -> Self {
        Self::new(
            ErrorCode::PrefixResolution,
            format!("IRI for prefix '{}' was not found in {}", prefix, source),
        )
        .with_context("prefix", prefix)
    }

    pub fn update_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpdateExecution, message)
    }

    /// Fixpoint loop stopped at its cap while the graph was still growing
    pub fn iteration_cap(cap: usize, triples: usize) -> Self {
        Self::new(
            ErrorCode::IterationCapExceeded,
            format!("No fixpoint after {} iterations ({} triples)", cap, triples),
        )
        .with_hint("raise reasoning.max_iterations or check the update batch for unbounded growth")
    }

    pub fn timeout(seconds: u64) -> Self {
        Self::new(ErrorCode::RequestTimeout, format!("Request exceeded its {} s deadline", seconds))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn empty_input(field: &str) -> Self {
        Self::new(ErrorCode::EmptyInput, format!("'{}' must not be empty", field))
    }

    pub fn unsupported_format(format: &str) -> Self {
        Self::new(ErrorCode::UnsupportedFormat, format!("Unsupported format: {}", format))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Config, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    // ========================================================================
    // Builders
    // ========================================================================

    /// Set the error code
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = code;
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.fields.insert(key.into(), value.into());
        self
    }

    /// Add a cause to the error chain
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.causes.push(cause.into());
        self
    }

    /// Add source location
    pub fn at(mut self, location: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.location = Some(location.into());
        self
    }

    /// Add a hint for resolving the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Value of a context field, if set
    pub fn context_field(&self, key: &str) -> Option<&str> {
        self.context.as_ref()?.fields.get(key).map(String::as_str)
    }
}

impl fmt::Display for ReasonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)?;

        if let Some(ref ctx) = self.context {
            if let Some(ref loc) = ctx.location {
                write!(f, " at {}", loc)?;
            }
            if !ctx.causes.is_empty() {
                write!(f, "\nCaused by:")?;
                for cause in &ctx.causes {
                    write!(f, "\n  - {}", cause)?;
                }
            }
        }

        if let Some(ref hint) = self.hint {
            write!(f, "\nHint: {}", hint)?;
        }

        Ok(())
    }
}

impl std::error::Error for ReasonError {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<std::io::Error> for ReasonError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        let code = match err.kind() {
            ErrorKind::TimedOut => ErrorCode::RequestTimeout,
            ErrorKind::InvalidData | ErrorKind::InvalidInput => ErrorCode::Validation,
            _ => ErrorCode::Internal,
        };
        ReasonError::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for ReasonError {
    fn from(err: serde_json::Error) -> Self {
        ReasonError::validation(err.to_string()).with_context("format", "JSON")
    }
}

impl From<toml::de::Error> for ReasonError {
    fn from(err: toml::de::Error) -> Self {
        ReasonError::config(err.to_string()).with_code(ErrorCode::InvalidConfig)
    }
}

// ============================================================================
// Result type alias
// ============================================================================

/// A Result type using ReasonError
pub type ReasonResult<T> = Result<T, ReasonError>;

// ============================================================================
// Error response for the service
// ============================================================================

/// JSON error body returned by the reasoning service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error indicator
    pub error: bool,
    /// Error code (string form)
    pub code: String,
    /// Numeric error code
    pub code_num: u32,
    /// HTTP status code
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<&ReasonError> for ErrorResponse {
    fn from(err: &ReasonError) -> Self {
        Self {
            error: true,
            code: format!("{:?}", err.code),
            code_num: err.code.code(),
            status: err.http_status(),
            message: err.message.clone(),
            details: err.context.as_ref().map(|c| c.fields.clone()),
            hint: err.hint.clone(),
        }
    }
}

impl From<ReasonError> for ErrorResponse {
    fn from(err: ReasonError) -> Self {
        Self::from(&err)
    }
}

// ============================================================================
// Macros for convenient error creation
// ============================================================================

/// Create a ReasonError tagged with the current source location
#[macro_export]
macro_rules! reason_error {
    ($code:expr, $msg:expr) => {
        $crate::error::ReasonError::new($code, $msg)
            .at(format!("{}:{}", file!(), line!()))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::ReasonError::new($code, format!($fmt, $($arg)*))
            .at(format!("{}:{}", file!(), line!()))
    };
}

/// Ensure a condition holds, or return an error
#[macro_export]
macro_rules! reason_ensure {
    ($cond:expr, $code:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::reason_error!($code, $msg));
        }
    };
    ($cond:expr, $code:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::reason_error!($code, $fmt, $($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_map_to_status() {
        assert_eq!(ErrorCode::RuleParse.http_status(), 400);
        assert_eq!(ErrorCode::GraphLoad.http_status(), 422);
        assert_eq!(ErrorCode::RequestTimeout.http_status(), 504);
        assert_eq!(ErrorCode::OutputWrite.http_status(), 500);
        assert_eq!(ErrorCode::RuleSourceRead.code(), 2000);
    }

    #[test]
    fn test_display_with_context_and_hint() {
        let err = ReasonError::rule_parse("expected '->'")
            .at("stage.rules:3:14")
            .with_cause("unexpected token ']'")
            .with_hint("rules are written [name: body -> head]");
        let text = err.to_string();

        assert!(text.starts_with("[1000] expected '->' at stage.rules:3:14"));
        assert!(text.contains("Caused by:\n  - unexpected token ']'"));
        assert!(text.ends_with("Hint: rules are written [name: body -> head]"));
    }

    #[test]
    fn test_factories_record_source() {
        let err = ReasonError::graph_load("http://example.org/data.ttl", "connection refused");
        assert_eq!(err.code, ErrorCode::GraphLoad);
        assert_eq!(err.context_field("source"), Some("http://example.org/data.ttl"));
        assert_eq!(err.http_status(), 422);
    }

    #[test]
    fn test_error_response_serializes() {
        let err = ReasonError::iteration_cap(1000, 42);
        let response = ErrorResponse::from(&err);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["code"], "IterationCapExceeded");
        assert_eq!(json["code_num"], 3001);
        assert_eq!(json["status"], 504);
        assert!(json["hint"].is_string());
    }

    #[test]
    fn test_ensure_macro() {
        fn check(workers: usize) -> ReasonResult<()> {
            reason_ensure!(workers > 0, ErrorCode::InvalidConfig, "workers must be at least 1, got {}", workers);
            Ok(())
        }

        assert!(check(4).is_ok());
        let err = check(0).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
        assert!(err.context.unwrap().location.unwrap().contains("error.rs"));
    }
}
