//! Shared blocking HTTP client for remote graphs and rule sources
//!
//! One `ureq` agent is built per process and reused for every fetch, so
//! connections to the same host are pooled across requests and stages.
//!
//! # Example
//!
//! ```rust,ignore
//! use rulepipe::http_client::{fetch_text, get_sync_client};
//!
//! let body = fetch_text(get_sync_client(), "https://example.org/rules/ontology.rules", 1 << 20)?;
//! ```

use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

// ============================================================================
// Configuration
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Maximum number of redirects to follow
    pub max_redirects: u32,
    /// Largest response body accepted, in bytes
    pub max_response_bytes: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            user_agent: format!("rulepipe/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 5,
            max_response_bytes: 64 * 1024 * 1024,
        }
    }
}

// ============================================================================
// Shared agent
// ============================================================================

static SYNC_CLIENT: OnceLock<ureq::Agent> = OnceLock::new();
static RESPONSE_LIMIT: OnceLock<usize> = OnceLock::new();

/// Install the process-wide agent. Only the first call has any effect;
/// returns whether this call installed it.
pub fn init_sync_client(config: &HttpClientConfig) -> bool {
    let installed = SYNC_CLIENT.set(create_sync_client(config)).is_ok();
    if installed {
        let _ = RESPONSE_LIMIT.set(config.max_response_bytes);
        debug!(
            timeout_secs = config.request_timeout_secs,
            user_agent = %config.user_agent,
            "HTTP client initialised"
        );
    }
    installed
}

/// The shared agent, built with defaults if nothing was installed
pub fn get_sync_client() -> &'static ureq::Agent {
    SYNC_CLIENT.get_or_init(|| create_sync_client(&HttpClientConfig::default()))
}

/// Response size limit of the shared agent
pub fn response_limit() -> usize {
    *RESPONSE_LIMIT.get_or_init(|| HttpClientConfig::default().max_response_bytes)
}

/// Build an agent with custom configuration
pub fn create_sync_client(config: &HttpClientConfig) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(&config.user_agent)
        .redirects(config.max_redirects)
        .build()
}

// ============================================================================
// Requests
// ============================================================================

/// Whether `location` names an HTTP(S) resource
pub fn is_http_url(location: &str) -> bool {
    let lower = location.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// A fetched document and its declared media type
#[derive(Debug, Clone)]
pub struct FetchedText {
    pub body: String,
    pub content_type: Option<String>,
}

/// GET `url` and read the body as UTF-8, refusing bodies over `limit` bytes
pub fn fetch_text(agent: &ureq::Agent, url: &str, limit: usize) -> Result<FetchedText, HttpError> {
    let response = agent
        .get(url)
        .set("Accept", "text/turtle, application/n-triples;q=0.9, application/rdf+xml;q=0.8, text/plain;q=0.5, */*;q=0.1")
        .call()
        .map_err(|e| match e {
            ureq::Error::Status(code, _) => HttpError::BadStatus(code),
            other => HttpError::RequestFailed(other.to_string()),
        })?;

    let content_type = response.header("Content-Type").map(|v| v.to_string());

    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(limit as u64 + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| HttpError::ReadFailed(e.to_string()))?;
    if bytes.len() > limit {
        return Err(HttpError::TooLarge(limit));
    }

    let body = String::from_utf8(bytes).map_err(|e| HttpError::ReadFailed(e.to_string()))?;
    debug!(url, bytes = body.len(), "Fetched remote document");
    Ok(FetchedText { body, content_type })
}

/// GET with the shared agent and its size limit
pub fn sync_get(url: &str) -> Result<FetchedText, HttpError> {
    fetch_text(get_sync_client(), url, response_limit())
}

// ============================================================================
// Error Types
// ============================================================================

/// HTTP client errors
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
    #[error("HTTP status {0}")]
    BadStatus(u16),
    #[error("Failed to read response: {0}")]
    ReadFailed(String),
    #[error("Response exceeds {0} bytes")]
    TooLarge(usize),
}
