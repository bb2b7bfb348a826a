//! Reasoning service over HTTP
//!
//! # Routes
//!
//! - `GET  /ping`   - liveness, returns `{"pong":true}`
//! - `GET  /health` - plain `OK`
//! - `GET  /stats`  - cache and request counters
//! - `POST /reason` - run a staged reasoning request, returns N-Triples
//! - `POST /save`   - store an RDF payload under the save directory
//! - `POST /stop`   - graceful shutdown
//!
//! Reasoning runs on the blocking pool. A semaphore sized to
//! `server.workers` admits requests, so the accept loop never waits on
//! reasoning and at most `workers` requests reason at once. A failing
//! request only fails its own response.
//!
//! # Example
//!
//! ```rust,ignore
//! use rulepipe::config::RulepipeConfig;
//! use rulepipe::server::{build_runtime, run_server};
//!
//! let config = RulepipeConfig::default();
//! build_runtime(config.server.workers)?.block_on(run_server(config))?;
//! ```

use std::net::SocketAddr;
use std::path::{Component, Path};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, Semaphore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn};

use crate::cache::{CacheStats, ReasonerCache};
use crate::config::RulepipeConfig;
use crate::error::{ErrorCode, ErrorResponse, ReasonError, ReasonResult};
use crate::graph::to_ntriples;
use crate::parser::RdfFormat;
use crate::reasoning::ReasoningPipeline;
use crate::source::{load_graph, parse_graph_payload, RuleSource};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Rule sources, either as a list or as one `;`-separated string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RulePaths {
    List(Vec<String>),
    Joined(String),
}

impl RulePaths {
    pub fn to_sources(&self) -> Vec<RuleSource> {
        match self {
            RulePaths::Joined(list) => RuleSource::split_list(list),
            RulePaths::List(paths) => RuleSource::split_list(&paths.join(";")),
        }
    }
}

/// Which triples `/reason` returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Input and derived triples
    #[default]
    Full,
    /// Derived triples only
    Delta,
}

/// Body of `POST /reason`
#[derive(Debug, Clone, Deserialize)]
pub struct ReasonRequest {
    /// Serialized input graph
    #[serde(default)]
    pub rdf_data: Option<String>,
    /// Path or URL of the input graph, instead of `rdf_data`
    #[serde(default)]
    pub rdf_source: Option<String>,
    pub rule_paths: RulePaths,
    /// `turtle` or `ntriples`
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub output: OutputMode,
}

/// Body of `POST /save`
#[derive(Debug, Clone, Deserialize)]
pub struct SaveRequest {
    pub rdf_data: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveResponse {
    pub path: String,
    pub bytes: usize,
}

/// N-Triples result of a reasoning request
#[derive(Debug, Clone)]
pub struct ReasonOutput {
    pub body: String,
    pub triples: usize,
}

/// Error wrapper that renders as the JSON [`ErrorResponse`]
#[derive(Debug)]
pub struct ApiError(pub ReasonError);

impl From<ReasonError> for ApiError {
    fn from(err: ReasonError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

// ============================================================================
// Application State
// ============================================================================

#[derive(Debug, Default)]
struct RequestCounters {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestStats {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub in_flight: u64,
}

/// Shared application state for the server
pub struct AppState {
    pub config: RulepipeConfig,
    pub cache: ReasonerCache,
    workers: Arc<Semaphore>,
    counters: RequestCounters,
    shutdown: Notify,
}

impl AppState {
    pub fn new(config: RulepipeConfig) -> Self {
        let cache = ReasonerCache::new(&config.cache, config.reasoning.engine_config());
        let workers = Arc::new(Semaphore::new(config.server.workers.max(1)));
        Self {
            config,
            cache,
            workers,
            counters: RequestCounters::default(),
            shutdown: Notify::new(),
        }
    }

    pub fn request_stats(&self) -> RequestStats {
        RequestStats {
            total: self.counters.total.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            in_flight: self.counters.in_flight.load(Ordering::Relaxed),
        }
    }

    /// Ask the server to shut down gracefully
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Resolves once shutdown has been requested
    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await
    }

    /// Serve one reasoning request on the calling (blocking) thread
    pub fn reason(&self, request: &ReasonRequest) -> ReasonResult<ReasonOutput> {
        let sources = request.rule_paths.to_sources();
        if sources.is_empty() {
            return Err(ReasonError::empty_input("rule_paths"));
        }

        let format = match &request.format {
            Some(name) => Some(RdfFormat::from_name(name).ok_or_else(|| ReasonError::unsupported_format(name))?),
            None => self.config.reasoning.input_format(),
        };
        let input = match (&request.rdf_data, &request.rdf_source) {
            (Some(data), None) => parse_graph_payload(data, format.unwrap_or_default())?,
            (None, Some(location)) => load_graph(location, format)?,
            (Some(_), Some(_)) => {
                return Err(ReasonError::validation("Give either rdf_data or rdf_source, not both"))
            }
            (None, None) => return Err(ReasonError::empty_input("rdf_data")),
        };

        let pipeline = ReasoningPipeline::from_sources(&sources, &self.config.reasoning.prefix, &self.cache)?;
        let kept = (request.output == OutputMode::Delta).then(|| input.clone());
        let output = pipeline.run(input)?;

        let graph = match kept {
            Some(input) => output.graph.difference(&input),
            None => output.graph,
        };
        Ok(ReasonOutput { body: to_ntriples(&graph), triples: graph.len() })
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;

// ============================================================================
// Route Handlers
// ============================================================================

async fn ping() -> impl IntoResponse {
    Json(serde_json::json!({ "pong": true }))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn stats(State(state): State<SharedState>) -> impl IntoResponse {
    let cache: CacheStats = state.cache.stats();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("RULEPIPE_VERSION"),
        "target": env!("RULEPIPE_TARGET"),
        "workers": state.config.server.workers,
        "cache": cache,
        "requests": state.request_stats(),
    }))
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Handle POST /reason
async fn reason(State(state): State<SharedState>, Json(request): Json<ReasonRequest>) -> Result<Response, ApiError> {
    let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
    state.counters.total.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    let result = run_reasoning(&state, id, request).await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(output) => {
            state.counters.succeeded.fetch_add(1, Ordering::Relaxed);
            info!(request_id = id, triples = output.triples, elapsed_ms, "Reasoning request complete");
            let mut response = (
                StatusCode::OK,
                [(header::CONTENT_TYPE, RdfFormat::NTriples.media_type())],
                output.body,
            )
                .into_response();
            let headers = response.headers_mut();
            headers.insert("x-request-id", HeaderValue::from(id));
            headers.insert("x-triple-count", HeaderValue::from(output.triples as u64));
            Ok(response)
        }
        Err(err) => {
            state.counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(request_id = id, code = err.code.code(), elapsed_ms, "Reasoning request failed: {}", err.message);
            Err(ApiError(err.with_context("request_id", id.to_string())))
        }
    }
}

/// Wait for a worker slot, then reason on the blocking pool. The permit
/// travels with the blocking task, so a request abandoned at its deadline
/// keeps its slot until the work really ends.
async fn run_reasoning(state: &SharedState, id: u64, request: ReasonRequest) -> ReasonResult<ReasonOutput> {
    let permit = Arc::clone(&state.workers)
        .acquire_owned()
        .await
        .map_err(|_| ReasonError::new(ErrorCode::ServiceUnavailable, "Worker pool is closed"))?;

    let worker_state = Arc::clone(state);
    let span = info_span!("reason", request_id = id);
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let _entered = span.enter();
        worker_state.counters.in_flight.fetch_add(1, Ordering::Relaxed);
        let result = worker_state.reason(&request);
        worker_state.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
        result
    });

    let deadline = state.config.server.request_timeout_secs;
    let joined = if deadline > 0 {
        tokio::time::timeout(Duration::from_secs(deadline), task)
            .await
            .map_err(|_| ReasonError::timeout(deadline))?
    } else {
        task.await
    };
    joined.map_err(|e| ReasonError::internal(format!("Reasoning worker failed: {}", e)))?
}

/// Handle POST /save
async fn save(State(state): State<SharedState>, Json(request): Json<SaveRequest>) -> Result<Json<SaveResponse>, ApiError> {
    let server = &state.config.server;
    if !server.allow_save {
        return Err(ReasonError::forbidden("Saving is disabled; set server.allow_save").into());
    }
    if !is_plain_file_name(&request.filename) {
        return Err(ReasonError::validation(format!("Invalid file name '{}'", request.filename)).into());
    }

    let path = server.save_dir.join(&request.filename);
    let destination = path.display().to_string();
    tokio::fs::create_dir_all(&server.save_dir)
        .await
        .map_err(|e| ReasonError::output_write(&destination, e))?;
    tokio::fs::write(&path, request.rdf_data.as_bytes())
        .await
        .map_err(|e| ReasonError::output_write(&destination, e))?;

    info!(path = %destination, bytes = request.rdf_data.len(), "Saved RDF payload");
    Ok(Json(SaveResponse { path: destination, bytes: request.rdf_data.len() }))
}

/// A single normal path component
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

/// Handle POST /stop
async fn stop(State(state): State<SharedState>) -> impl IntoResponse {
    info!("Shutdown requested over HTTP");
    state.request_shutdown();
    Json(serde_json::json!({ "stopping": true }))
}

// ============================================================================
// Server Setup
// ============================================================================

/// Create the router with all routes
pub fn create_router(state: SharedState) -> Router {
    let server = &state.config.server;

    let cors = if server.cors_permissive {
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_origin(Any)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .route("/reason", post(reason))
        .route("/save", post(save))
        .route("/stop", post(stop))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server.max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Multi-threaded runtime whose blocking pool matches the worker count
pub fn build_runtime(workers: usize) -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(workers.max(1))
        .build()
}

fn socket_addr(config: &RulepipeConfig) -> ReasonResult<SocketAddr> {
    let text = format!("{}:{}", config.server.host, config.server.port);
    text.parse()
        .map_err(|e| ReasonError::config(format!("Invalid listen address {}: {}", text, e)))
}

/// Run the service until Ctrl+C or `POST /stop`
pub async fn run_server(config: RulepipeConfig) -> ReasonResult<()> {
    let addr = socket_addr(&config)?;
    let state = Arc::new(AppState::new(config));
    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        workers = state.config.server.workers,
        cache = state.cache.is_enabled(),
        "Reasoning service listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&state)))
        .await?;

    info!("Reasoning service stopped");
    Ok(())
}

/// Wait for Ctrl+C or a shutdown request
async fn shutdown_signal(state: SharedState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = state.shutdown_requested() => {}
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    const RULES: &str = "@prefix my: <http://example.org/onto#>.\n\
        [r1: (?x rdf:type my:Person) -> (?x rdf:type my:Agent)]\n";
    const DATA: &str = "@prefix my: <http://example.org/onto#>.\n<http://example.org/a> a my:Person .\n";
    const AGENT_TRIPLE: &str = "<http://example.org/a> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.org/onto#Agent> .";

    fn test_state(configure: impl FnOnce(&mut RulepipeConfig)) -> SharedState {
        let mut config = RulepipeConfig::default();
        config.server.workers = 2;
        configure(&mut config);
        Arc::new(AppState::new(config))
    }

    fn rules_file(dir: &TempDir) -> String {
        let file = dir.child("people.rules");
        file.write_str(RULES).unwrap();
        file.path().display().to_string()
    }

    async fn post_json(state: &SharedState, uri: &str, body: serde_json::Value) -> Response {
        create_router(Arc::clone(state))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_health() {
        let state = test_state(|_| {});
        let response = create_router(Arc::clone(&state))
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"pong":true}"#);

        let response = create_router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_reason_returns_ntriples() {
        let dir = TempDir::new().unwrap();
        let state = test_state(|_| {});
        let response = post_json(
            &state,
            "/reason",
            serde_json::json!({ "rdf_data": DATA, "rule_paths": rules_file(&dir) }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/n-triples");
        assert_eq!(response.headers()["x-triple-count"], "2");
        let body = body_text(response).await;
        assert!(body.contains(AGENT_TRIPLE));
    }

    #[tokio::test]
    async fn test_delta_output() {
        let dir = TempDir::new().unwrap();
        let state = test_state(|_| {});
        let response = post_json(
            &state,
            "/reason",
            serde_json::json!({ "rdf_data": DATA, "rule_paths": [rules_file(&dir)], "output": "delta" }),
        )
        .await;
        assert_eq!(body_text(response).await.trim(), AGENT_TRIPLE);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        let state = test_state(|_| {});

        let missing = dir.child("missing.rules").path().display().to_string();
        let response = post_json(&state, "/reason", serde_json::json!({ "rdf_data": DATA, "rule_paths": missing })).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["code"], "RuleSourceRead");
        assert!(json["details"]["request_id"].is_string());

        let response = post_json(
            &state,
            "/reason",
            serde_json::json!({ "rdf_data": DATA, "rule_paths": rules_file(&dir) }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let stats = state.request_stats();
        assert_eq!((stats.total, stats.succeeded, stats.failed), (2, 1, 1));
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let state = test_state(|_| {});
        let response = post_json(&state, "/reason", serde_json::json!({ "rdf_data": DATA, "rule_paths": " ; " })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = post_json(
            &state,
            "/reason",
            serde_json::json!({ "rdf_data": DATA, "rule_paths": "x.rules", "format": "jsonld" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = post_json(&state, "/reason", serde_json::json!({ "rule_paths": "x.rules" })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_graph_is_unprocessable() {
        let dir = TempDir::new().unwrap();
        let state = test_state(|_| {});
        let response = post_json(
            &state,
            "/reason",
            serde_json::json!({ "rdf_data": "<http://e/a> <http://e/p> .", "rule_paths": rules_file(&dir) }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_requests_share_one_engine() {
        let dir = TempDir::new().unwrap();
        let rules = rules_file(&dir);
        let state = test_state(|c| c.server.workers = 2);

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let state = Arc::clone(&state);
                let body = serde_json::json!({ "rdf_data": DATA, "rule_paths": rules.clone() });
                tokio::spawn(async move { post_json(&state, "/reason", body).await.status() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), StatusCode::OK);
        }

        let cache = state.cache.stats();
        assert_eq!(cache.constructions, 1);
        assert_eq!(cache.hits + cache.misses, 6);
    }

    #[tokio::test]
    async fn test_save_disabled_by_default() {
        let state = test_state(|_| {});
        let response = post_json(&state, "/save", serde_json::json!({ "rdf_data": DATA, "filename": "a.ttl" })).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let dir = TempDir::new().unwrap();
        let save_dir = dir.path().join("saved");
        let state = test_state(|c| {
            c.server.allow_save = true;
            c.server.save_dir = save_dir.clone();
        });

        let response = post_json(&state, "/save", serde_json::json!({ "rdf_data": DATA, "filename": "a.ttl" })).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(std::fs::read_to_string(save_dir.join("a.ttl")).unwrap(), DATA);

        let response =
            post_json(&state, "/save", serde_json::json!({ "rdf_data": DATA, "filename": "../escape.ttl" })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stop_requests_shutdown() {
        let state = test_state(|_| {});
        let response = post_json(&state, "/stop", serde_json::json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);
        tokio::time::timeout(Duration::from_secs(1), state.shutdown_requested())
            .await
            .expect("shutdown was requested");
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let state = test_state(|_| {});
        let response = create_router(state)
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["cache"]["constructions"], 0);
        assert_eq!(json["requests"]["total"], 0);
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let response = ApiError(ReasonError::timeout(5)).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("out.nt"));
        assert!(!is_plain_file_name("../out.nt"));
        assert!(!is_plain_file_name("dir/out.nt"));
        assert!(!is_plain_file_name("/etc/passwd"));
        assert!(!is_plain_file_name(""));
    }
}
