//! Core library for Toolgate.  This module wires together the function
//! registry, dispatch engine, logging substrate and HTTP handlers.  It
//! deliberately avoids any dependencies beyond those required by the
//! application to remain lightweight and easy to embed.

mod config;
pub mod dispatch;
pub mod functions;
pub mod logging;
pub mod redact;
pub mod registry;

pub use config::{AppConfig, NotifyConfig};
pub use dispatch::{DispatchError, DispatchRequest, Dispatcher};
pub use logging::{EventLogger, Level};
pub use registry::{FunctionDescriptor, FunctionRegistry, ParamSpec, ParamType, ToolHandler};

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use axum::extract::{rejection::JsonRejection, DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

/// Response envelope for `/execute_tool`.  Success and failure share the
/// single `result` slot; failures carry a fixed human-readable string so
/// existing clients keep working (see DESIGN.md on this deliberate
/// ambiguity).
#[derive(Debug, Serialize, Clone)]
pub struct ExecuteResponse {
    pub result: Value,
}

/// Internal application state shared across handlers.  The registry is
/// frozen before the listener starts; everything here is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub registry: Arc<FunctionRegistry>,
    pub logger: Arc<EventLogger>,
    /// Maximum accepted raw request body size in bytes (None => unlimited)
    pub max_request_bytes: Option<usize>,
    /// Source for server-generated request ids when the caller sends none.
    request_seq: Arc<AtomicU64>,
    // Metrics counters
    pub metric_requests_total: Arc<AtomicU64>,
    pub metric_not_found_total: Arc<AtomicU64>,
    pub metric_invalid_arguments_total: Arc<AtomicU64>,
    pub metric_internal_errors_total: Arc<AtomicU64>,
}

/// Build state from environment variables.  See `AppConfig::from_env` for
/// the variables consumed.
pub fn build_state_from_env() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;
    build_state(config)
}

/// Build state from an already-resolved configuration.  The registry is
/// populated here, once, and never mutated afterwards.
pub fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    let logger = Arc::new(EventLogger::from_config(&config));

    let mut registry = FunctionRegistry::new();
    functions::register_builtins(&mut registry, &config);
    let registry = Arc::new(registry);

    let dispatcher = Dispatcher::new(registry.clone(), logger.clone());

    Ok(AppState {
        dispatcher,
        registry,
        logger,
        max_request_bytes: config.max_request_bytes,
        request_seq: Arc::new(AtomicU64::new(1)),
        metric_requests_total: Arc::new(AtomicU64::new(0)),
        metric_not_found_total: Arc::new(AtomicU64::new(0)),
        metric_invalid_arguments_total: Arc::new(AtomicU64::new(0)),
        metric_internal_errors_total: Arc::new(AtomicU64::new(0)),
    })
}

/// Build the Axum router and attach handlers.  The router holds a copy of
/// the `AppState` for each invocation.
pub fn app(state: AppState) -> Router {
    let max_request_bytes = state.max_request_bytes;

    let router = Router::new()
        .route("/execute_tool", post(execute_tool_handler))
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler));

    let router = if let Some(limit) = max_request_bytes {
        router.layer(DefaultBodyLimit::max(limit))
    } else {
        router
    };

    router.with_state(state)
}

/// Handler for `/execute_tool`.  Decodes the envelope, fills in a request
/// id when the caller sent none and hands the request to the dispatcher.
/// Logical failures map to fixed strings inside a 200 response.
async fn execute_tool_handler(
    State(state): State<AppState>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(mut request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection.into_response(),
    };
    if request.request_id.is_none() {
        let seq = state.request_seq.fetch_add(1, Ordering::Relaxed);
        request.request_id = Some(format!("req-{seq}"));
    }

    state.metric_requests_total.fetch_add(1, Ordering::Relaxed);

    let result = match state.dispatcher.dispatch(&request).await {
        Ok(value) => value,
        Err(err) => {
            let counter = match &err {
                DispatchError::NotFound { .. } => &state.metric_not_found_total,
                DispatchError::InvalidArguments { .. } => &state.metric_invalid_arguments_total,
                DispatchError::Internal { .. } => &state.metric_internal_errors_total,
            };
            counter.fetch_add(1, Ordering::Relaxed);
            Value::String(err.client_message())
        }
    };

    (StatusCode::OK, Json(ExecuteResponse { result })).into_response()
}

/// Simple health endpoint for container readiness / liveness checks.
async fn healthz_handler(State(state): State<AppState>) -> axum::response::Response {
    let body = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "functionCount": state.registry.len(),
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// Prometheus-style metrics exposition.  Text format with simple counters.
async fn metrics_handler(State(state): State<AppState>) -> axum::response::Response {
    use std::fmt::Write as _;

    let requests = state.metric_requests_total.load(Ordering::Relaxed);
    let not_found = state.metric_not_found_total.load(Ordering::Relaxed);
    let invalid = state.metric_invalid_arguments_total.load(Ordering::Relaxed);
    let internal = state.metric_internal_errors_total.load(Ordering::Relaxed);
    let log_lines = state.logger.lines_total();
    let log_errors = state.logger.write_errors_total();

    let mut buf = String::new();
    writeln!(
        &mut buf,
        "# HELP toolgate_requests_total Total execute_tool requests processed"
    )
    .ok();
    writeln!(&mut buf, "# TYPE toolgate_requests_total counter").ok();
    writeln!(&mut buf, "toolgate_requests_total {}", requests).ok();
    writeln!(
        &mut buf,
        "# HELP toolgate_dispatch_failures_total Classified dispatch failures\n# TYPE toolgate_dispatch_failures_total counter"
    )
    .ok();
    writeln!(
        &mut buf,
        "toolgate_dispatch_failures_total{{kind=\"not_found\"}} {}",
        not_found
    )
    .ok();
    writeln!(
        &mut buf,
        "toolgate_dispatch_failures_total{{kind=\"invalid_arguments\"}} {}",
        invalid
    )
    .ok();
    writeln!(
        &mut buf,
        "toolgate_dispatch_failures_total{{kind=\"internal\"}} {}",
        internal
    )
    .ok();
    writeln!(
        &mut buf,
        "# HELP toolgate_log_lines_total Structured log lines written across sinks\n# TYPE toolgate_log_lines_total counter"
    )
    .ok();
    writeln!(&mut buf, "toolgate_log_lines_total {}", log_lines).ok();
    writeln!(
        &mut buf,
        "# HELP toolgate_log_write_errors_total Structured log sink write failures\n# TYPE toolgate_log_write_errors_total counter"
    )
    .ok();
    writeln!(&mut buf, "toolgate_log_write_errors_total {}", log_errors).ok();

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        buf,
    )
        .into_response()
}
