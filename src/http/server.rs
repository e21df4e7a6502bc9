//! HTTP gateway onto the bus.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, limits, request ID, metrics)
//! - Translate `/bus/{*subject}` calls into bus requests
//! - Map replies and service errors back to HTTP
//!
//! # Design Decisions
//! - The raw query string travels untouched in `X-NatsBridge-UrlQuery`; the
//!   receiving dispatcher expands it
//! - Service error headers become the HTTP status; the reply body is
//!   returned verbatim
//! - Bus timeouts map to 504, missing responders to 503

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use opentelemetry::trace::{SpanKind, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::SharedConfig;
use crate::dispatch::{extract_trace_context, inject_trace_headers, Telemetry, BRIDGE_QUERY_HEADER};
use crate::errors::INTERNAL_ERROR_BODY;
use crate::http::middleware::{access_log, code_stats, request_id, X_REQUEST_ID};
use crate::transport::{BusError, Connection, Message};

/// State injected into handlers.
#[derive(Clone)]
struct GatewayState {
    conn: Connection,
    telemetry: Option<Telemetry>,
    config: SharedConfig,
}

/// HTTP front door for bus services.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(conn: Connection, telemetry: Option<Telemetry>, config: SharedConfig) -> Self {
        let state = GatewayState {
            conn,
            telemetry,
            config,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Timeout and body limit are fixed when the router is built; bus
    /// timeouts are read per request.
    #[allow(deprecated)]
    fn build_router(state: GatewayState) -> Router {
        let http = state.config.load().http.clone();

        Router::new()
            .route("/healthz", get(healthz))
            .route("/bus/{*subject}", any(bus_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(middleware::from_fn(request_id))
                    .layer(middleware::from_fn(access_log))
                    .layer(middleware::from_fn(code_stats))
                    .layer(RequestBodyLimitLayer::new(http.request_body_limit))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        http.request_timeout_secs,
                    ))),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Turn a URL path tail into a bus subject: `math/add` → `math.add`.
pub fn subject_from_path(path: &str) -> Option<String> {
    let subject = path
        .split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".");
    if subject.is_empty() {
        None
    } else {
        Some(subject)
    }
}

async fn healthz(State(state): State<GatewayState>) -> Response {
    if state.conn.is_closed() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "bus closed" })),
        )
            .into_response()
    } else {
        Json(serde_json::json!({ "status": "ok" })).into_response()
    }
}

async fn bus_handler(
    State(state): State<GatewayState>,
    Path(path): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let subject = match subject_from_path(&path) {
        Some(s) => s,
        None => return error_response(StatusCode::BAD_REQUEST, "missing subject"),
    };

    let mut msg = Message::new(subject.clone(), body);
    if let Some(id) = headers.get(&X_REQUEST_ID).and_then(|v| v.to_str().ok()) {
        msg.headers.insert(crate::dispatch::X_REQUEST_ID, id);
    }
    if let Some(query) = uri.query() {
        msg.headers.insert(BRIDGE_QUERY_HEADER, query);
    }

    let cx = gateway_span(&state, &subject, &headers);
    if let Some(telemetry) = &state.telemetry {
        inject_trace_headers(&cx, telemetry.propagator(), &mut msg.headers);
    }

    let timeout = Duration::from_millis(state.config.load().bus.request_timeout_ms);
    let result = state.conn.request(msg, timeout).await;

    let response = match result {
        Ok(reply) => reply_response(reply),
        Err(BusError::Timeout { .. }) => {
            tracing::warn!(subject = %subject, ?timeout, "Bus request timed out");
            error_response(StatusCode::GATEWAY_TIMEOUT, "bus request timed out")
        }
        Err(BusError::NoResponders(_)) => {
            tracing::warn!(subject = %subject, "No responders for subject");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "no responders")
        }
        Err(e) => {
            tracing::error!(subject = %subject, error = %e, "Bus request failed");
            (
                StatusCode::BAD_GATEWAY,
                [(header::CONTENT_TYPE, "application/json")],
                Bytes::from_static(INTERNAL_ERROR_BODY),
            )
                .into_response()
        }
    };

    cx.span()
        .set_attribute(KeyValue::new("http.status_code", response.status().as_u16() as i64));
    cx.span().end();
    response
}

/// Client span around the bus call, parented on any incoming trace context.
fn gateway_span(state: &GatewayState, subject: &str, headers: &HeaderMap) -> Context {
    let telemetry = match &state.telemetry {
        Some(t) => t,
        None => return Context::new(),
    };

    let parent = extract_trace_context(telemetry.propagator(), headers);
    let span = telemetry
        .tracer()
        .span_builder(format!("gateway {}", subject))
        .with_kind(SpanKind::Client)
        .start_with_context(telemetry.tracer(), &parent);
    parent.with_span(span)
}

fn reply_response(reply: Message) -> Response {
    let status = if reply.is_error() {
        reply
            .error_code()
            .and_then(|code| code.parse::<u16>().ok())
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        StatusCode::OK
    };

    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        reply.data,
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "errors": [message] }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_from_path() {
        assert_eq!(subject_from_path("math/add").as_deref(), Some("math.add"));
        assert_eq!(subject_from_path("/a//b/").as_deref(), Some("a.b"));
        assert_eq!(subject_from_path("single").as_deref(), Some("single"));
        assert_eq!(subject_from_path("/"), None);
    }
}
