//! Contexts handed to application handlers.

use std::fmt;
use std::sync::Arc;

use opentelemetry::global::BoxedTracer;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::Context;

use crate::dispatch::carrier;
use crate::errors::ClientError;
use crate::transport::{Connection, HeaderStore};

/// Tracer plus propagator. Absent when a service runs untraced.
#[derive(Clone)]
pub struct Telemetry {
    tracer: Arc<BoxedTracer>,
    propagator: Arc<dyn TextMapPropagator + Send + Sync>,
}

impl Telemetry {
    pub fn new<T, S, P>(tracer: T, propagator: P) -> Self
    where
        T: Tracer<Span = S> + Send + Sync + 'static,
        S: Span + Send + Sync + 'static,
        P: TextMapPropagator + Send + Sync + 'static,
    {
        Self {
            tracer: Arc::new(BoxedTracer::new(Box::new(tracer))),
            propagator: Arc::new(propagator),
        }
    }

    pub fn tracer(&self) -> &BoxedTracer {
        &self.tracer
    }

    pub fn propagator(&self) -> &(dyn TextMapPropagator + Send + Sync) {
        self.propagator.as_ref()
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("propagator", &self.propagator)
            .finish_non_exhaustive()
    }
}

/// Process-wide configuration shared by every dispatcher.
#[derive(Clone)]
pub struct AppContext {
    pub conn: Connection,
    pub telemetry: Option<Telemetry>,
}

impl AppContext {
    /// Untraced context.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }
}

/// Per-request bundle threaded into every handler call.
///
/// Built by the dispatcher for one request and dropped when the handler
/// returns. Read-only.
#[derive(Clone)]
pub struct HandlerContext {
    logger: tracing::Span,
    request_id: String,
    conn: Connection,
    telemetry: Option<Telemetry>,
    bridge_error: Option<ClientError>,
}

impl HandlerContext {
    pub(crate) fn new(
        logger: tracing::Span,
        request_id: String,
        app: &AppContext,
        bridge_error: Option<ClientError>,
    ) -> Self {
        Self {
            logger,
            request_id,
            conn: app.conn.clone(),
            telemetry: app.telemetry.clone(),
            bridge_error,
        }
    }

    /// Request-scoped span carrying `request_id` and `path`.
    pub fn logger(&self) -> &tracing::Span {
        &self.logger
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Shared connection, for secondary requests.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn tracer(&self) -> Option<&BoxedTracer> {
        self.telemetry.as_ref().map(Telemetry::tracer)
    }

    pub fn propagator(&self) -> Option<&(dyn TextMapPropagator + Send + Sync)> {
        self.telemetry.as_ref().map(Telemetry::propagator)
    }

    /// Header bridge failure for this request, if bridging failed.
    pub fn bridge_error(&self) -> Option<&ClientError> {
        self.bridge_error.as_ref()
    }

    /// Inject `cx` into outbound headers. No-op when untraced.
    pub fn inject_trace_headers<S>(&self, cx: &Context, headers: &mut S)
    where
        S: HeaderStore + ?Sized,
    {
        if let Some(propagator) = self.propagator() {
            carrier::inject_trace_headers(cx, propagator, headers);
        }
    }
}
