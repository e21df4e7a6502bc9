//! The request dispatcher.
//!
//! `ErrorHandler` wraps an application handler and runs, for every request:
//!
//! ```text
//! start → identify (X-Request-ID) → request span → header bridge
//!       → trace extract + server span → invoke handler
//!       → span status / error response → span end → duration log
//! ```
//!
//! A request without a correlation ID is answered with a 400 and never
//! reaches the handler. Header bridge failures are advisory: they are
//! logged, exposed through `HandlerContext::bridge_error`, and the handler
//! still runs with the unbridged headers.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::BoxFuture;
use opentelemetry::trace::{Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use tracing::Instrument;

use crate::dispatch::bridge::build_query_headers;
use crate::dispatch::carrier::extract_trace_context;
use crate::dispatch::context::{AppContext, HandlerContext};
use crate::dispatch::message::{msg_id, X_REQUEST_ID};
use crate::dispatch::respond::{handle_request_error, log_causes};
use crate::errors::{ClientError, ErrorKind, HandlerError};
use crate::observability::metrics;
use crate::transport::{Handler, MicroRequest};

/// An application handler.
///
/// Receives the trace context (carrying the server span), a clone of the
/// request to respond on, and the per-request `HandlerContext`.
pub trait AppHandler<R>: Send + Sync + 'static {
    fn call(
        &self,
        cx: Context,
        req: R,
        h: HandlerContext,
    ) -> BoxFuture<'static, Result<(), HandlerError>>;
}

impl<R, F, Fut> AppHandler<R> for F
where
    F: Fn(Context, R, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn call(
        &self,
        cx: Context,
        req: R,
        h: HandlerContext,
    ) -> BoxFuture<'static, Result<(), HandlerError>> {
        Box::pin(self(cx, req, h))
    }
}

struct Inner<H> {
    name: String,
    app: AppContext,
    handler: H,
}

/// Wraps an `AppHandler` into a transport `Handler`.
pub struct ErrorHandler<H> {
    inner: Arc<Inner<H>>,
}

impl<H> Clone for ErrorHandler<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H> ErrorHandler<H> {
    /// `name` is used as the server span name and the metrics label.
    pub fn new(name: impl Into<String>, app: AppContext, handler: H) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                app,
                handler,
            }),
        }
    }

    /// Run the full pipeline for one request.
    pub async fn dispatch<R>(&self, mut req: R)
    where
        R: MicroRequest,
        H: AppHandler<R>,
    {
        let start = Instant::now();
        let name = &self.inner.name;

        let id = match msg_id(req.headers()) {
            Ok(id) => id,
            Err(err) => {
                let logger = tracing::info_span!("request", path = %req.subject());
                logger.in_scope(|| {
                    handle_request_error(&ClientError::new(err, 400).into(), &req);
                    metrics::record_bus_request(name, "rejected");
                    log_duration(start);
                });
                return;
            }
        };

        let logger = tracing::info_span!("request", request_id = %id, path = %req.subject());

        let bridge_error = logger.in_scope(|| match build_query_headers(req.headers_mut()) {
            Ok(()) => None,
            Err(err) => {
                let ce = ClientError::new(err, 400);
                tracing::warn!(error = %ce, "Header bridge failed, continuing with unbridged headers");
                log_causes(&ce);
                Some(ce)
            }
        });

        let cx = self.start_span(&id, &req);
        let handler_ctx = HandlerContext::new(logger.clone(), id, &self.inner.app, bridge_error);

        let result = self
            .inner
            .handler
            .call(cx.clone(), req.clone(), handler_ctx)
            .instrument(logger.clone())
            .await;

        logger.in_scope(|| {
            let span = cx.span();
            let outcome = match result {
                Ok(()) => {
                    span.set_status(Status::Ok);
                    "success"
                }
                Err(err) => {
                    span.set_status(Status::error(err.to_string()));
                    span.record_error(&err);
                    handle_request_error(&err, &req);
                    match err.kind() {
                        ErrorKind::ClientFault => "client_error",
                        ErrorKind::Internal => "internal_error",
                    }
                }
            };
            span.end();

            metrics::record_bus_request(name, outcome);
            log_duration(start);
        });
    }

    /// Child of any upstream context, or an empty context when untraced.
    fn start_span<R: MicroRequest>(&self, id: &str, req: &R) -> Context {
        let telemetry = match &self.inner.app.telemetry {
            Some(t) => t,
            None => return Context::new(),
        };

        let parent = extract_trace_context(telemetry.propagator(), req.headers());
        let span = telemetry
            .tracer()
            .start_with_context(self.inner.name.clone(), &parent);
        let cx = parent.with_span(span);
        cx.span()
            .set_attribute(KeyValue::new(X_REQUEST_ID, id.to_string()));
        cx
    }
}

impl<R, H> Handler<R> for ErrorHandler<H>
where
    R: MicroRequest,
    H: AppHandler<R>,
{
    fn handle(&self, req: R) -> BoxFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move { this.dispatch(req).await })
    }
}

fn log_duration(start: Instant) {
    let duration_ms = start.elapsed().as_millis() as u64;
    tracing::info!(duration_ms, "duration {}ms", duration_ms);
}
