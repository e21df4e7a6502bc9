//! Endpoint runner.
//!
//! A `Service` owns a set of named endpoints, each bound to one subject.
//! Every inbound request is handled on its own task.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::lifecycle::Shutdown;
use crate::transport::bus::{BusError, Connection};
use crate::transport::request::BusRequest;

/// Something that can serve an inbound request.
pub trait Handler<R>: Send + Sync + 'static {
    fn handle(&self, req: R) -> BoxFuture<'static, ()>;
}

/// Adapts a plain async closure into a `Handler`.
pub struct HandlerFn<F>(pub F);

impl<R, F, Fut> Handler<R> for HandlerFn<F>
where
    F: Fn(R) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, req: R) -> BoxFuture<'static, ()> {
        Box::pin((self.0)(req))
    }
}

/// Service identity.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// A registered endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointInfo {
    pub name: String,
    pub subject: String,
}

struct ServiceInner {
    conn: Connection,
    info: ServiceInfo,
    endpoints: Mutex<Vec<EndpointInfo>>,
    shutdown: Shutdown,
    stopped: AtomicBool,
}

/// A running service. Clones refer to the same service.
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

impl Service {
    pub fn new(conn: Connection, info: ServiceInfo) -> Self {
        tracing::info!(name = %info.name, version = %info.version, "Service created");
        Self {
            inner: Arc::new(ServiceInner {
                conn,
                info,
                endpoints: Mutex::new(Vec::new()),
                shutdown: Shutdown::new(),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn info(&self) -> &ServiceInfo {
        &self.inner.info
    }

    pub fn connection(&self) -> &Connection {
        &self.inner.conn
    }

    /// Bind `handler` to `subject`. Must be called inside a Tokio runtime.
    pub fn add_endpoint<H>(&self, name: &str, subject: &str, handler: H) -> Result<(), BusError>
    where
        H: Handler<BusRequest>,
    {
        if self.stopped() {
            return Err(BusError::Closed);
        }

        let mut sub = self.inner.conn.subscribe(subject)?;
        let mut stop = self.inner.shutdown.subscribe();
        let handler = Arc::new(handler);
        let endpoint = name.to_string();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.recv() => break,
                    next = sub.next() => match next {
                        Some(req) => {
                            tokio::spawn(handler.handle(req));
                        }
                        None => break,
                    },
                }
            }
            tracing::debug!(endpoint = %endpoint, "Endpoint stopped");
        });

        self.inner
            .endpoints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(EndpointInfo {
                name: name.to_string(),
                subject: subject.to_string(),
            });

        tracing::info!(endpoint = %name, subject = %subject, "Endpoint registered");
        Ok(())
    }

    pub fn endpoints(&self) -> Vec<EndpointInfo> {
        self.inner
            .endpoints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Stop every endpoint loop. In-flight requests finish on their own tasks.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown.trigger();
        tracing::info!(name = %self.inner.info.name, "Service stopped");
    }

    pub fn stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::bus::Message;
    use crate::transport::request::MicroRequest;
    use bytes::Bytes;
    use std::time::Duration;

    fn info() -> ServiceInfo {
        ServiceInfo {
            name: "test".into(),
            version: "0.0.1".into(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_endpoint_serves_requests() {
        let conn = Connection::new();
        let service = Service::new(conn.clone(), info());
        service
            .add_endpoint(
                "upper",
                "text.upper",
                HandlerFn(|req: BusRequest| async move {
                    let upper = String::from_utf8_lossy(req.data()).to_uppercase();
                    let _ = req.respond(Bytes::from(upper));
                }),
            )
            .unwrap();

        let reply = conn
            .request(Message::new("text.upper", "abc"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply.data, Bytes::from_static(b"ABC"));
        assert_eq!(
            service.endpoints(),
            vec![EndpointInfo {
                name: "upper".into(),
                subject: "text.upper".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_stop_ends_endpoints() {
        let conn = Connection::new();
        let service = Service::new(conn.clone(), info());
        service
            .add_endpoint("noop", "noop", HandlerFn(|_req: BusRequest| async {}))
            .unwrap();

        service.stop();
        assert!(service.stopped());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = conn
            .request(Message::new("noop", ""), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::NoResponders(_)));
        assert!(service
            .add_endpoint("late", "late", HandlerFn(|_req: BusRequest| async {}))
            .is_err());
    }
}
