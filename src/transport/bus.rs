//! In-process, subject-addressed request/response bus.
//!
//! # Responsibilities
//! - Deliver published messages to every subscriber of a subject
//! - Deliver requests to exactly one subscriber and wait for its reply
//! - Enforce the caller-supplied request timeout
//!
//! # Design Decisions
//! - Subjects match exactly; no wildcards
//! - Requests rotate across subscribers of the same subject
//! - Dropped subscriptions are pruned lazily on the next delivery

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::transport::headers::Headers;
use crate::transport::request::BusRequest;

/// Header carrying the status code of a service error reply.
pub const SERVICE_ERROR_CODE: &str = "Nats-Service-Error-Code";

/// Header carrying the description of a service error reply.
pub const SERVICE_ERROR: &str = "Nats-Service-Error";

/// Errors raised by the bus.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("no responders available for subject {0}")]
    NoResponders(String),

    #[error("request on {subject} timed out after {timeout:?}")]
    Timeout { subject: String, timeout: Duration },

    #[error("request already responded to")]
    AlreadyResponded,

    #[error("message does not expect a reply")]
    NoReply,

    #[error("requester is no longer waiting")]
    RequesterGone,

    #[error("invalid subject: {0:?}")]
    InvalidSubject(String),

    #[error("connection closed")]
    Closed,

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A message travelling over the bus.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub subject: String,
    pub headers: Headers,
    pub data: Bytes,
}

impl Message {
    pub fn new(subject: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            headers: Headers::new(),
            data: data.into(),
        }
    }

    /// Builder-style header insert.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Status code of a service error reply, if this is one.
    pub fn error_code(&self) -> Option<&str> {
        self.headers.get(SERVICE_ERROR_CODE)
    }

    /// Description of a service error reply, if this is one.
    pub fn error_description(&self) -> Option<&str> {
        self.headers.get(SERVICE_ERROR)
    }

    pub fn is_error(&self) -> bool {
        self.error_code().is_some()
    }
}

/// A delivered message plus the reply slot, if the sender waits for one.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub(crate) message: Message,
    pub(crate) reply: Option<oneshot::Sender<Message>>,
}

struct ConnectionInner {
    subscribers: DashMap<String, Vec<mpsc::UnboundedSender<Envelope>>>,
    next: AtomicUsize,
    closed: AtomicBool,
}

/// Shared connection handle. Cheap to clone, safe to use from any task.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                subscribers: DashMap::new(),
                next: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribe to an exact subject.
    pub fn subscribe(&self, subject: &str) -> Result<Subscription, BusError> {
        self.ensure_open()?;
        validate_subject(subject)?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .entry(subject.to_string())
            .or_default()
            .push(tx);

        tracing::debug!(subject = %subject, "Subscribed");
        Ok(Subscription {
            subject: subject.to_string(),
            rx,
        })
    }

    /// Fire-and-forget delivery to every subscriber.
    pub fn publish(&self, msg: Message) -> Result<(), BusError> {
        self.ensure_open()?;
        validate_subject(&msg.subject)?;

        if let Some(mut subs) = self.inner.subscribers.get_mut(&msg.subject) {
            subs.retain(|tx| !tx.is_closed());
            for tx in subs.iter() {
                let _ = tx.send(Envelope {
                    message: msg.clone(),
                    reply: None,
                });
            }
        }
        Ok(())
    }

    /// Send a request to one subscriber and wait up to `timeout` for the reply.
    pub async fn request(&self, msg: Message, timeout: Duration) -> Result<Message, BusError> {
        self.ensure_open()?;
        validate_subject(&msg.subject)?;

        let subject = msg.subject.clone();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.deliver_one(Envelope {
            message: msg,
            reply: Some(reply_tx),
        })?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            // Responder dropped the request without answering.
            Ok(Err(_)) => Err(BusError::NoResponders(subject)),
            Err(_) => Err(BusError::Timeout { subject, timeout }),
        }
    }

    /// Close the connection. Existing subscriptions end.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.subscribers.clear();
        tracing::debug!("Connection closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        Ok(())
    }

    fn deliver_one(&self, envelope: Envelope) -> Result<(), BusError> {
        let subject = envelope.message.subject.clone();
        let mut subs = match self.inner.subscribers.get_mut(&subject) {
            Some(subs) => subs,
            None => return Err(BusError::NoResponders(subject)),
        };

        subs.retain(|tx| !tx.is_closed());
        if subs.is_empty() {
            return Err(BusError::NoResponders(subject));
        }

        let idx = self.inner.next.fetch_add(1, Ordering::Relaxed) % subs.len();
        subs.get(idx)
            .ok_or_else(|| BusError::NoResponders(subject.clone()))?
            .send(envelope)
            .map_err(|_| BusError::NoResponders(subject))
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_subject(subject: &str) -> Result<(), BusError> {
    if subject.is_empty() || subject.chars().any(char::is_whitespace) {
        return Err(BusError::InvalidSubject(subject.to_string()));
    }
    Ok(())
}

/// Stream of inbound requests for one subject.
#[derive(Debug)]
pub struct Subscription {
    subject: String,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl Subscription {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Next inbound request, or `None` once the connection is closed.
    pub async fn next(&mut self) -> Option<BusRequest> {
        self.rx
            .recv()
            .await
            .map(|env| BusRequest::from_envelope(env.message, env.reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::request::MicroRequest;

    #[tokio::test]
    async fn test_request_reply() {
        let conn = Connection::new();
        let mut sub = conn.subscribe("echo").unwrap();

        tokio::spawn(async move {
            while let Some(req) = sub.next().await {
                let data = Bytes::copy_from_slice(req.data());
                req.respond(data).unwrap();
            }
        });

        let reply = conn
            .request(Message::new("echo", "hi"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply.data, Bytes::from_static(b"hi"));
        assert!(!reply.is_error());
    }

    #[tokio::test]
    async fn test_no_responders() {
        let conn = Connection::new();
        let err = conn
            .request(Message::new("nobody.home", ""), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::NoResponders(_)));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let conn = Connection::new();
        // Keep the subscription alive but never answer.
        let _sub = conn.subscribe("slow").unwrap();

        let err = conn
            .request(Message::new("slow", ""), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_publish_fans_out() {
        let conn = Connection::new();
        let mut a = conn.subscribe("events").unwrap();
        let mut b = conn.subscribe("events").unwrap();

        conn.publish(Message::new("events", "x")).unwrap();

        assert_eq!(a.next().await.unwrap().data(), b"x");
        assert_eq!(b.next().await.unwrap().data(), b"x");
    }

    #[tokio::test]
    async fn test_dropped_subscription_pruned() {
        let conn = Connection::new();
        drop(conn.subscribe("gone").unwrap());

        let err = conn
            .request(Message::new("gone", ""), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::NoResponders(_)));
    }

    #[test]
    fn test_invalid_subject() {
        let conn = Connection::new();
        assert!(matches!(conn.subscribe(""), Err(BusError::InvalidSubject(_))));
        assert!(matches!(conn.subscribe("a b"), Err(BusError::InvalidSubject(_))));
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let conn = Connection::new();
        let mut sub = conn.subscribe("x").unwrap();
        conn.close();

        assert!(sub.next().await.is_none());
        assert!(matches!(conn.publish(Message::new("x", "")), Err(BusError::Closed)));
    }
}
