//! Inbound request binding.
//!
//! `MicroRequest` is everything the dispatcher needs from a transport:
//! subject, headers, payload, and the two ways to answer.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::transport::bus::{BusError, Message, SERVICE_ERROR, SERVICE_ERROR_CODE};
use crate::transport::headers::Headers;

/// A single inbound request.
///
/// Clones share the reply slot, so a request is answered at most once no
/// matter which clone responds.
pub trait MicroRequest: Clone + Send + Sync + 'static {
    fn subject(&self) -> &str;

    fn headers(&self) -> &Headers;

    fn headers_mut(&mut self) -> &mut Headers;

    fn data(&self) -> &[u8];

    /// Reply with a payload.
    fn respond(&self, data: Bytes) -> Result<(), BusError>;

    /// Reply with a service error.
    fn error(&self, code: &str, description: &str, data: Bytes) -> Result<(), BusError>;

    /// Reply with a JSON-encoded payload.
    fn respond_json<T>(&self, value: &T) -> Result<(), BusError>
    where
        T: Serialize + ?Sized,
        Self: Sized,
    {
        let data = serde_json::to_vec(value)?;
        self.respond(Bytes::from(data))
    }
}

type ReplySlot = Arc<Mutex<Option<oneshot::Sender<Message>>>>;

/// A request delivered by the in-process bus.
#[derive(Debug, Clone)]
pub struct BusRequest {
    message: Message,
    expects_reply: bool,
    reply: ReplySlot,
}

impl BusRequest {
    pub(crate) fn from_envelope(message: Message, reply: Option<oneshot::Sender<Message>>) -> Self {
        Self {
            message,
            expects_reply: reply.is_some(),
            reply: Arc::new(Mutex::new(reply)),
        }
    }

    /// A request detached from any connection, plus the receiving end of its reply.
    pub fn detached(message: Message) -> (Self, oneshot::Receiver<Message>) {
        let (tx, rx) = oneshot::channel();
        (Self::from_envelope(message, Some(tx)), rx)
    }

    fn send_reply(&self, reply: Message) -> Result<(), BusError> {
        let sender = self
            .reply
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match sender {
            Some(tx) => tx.send(reply).map_err(|_| BusError::RequesterGone),
            None if self.expects_reply => Err(BusError::AlreadyResponded),
            None => Err(BusError::NoReply),
        }
    }
}

impl MicroRequest for BusRequest {
    fn subject(&self) -> &str {
        &self.message.subject
    }

    fn headers(&self) -> &Headers {
        &self.message.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.message.headers
    }

    fn data(&self) -> &[u8] {
        &self.message.data
    }

    fn respond(&self, data: Bytes) -> Result<(), BusError> {
        self.send_reply(Message {
            subject: String::new(),
            headers: Headers::new(),
            data,
        })
    }

    fn error(&self, code: &str, description: &str, data: Bytes) -> Result<(), BusError> {
        let mut headers = Headers::new();
        headers.insert(SERVICE_ERROR_CODE, code);
        headers.insert(SERVICE_ERROR, description);

        self.send_reply(Message {
            subject: String::new(),
            headers,
            data,
        })
    }
}
