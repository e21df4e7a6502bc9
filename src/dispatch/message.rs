//! Correlation IDs and outbound message helpers.

use thiserror::Error;
use uuid::Uuid;

use crate::transport::{Headers, Message, MicroRequest};

/// Header carrying the correlation ID.
pub const X_REQUEST_ID: &str = "X-Request-ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("required request ID not found")]
pub struct MissingRequestId;

/// Correlation ID of a message. Empty counts as missing.
pub fn msg_id(headers: &Headers) -> Result<String, MissingRequestId> {
    match headers.get(X_REQUEST_ID) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(MissingRequestId),
    }
}

/// Request-scoped span carrying the correlation ID and subject.
pub fn request_logger<R: MicroRequest>(req: &R) -> Result<tracing::Span, MissingRequestId> {
    let id = msg_id(req.headers())?;
    Ok(tracing::info_span!("request", request_id = %id, path = %req.subject()))
}

/// Outbound message with a fresh correlation ID.
pub fn new_msg_with_id() -> Message {
    Message::default().with_header(X_REQUEST_ID, Uuid::new_v4().to_string())
}

/// Outbound message carrying the headers and payload of an inbound request.
///
/// The subject is left empty for the caller to set.
pub fn request_to_msg<R: MicroRequest>(req: &R) -> Message {
    Message {
        subject: String::new(),
        headers: req.headers().clone(),
        data: bytes::Bytes::copy_from_slice(req.data()),
    }
}
