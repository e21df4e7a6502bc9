//! Error taxonomy shared by every handler.
//!
//! # Responsibilities
//! - Separate what the caller is told (`details`) from what gets logged (`causes`)
//! - Render the canonical JSON error envelope
//! - Classify handler failures as caller-fault or internal without probing types at runtime
//!
//! # Design Decisions
//! - `ClientError` is immutable once built; construction hooks run before it is returned
//! - `HandlerError` carries an explicit `ErrorKind` discriminant
//! - Causes never reach `body()`

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;

use crate::dispatch::BridgeError;
use crate::transport::BusError;

/// Boxed error used for internal faults.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// An underlying cause kept for logging.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Post-processing hook applied to a freshly built `ClientError`.
pub type ClientErrorOpt = Box<dyn FnOnce(&mut ClientError) + Send>;

/// Body written for every error that is not a `ClientError`.
pub const INTERNAL_ERROR_BODY: &[u8] = br#"{"errors": ["internal server error"]}"#;

/// A caller-fault error.
///
/// `details` are shown to the caller, `causes` are only ever logged.
#[derive(Debug, Clone)]
pub struct ClientError {
    status: u16,
    details: Vec<String>,
    causes: Vec<Cause>,
}

impl ClientError {
    /// Build a client error from a single cause.
    pub fn new<E>(cause: E, status: u16) -> Self
    where
        E: Into<BoxError>,
    {
        Self::multiple(vec![cause.into()], status)
    }

    /// Build a client error from a single cause, applying `opts` in order.
    pub fn new_with<E>(cause: E, status: u16, opts: Vec<ClientErrorOpt>) -> Self
    where
        E: Into<BoxError>,
    {
        Self::multiple_with(vec![cause.into()], status, opts)
    }

    /// Build a client error from several causes. One detail per cause.
    pub fn multiple(causes: Vec<BoxError>, status: u16) -> Self {
        Self::multiple_with(causes, status, Vec::new())
    }

    /// Build a client error from several causes, applying `opts` in order.
    pub fn multiple_with(causes: Vec<BoxError>, status: u16, opts: Vec<ClientErrorOpt>) -> Self {
        let causes: Vec<Cause> = causes.into_iter().map(Arc::from).collect();
        let details = causes.iter().map(|c| c.to_string()).collect();

        let mut ce = Self {
            status,
            details,
            causes,
        };

        for opt in opts {
            opt(&mut ce);
        }

        ce
    }

    /// Status code to return.
    pub fn code(&self) -> u16 {
        self.status
    }

    /// Human readable details shown to the caller.
    pub fn details(&self) -> &[String] {
        &self.details
    }

    /// Original causes, for logging only.
    pub fn logged_errors(&self) -> &[Cause] {
        &self.causes
    }

    /// Canonical reason phrase for the status code.
    pub fn status_text(&self) -> &'static str {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
    }

    /// JSON error envelope: `{"errors": [...]}`.
    pub fn body(&self) -> Vec<u8> {
        let escaped: Vec<String> = self
            .details
            .iter()
            .map(|d| serde_json::Value::String(d.clone()).to_string())
            .collect();

        format!(r#"{{"errors": [{}]}}"#, escaped.join(", ")).into_bytes()
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.details.join(", "))
    }
}

impl StdError for ClientError {}

/// Override the status code.
pub fn with_status(status: u16) -> ClientErrorOpt {
    Box::new(move |ce| ce.status = status)
}

/// Replace the caller-facing details. Causes are untouched.
pub fn with_details<I, S>(details: I) -> ClientErrorOpt
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let details: Vec<String> = details.into_iter().map(Into::into).collect();
    Box::new(move |ce| ce.details = details)
}

/// Replace the details with the status reason phrase.
pub fn redacted() -> ClientErrorOpt {
    Box::new(|ce| {
        let reason = ce.status_text();
        let reason = if reason.is_empty() { "error" } else { reason };
        ce.details = vec![reason.to_lowercase()];
    })
}

/// Which side of the request/response boundary an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ClientFault,
    Internal,
}

/// Error returned by application handlers.
#[derive(Debug)]
pub enum HandlerError {
    /// Caller-fault: status and body come from the error itself.
    Client(ClientError),
    /// Anything else: logged, caller gets a generic 500.
    Internal(BoxError),
}

impl HandlerError {
    /// Wrap any error as an internal fault.
    pub fn internal<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        HandlerError::Internal(err.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::Client(_) => ErrorKind::ClientFault,
            HandlerError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the client error, if this is a caller fault.
    pub fn as_client(&self) -> Option<&ClientError> {
        match self {
            HandlerError::Client(ce) => Some(ce),
            HandlerError::Internal(_) => None,
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Client(ce) => fmt::Display::fmt(ce, f),
            HandlerError::Internal(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl StdError for HandlerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            HandlerError::Client(_) => None,
            HandlerError::Internal(e) => Some(e.as_ref()),
        }
    }
}

impl From<ClientError> for HandlerError {
    fn from(ce: ClientError) -> Self {
        HandlerError::Client(ce)
    }
}

impl From<BridgeError> for HandlerError {
    fn from(err: BridgeError) -> Self {
        HandlerError::Client(ClientError::new(err, 400))
    }
}

impl From<BusError> for HandlerError {
    fn from(err: BusError) -> Self {
        HandlerError::internal(err)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::internal(err)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::internal(err)
    }
}

/// Classify a fallible result for a handler.
pub trait ResultExt<T> {
    /// Treat the error as the caller's fault with the given status.
    fn client_error(self, status: u16) -> Result<T, HandlerError>;

    /// Treat the error as an internal fault.
    fn internal(self) -> Result<T, HandlerError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn client_error(self, status: u16) -> Result<T, HandlerError> {
        self.map_err(|e| HandlerError::Client(ClientError::new(e, status)))
    }

    fn internal(self) -> Result<T, HandlerError> {
        self.map_err(HandlerError::internal)
    }
}
