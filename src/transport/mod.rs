//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! Connection::request(msg, timeout)
//!     → bus.rs (subject lookup, pick one subscriber)
//!     → Subscription::next() yields a BusRequest
//!     → service.rs spawns a task per request
//!     → Handler::handle (usually dispatch::ErrorHandler)
//!     → MicroRequest::respond / error
//!     → reply delivered to the waiting requester
//! ```
//!
//! # Design Decisions
//! - The connection handle is shared and never locked by handlers
//! - Headers are a multi-map exposed through the `HeaderStore` capability
//! - Timeouts are always chosen by the caller of `request`

pub mod bus;
pub mod headers;
pub mod request;
pub mod service;

pub use bus::{BusError, Connection, Message, Subscription, SERVICE_ERROR, SERVICE_ERROR_CODE};
pub use headers::{HeaderStore, Headers};
pub use request::{BusRequest, MicroRequest};
pub use service::{EndpointInfo, Handler, HandlerFn, Service, ServiceInfo};
