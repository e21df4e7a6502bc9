//! Request-dispatch middleware for services on a subject-addressed message bus.

// Core subsystems
pub mod dispatch;
pub mod errors;
pub mod http;
pub mod transport;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use dispatch::{AppContext, ErrorHandler, HandlerContext, Telemetry};
pub use errors::{ClientError, ErrorKind, HandlerError, ResultExt};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use transport::{BusRequest, Connection, Message, MicroRequest, Service};
