//! HTTP gateway subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → middleware.rs (request ID, access log, status metrics)
//!     → server.rs (/bus/{*subject} → bus subject)
//!     → Connection::request with X-Request-ID, query and trace headers
//!     → reply or service error mapped back to an HTTP response
//! ```

pub mod middleware;
pub mod server;

pub use middleware::{access_log, code_stats, request_id, X_REQUEST_ID};
pub use server::{subject_from_path, HttpServer};
