//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, runtime log level)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (OpenTelemetry spans keyed by correlation ID)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Distributed tracing (OTLP collector, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through logs and spans
//! - Log level changes are applied without restarting or locking

pub mod logging;
pub mod metrics;
pub mod tracing;
