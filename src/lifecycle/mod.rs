//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every subscribed loop breaks → in-flight tasks finish
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT or a failed health check
//!         → reason logged → Service::stop()
//! ```
//!
//! # Design Decisions
//! - The first stop reason wins; later ones are ignored
//! - Health checks run on their own tasks and report through a channel

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{handle_notify, HealthCheck};
