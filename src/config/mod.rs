//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → shared via ArcSwap to the gateway
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<ServiceConfig>
//!     → new log level handed to the log level owner
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Invalid reloads are logged and dropped; the running config stays

use std::sync::Arc;

use arc_swap::ArcSwap;

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{BusConfig, HttpConfig, ObservabilityConfig, ServiceConfig, ServiceSection};
pub use validation::ValidationError;
pub use watcher::ConfigWatcher;

/// Running configuration, swapped atomically on reload.
pub type SharedConfig = Arc<ArcSwap<ServiceConfig>>;

pub fn shared(config: ServiceConfig) -> SharedConfig {
    Arc::new(ArcSwap::from_pointee(config))
}
