//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files, and
//! every section has defaults so a minimal file is valid.

use serde::{Deserialize, Serialize};

use crate::transport::ServiceInfo;

/// Root configuration for a service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service identity.
    pub service: ServiceSection,

    /// HTTP gateway settings.
    pub http: HttpConfig,

    /// Bus client settings.
    pub bus: BusConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceSection {
    /// Service name; also names the tracer and the log-level subject.
    pub name: String,

    pub version: String,

    pub description: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: "sencillo".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: String::new(),
        }
    }
}

impl ServiceSection {
    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
        }
    }

    /// Subject the runtime log level is published on.
    pub fn log_level_subject(&self) -> String {
        format!("configs.{}.log_level", self.name)
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Serve the HTTP gateway.
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed per HTTP request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub request_body_limit: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            request_body_limit: 1024 * 1024,
        }
    }
}

/// Bus client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BusConfig {
    /// Timeout for requests the gateway forwards to the bus, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Create spans for dispatched requests.
    pub tracing_enabled: bool,

    /// OTLP gRPC collector endpoint. Spans are not exported when unset.
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            tracing_enabled: true,
            otlp_endpoint: None,
        }
    }
}
