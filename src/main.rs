//! sencillo: a bus service behind an HTTP gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     HTTP client
//!         │  /bus/math/add?x=1
//!         ▼
//!   ┌──────────────┐   math.add    ┌─────────────┐   ┌──────────────┐
//!   │ http gateway │──────────────▶│ transport   │──▶│ ErrorHandler │──▶ app handler
//!   │  middleware  │◀──────────────│ (bus)       │◀──│  dispatcher  │◀──
//!   └──────────────┘    reply      └─────────────┘   └──────────────┘
//!
//!   Cross-cutting: config (hot reload) · logging (runtime level)
//!                  metrics (Prometheus) · tracing (OpenTelemetry)
//!                  lifecycle (signals, health checks)
//! ```
//!
//! The demo service exposes `math.add` and `math.subtract`. The log level
//! can be changed at runtime through the config file or by publishing a
//! level name on `configs.<service>.log_level`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use opentelemetry::Context;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use sencillo::config::{self, load_config, ConfigWatcher, ServiceConfig};
use sencillo::dispatch::{query_values, AppContext, ErrorHandler, HandlerContext};
use sencillo::errors::{HandlerError, ResultExt};
use sencillo::http::HttpServer;
use sencillo::lifecycle::{handle_notify, Shutdown};
use sencillo::observability::logging::{init_logging, LogLevel};
use sencillo::observability::{metrics, tracing as otel};
use sencillo::transport::{BusRequest, Connection, MicroRequest, Service};

#[derive(Parser)]
#[command(name = "sencillo")]
#[command(about = "Bus service with an HTTP gateway", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct MathRequest {
    a: i64,
    b: i64,
}

#[derive(Debug, Serialize)]
struct MathResponse {
    result: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = LogLevel::default();
    init_logging(&level);
    let (level_tx, level_rx) = mpsc::unbounded_channel();
    level.watch(level_rx);

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    let _ = level_tx.send(config.observability.log_level.clone());

    tracing::info!(
        service = %config.service.name,
        version = %config.service.version,
        http_enabled = config.http.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let (provider, telemetry) = if config.observability.tracing_enabled {
        let (provider, telemetry) = otel::init_tracer(
            &config.service.name,
            config.observability.otlp_endpoint.as_deref(),
        )?;
        (Some(provider), Some(telemetry))
    } else {
        (None, None)
    };

    let conn = Connection::new();
    let mut app = AppContext::new(conn.clone());
    if let Some(telemetry) = &telemetry {
        app = app.with_telemetry(telemetry.clone());
    }

    let service = Service::new(conn.clone(), config.service.info());
    service.add_endpoint("add", "math.add", ErrorHandler::new("math.add", app.clone(), add))?;
    service.add_endpoint(
        "subtract",
        "math.subtract",
        ErrorHandler::new("math.subtract", app.clone(), subtract),
    )?;

    // Runtime log level over the bus.
    let mut level_sub = conn.subscribe(&config.service.log_level_subject())?;
    let bus_level_tx = level_tx.clone();
    tokio::spawn(async move {
        while let Some(req) = level_sub.next().await {
            let raw = String::from_utf8_lossy(req.data()).into_owned();
            if bus_level_tx.send(raw).is_err() {
                break;
            }
        }
    });

    let shared = config::shared(config.clone());

    // Keep the watcher alive for the life of the process.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let guard = watcher.run()?;
            let shared = shared.clone();
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    let _ = level_tx.send(new_config.observability.log_level.clone());
                    shared.store(Arc::new(new_config));
                    tracing::info!("Configuration reloaded");
                }
            });
            Some(guard)
        }
        None => None,
    };

    let shutdown = Shutdown::new();
    let http_task = if config.http.enabled {
        let listener = TcpListener::bind(&config.http.bind_address).await?;
        let server = HttpServer::new(conn.clone(), telemetry.clone(), shared.clone());
        let stop = shutdown.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(listener, stop).await {
                tracing::error!(error = %e, "HTTP server failed");
            }
        }))
    } else {
        None
    };

    handle_notify(&service, Vec::new()).await;

    shutdown.trigger();
    if let Some(task) = http_task {
        let _ = task.await;
    }
    conn.close();

    if let Some(provider) = provider {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn add(_cx: Context, req: BusRequest, h: HandlerContext) -> Result<(), HandlerError> {
    let input: MathRequest = serde_json::from_slice(req.data()).client_error(400)?;
    let result = input.a.checked_add(input.b).ok_or_else(overflow)?;
    h.logger().in_scope(|| tracing::debug!(result, "computed sum"));
    req.respond_json(&MathResponse { result }).internal()
}

/// Subtracts `b` from `a`. With `?reverse=true` on the gateway URL it
/// subtracts `a` from `b` instead.
async fn subtract(_cx: Context, req: BusRequest, h: HandlerContext) -> Result<(), HandlerError> {
    let input: MathRequest = serde_json::from_slice(req.data()).client_error(400)?;
    let reverse = query_values(req.headers(), "reverse")
        .first()
        .is_some_and(|v| v == "true");
    let (a, b) = if reverse { (input.b, input.a) } else { (input.a, input.b) };
    let result = a.checked_sub(b).ok_or_else(overflow)?;
    h.logger().in_scope(|| tracing::debug!(result, reverse, "computed difference"));
    req.respond_json(&MathResponse { result }).internal()
}

fn overflow() -> HandlerError {
    sencillo::ClientError::new(std::io::Error::other("integer overflow"), 422).into()
}
