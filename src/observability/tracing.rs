//! Distributed tracing support.
//!
//! # Responsibilities
//! - Build the OpenTelemetry tracer provider (OTLP export when configured)
//! - Hand the dispatcher a `Telemetry` bundle with W3C Trace Context propagation
//!
//! # Design Decisions
//! - Optional: services run untraced unless enabled in config
//! - No global tracer or propagator is installed; the bundle is passed explicitly

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{ExporterBuildError, SpanExporter, WithExportConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;

use crate::dispatch::Telemetry;

/// Build a tracer provider for `service_name`.
///
/// With an `otlp_endpoint` spans are batched to it over gRPC; without one
/// spans are recorded but not exported.
pub fn init_tracer(
    service_name: &str,
    otlp_endpoint: Option<&str>,
) -> Result<(SdkTracerProvider, Telemetry), ExporterBuildError> {
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    let mut builder = SdkTracerProvider::builder().with_resource(resource);
    if let Some(endpoint) = otlp_endpoint {
        let exporter = SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()?;
        builder = builder.with_batch_exporter(exporter);
        tracing::info!(endpoint = %endpoint, "OTLP span export enabled");
    }

    let provider = builder.build();
    let telemetry = Telemetry::new(
        provider.tracer(service_name.to_string()),
        TraceContextPropagator::new(),
    );

    Ok((provider, telemetry))
}
