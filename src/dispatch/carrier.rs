//! Trace-context carrier adapter.
//!
//! Wraps any `HeaderStore` so an OpenTelemetry propagator can read from it
//! (`Extractor`) or write to it (`Injector`). There is no buffering: every
//! call goes straight to the underlying container.

use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::Context;

use crate::transport::HeaderStore;

/// Carrier over a borrowed header container.
///
/// A shared borrow can be extracted from; an exclusive borrow can also be
/// injected into.
pub struct HeaderCarrier<T>(pub T);

impl<S> Extractor for HeaderCarrier<&S>
where
    S: HeaderStore + ?Sized,
{
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys()
    }
}

impl<S> Extractor for HeaderCarrier<&mut S>
where
    S: HeaderStore + ?Sized,
{
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys()
    }
}

impl<S> Injector for HeaderCarrier<&mut S>
where
    S: HeaderStore + ?Sized,
{
    fn set(&mut self, key: &str, value: String) {
        self.0.set(key, value);
    }
}

/// Read an upstream trace context out of `headers`.
pub fn extract_trace_context<S>(propagator: &dyn TextMapPropagator, headers: &S) -> Context
where
    S: HeaderStore + ?Sized,
{
    propagator.extract(&HeaderCarrier(headers))
}

/// Write the trace context of `cx` into outbound `headers`.
pub fn inject_trace_headers<S>(cx: &Context, propagator: &dyn TextMapPropagator, headers: &mut S)
where
    S: HeaderStore + ?Sized,
{
    propagator.inject_context(cx, &mut HeaderCarrier(headers));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Headers;
    use std::collections::HashMap;
    use opentelemetry::trace::{
        SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
    };
    use opentelemetry_sdk::propagation::TraceContextPropagator;

    #[test]
    fn test_extractor_reads_live_headers() {
        let mut headers = Headers::new();
        headers.insert("traceparent", "00-abc-def-01");
        headers.insert("custom-header", "value");

        let carrier = HeaderCarrier(&headers);
        assert_eq!(carrier.get("traceparent"), Some("00-abc-def-01"));
        assert_eq!(carrier.get("missing"), None);

        let keys = carrier.keys();
        assert!(keys.contains(&"traceparent"));
        assert!(keys.contains(&"custom-header"));
    }

    #[test]
    fn test_injector_overwrites() {
        let mut headers = Headers::new();
        headers.append("traceparent", "stale-1");
        headers.append("traceparent", "stale-2");

        HeaderCarrier(&mut headers).set("traceparent", "00-abc-def-01".to_string());
        assert_eq!(headers.values("traceparent"), ["00-abc-def-01"]);
    }

    #[test]
    fn test_inject_then_extract() {
        let propagator = TraceContextPropagator::new();
        let span_context = SpanContext::new(
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let cx = Context::new().with_remote_span_context(span_context.clone());

        let mut headers = Headers::new();
        inject_trace_headers(&cx, &propagator, &mut headers);
        assert_eq!(
            headers.get("traceparent"),
            Some("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
        );

        let extracted = extract_trace_context(&propagator, &headers);
        let remote = extracted.span().span_context().clone();
        assert_eq!(remote.trace_id(), span_context.trace_id());
        assert_eq!(remote.span_id(), span_context.span_id());
        assert!(remote.is_remote());
    }

    #[test]
    fn test_plain_map_round_trip() {
        let propagator = TraceContextPropagator::new();
        let span_context = SpanContext::new(
            TraceId::from_hex("0af7651916cd43dd8448eb211c80319c").unwrap(),
            SpanId::from_hex("b7ad6b7169203331").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let cx = Context::new().with_remote_span_context(span_context.clone());

        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        map.insert("traceparent".into(), vec!["stale".into(), "staler".into()]);
        inject_trace_headers(&cx, &propagator, &mut map);
        assert_eq!(
            map["traceparent"],
            ["00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"]
        );

        let extracted = extract_trace_context(&propagator, &map);
        let remote = extracted.span().span_context().clone();
        assert_eq!(remote.trace_id(), span_context.trace_id());
        assert_eq!(remote.span_id(), span_context.span_id());
    }

    #[test]
    fn test_extract_without_context() {
        let propagator = TraceContextPropagator::new();
        let cx = extract_trace_context(&propagator, &Headers::new());
        assert!(!cx.span().span_context().is_valid());
    }
}
