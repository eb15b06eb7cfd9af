// SPDX-License-Identifier: MIT
//! Telemetry sinks: the backends that receive trace and exception records.
//!
//! * [`TelemetrySink`] – the interface [`crate::helper::TelemetryHelper`] writes to.
//! * [`OtelSink`] – forwards records to an OpenTelemetry tracer (exported over OTLP).
//! * [`RecordingSink`] – keeps records in memory, for tests and local inspection.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use opentelemetry::trace::{Span, SpanKind, Status, Tracer};
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::SdkTracer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::stage::Severity;

/// A structured trace event: `"<STAGE>: <process>"` plus string properties.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceRecord {
    pub message: String,
    pub severity: Severity,
    pub properties: BTreeMap<String, String>,
}

/// A separately tracked exception, reported alongside the EXCEPTION trace.
#[derive(Clone, Debug, PartialEq)]
pub struct ExceptionRecord {
    pub process_name: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

/// Backend accepting process telemetry.
///
/// Implementations must not block the caller on export; both send methods are
/// fire-and-forget.
pub trait TelemetrySink: Send + Sync {
    /// Whether the backend can currently accept records. When `false` the
    /// helper logs locally and skips emission.
    fn is_available(&self) -> bool {
        true
    }

    fn send_trace(&self, trace: TraceRecord);

    fn send_exception(&self, exception: ExceptionRecord);
}

/// Sink that turns every record into a short-lived span on an SDK tracer.
///
/// Traces become an `Internal` span named after the message with a `trace`
/// event; exceptions set an error status and carry an `exception` event using
/// the OpenTelemetry semantic-convention attribute names. Both are children of
/// the current `tracing` span (the HTTP request span under `TraceLayer`).
pub struct OtelSink {
    tracer: SdkTracer,
}

impl OtelSink {
    pub fn new(tracer: SdkTracer) -> Self {
        Self { tracer }
    }
}

impl TelemetrySink for OtelSink {
    fn send_trace(&self, trace: TraceRecord) {
        let mut attributes = vec![KeyValue::new("severity", trace.severity.as_str())];
        attributes.extend(
            trace
                .properties
                .into_iter()
                .map(|(key, value)| KeyValue::new(key, value)),
        );

        let mut span = self
            .tracer
            .span_builder(trace.message.clone())
            .with_kind(SpanKind::Internal)
            .with_attributes(attributes.clone())
            .start_with_context(&self.tracer, &tracing::Span::current().context());
        span.add_event(trace.message, attributes);
        span.end();
    }

    fn send_exception(&self, exception: ExceptionRecord) {
        let mut attributes = vec![
            KeyValue::new("process.name", exception.process_name.clone()),
            KeyValue::new("exception.message", exception.message.clone()),
        ];
        if let Some(file) = exception.file {
            attributes.push(KeyValue::new("code.filepath", file));
        }
        if let Some(line) = exception.line {
            attributes.push(KeyValue::new("code.lineno", i64::from(line)));
        }

        let mut span = self
            .tracer
            .span_builder(format!("exception: {}", exception.process_name))
            .with_kind(SpanKind::Internal)
            .start_with_context(&self.tracer, &tracing::Span::current().context());
        span.add_event("exception", attributes);
        span.set_status(Status::error(exception.message));
        span.end();
    }
}

/// One record captured by [`RecordingSink`], in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum SinkEvent {
    Trace(TraceRecord),
    Exception(ExceptionRecord),
}

/// In-memory sink.
#[derive(Debug)]
pub struct RecordingSink {
    available: AtomicBool,
    events: Mutex<Vec<SinkEvent>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            events: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that reports itself as non-functional.
    pub fn unavailable() -> Self {
        let sink = Self::default();
        sink.set_available(false);
        sink
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Snapshot of everything received so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.lock().clone()
    }

    pub fn traces(&self) -> Vec<TraceRecord> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Trace(trace) => Some(trace.clone()),
                SinkEvent::Exception(_) => None,
            })
            .collect()
    }

    pub fn exceptions(&self) -> Vec<ExceptionRecord> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Exception(exception) => Some(exception.clone()),
                SinkEvent::Trace(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // Records stay readable after a poisoning panic.
    fn lock(&self) -> MutexGuard<'_, Vec<SinkEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TelemetrySink for RecordingSink {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn send_trace(&self, trace: TraceRecord) {
        self.lock().push(SinkEvent::Trace(trace));
    }

    fn send_exception(&self, exception: ExceptionRecord) {
        self.lock().push(SinkEvent::Exception(exception));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(message: &str) -> TraceRecord {
        TraceRecord {
            message: message.to_string(),
            severity: Severity::Information,
            properties: BTreeMap::new(),
        }
    }

    #[test]
    fn recording_sink_keeps_arrival_order() {
        let sink = RecordingSink::new();
        sink.send_trace(trace("START: a"));
        sink.send_exception(ExceptionRecord {
            process_name: "a".into(),
            message: "boom".into(),
            file: None,
            line: None,
        });
        sink.send_trace(trace("EXCEPTION: a"));

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], SinkEvent::Exception(_)));
        assert_eq!(sink.traces().len(), 2);
        assert_eq!(sink.exceptions()[0].message, "boom");

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn availability_toggles() {
        let sink = RecordingSink::unavailable();
        assert!(!sink.is_available());
        sink.set_available(true);
        assert!(sink.is_available());
    }

    #[test]
    fn otel_sink_accepts_records_without_exporter() {
        use opentelemetry::trace::TracerProvider as _;
        use opentelemetry_sdk::trace::SdkTracerProvider;

        let provider = SdkTracerProvider::builder().build();
        let sink = OtelSink::new(provider.tracer("product-api-test"));
        let mut record = trace("SUCCESS: getAllProducts");
        record.properties.insert("Context".into(), "[]".into());
        sink.send_trace(record);
        sink.send_exception(ExceptionRecord {
            process_name: "getProductById".into(),
            message: "product 999 not found".into(),
            file: Some("src/product.rs".into()),
            line: Some(42),
        });
        let _ = provider.shutdown();
    }

    #[test]
    fn otel_sink_spans_join_the_current_tracing_span() {
        use opentelemetry::trace::TracerProvider as _;
        use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
        use tracing_subscriber::layer::SubscriberExt;

        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let subscriber = tracing_subscriber::registry().with(
            tracing_opentelemetry::layer().with_tracer(provider.tracer("product-api-test")),
        );
        let sink = OtelSink::new(provider.tracer("product-api-test"));

        tracing::subscriber::with_default(subscriber, || {
            let request = tracing::info_span!("request");
            let _entered = request.enter();
            sink.send_trace(trace("START: getAllProducts"));
            sink.send_exception(ExceptionRecord {
                process_name: "getAllProducts".into(),
                message: "boom".into(),
                file: None,
                line: None,
            });
        });

        let spans = exporter.get_finished_spans().expect("finished spans");
        let request = spans.iter().find(|s| s.name == "request").expect("request span");
        for name in ["START: getAllProducts", "exception: getAllProducts"] {
            let child = spans.iter().find(|s| s.name == name).expect(name);
            assert_eq!(child.span_context.trace_id(), request.span_context.trace_id());
            assert_eq!(child.parent_span_id, request.span_context.span_id());
        }
    }
}
