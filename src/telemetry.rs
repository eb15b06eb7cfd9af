// SPDX-License-Identifier: MIT
//! Telemetry bootstrap: `tracing` subscriber plus the OTLP pipeline behind the sink.
//!
//! * [`TelemetryConfig`] – endpoint (the sink connection string) & resource metadata.
//! * [`init_telemetry`] – builds providers, installs the subscriber.
//! * [`TelemetryHandle`] – hands out the [`TelemetrySink`] and flushes on shutdown.
//!
//! Feature flags (Cargo features) influence behavior:
//!
//! * `console-log` – add a compact console formatting layer (default; carries the
//!   `dev` profile mirror of process events).
//! * `otlp-log` – enable OTLP log exporter + tracing bridge (converts tracing events to logs).
//!
//! When `OTEL_SDK_DISABLED=true` no exporter is built; the handle then yields no
//! sink and [`crate::helper::TelemetryHelper`] degrades to local logging only.
//!
//! # Shutdown
//! Call [`TelemetryHandle::shutdown`] before exiting the Tokio runtime to flush any remaining batches.
use std::sync::Arc;

use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
#[cfg(feature = "otlp-log")]
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
#[cfg(feature = "otlp-log")]
use opentelemetry_otlp::LogExporter;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
#[cfg(feature = "otlp-log")]
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;
#[cfg(feature = "console-log")]
use tracing_subscriber::fmt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

use crate::sink::{OtelSink, TelemetrySink};

/// Instrumentation scope name for tracers created here.
pub const INSTRUMENTATION_SCOPE: &str = "product-api";

/// Configuration used when initializing telemetry.
///
/// Values are sourced from environment variables if available:
/// * `OTEL_EXPORTER_OTLP_ENDPOINT` – base endpoint (e.g. `http://localhost:4318`).
/// * `OTEL_SDK_DISABLED` – `true` disables export entirely.
/// * `OTEL_SERVICE_NAME` – service name resource attribute.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Base OTLP endpoint (without per-signal suffix); `None` disables export.
    pub endpoint: Option<String>,
    /// Service name reported in resource attributes (`service.name`).
    pub service_name: String,
    /// Service version reported in resource attributes (`service.version`).
    pub service_version: String,
    /// Reported as `deployment.environment`; [`crate::config::AppConfig::from_env`]
    /// fills it from the active profiles.
    pub deployment_environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let disabled = std::env::var("OTEL_SDK_DISABLED")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let endpoint = (!disabled).then(|| {
            std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4318".to_string())
        });
        Self {
            endpoint,
            service_name: std::env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "product-api".to_string()),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            deployment_environment: crate::config::DEFAULT_PROFILE.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// A configuration that exports nothing; useful for tests and local runs.
    pub fn disabled() -> Self {
        Self {
            endpoint: None,
            ..Self::default()
        }
    }
}

/// Handle owning the telemetry providers for the lifetime of the process.
///
/// Dropping the handle without calling [`TelemetryHandle::shutdown`] may result in
/// losing final batches. Always call `shutdown()` just before process exit.
pub struct TelemetryHandle {
    tracer_provider: Option<SdkTracerProvider>,
    #[cfg(feature = "otlp-log")]
    logger_provider: Option<SdkLoggerProvider>,
}

impl TelemetryHandle {
    /// Sink backed by the OTLP trace pipeline, if export is enabled.
    pub fn sink(&self) -> Option<Arc<dyn TelemetrySink>> {
        self.tracer_provider.as_ref().map(|provider| {
            Arc::new(OtelSink::new(provider.tracer(INSTRUMENTATION_SCOPE))) as Arc<dyn TelemetrySink>
        })
    }

    /// Flush and shutdown all configured telemetry providers.
    ///
    /// Returns `Ok(())` if every provider shutdown cleanly. If one or more providers
    /// report an error, a combined `anyhow::Error` including messages for each failing
    /// component is returned.
    pub fn shutdown(self) -> Result<()> {
        let mut errs = Vec::new();
        if let Some(provider) = self.tracer_provider {
            if let Err(e) = provider.shutdown() {
                errs.push(format!("tracer: {e}"));
            }
        }
        #[cfg(feature = "otlp-log")]
        if let Some(provider) = self.logger_provider {
            if let Err(e) = provider.shutdown() {
                errs.push(format!("logger: {e}"));
            }
        }
        if errs.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(errs.join(", "))
        }
    }
}

/// Initialize tracing (and optionally logging) telemetry for the application.
///
/// Installs a global tracer provider when an endpoint is configured and sets the
/// global `tracing` subscriber: env filter, optional console formatting, optional
/// OTLP log bridge and the OpenTelemetry span layer.
///
/// # Errors
/// Returns an error if any exporter builder fails (e.g. invalid endpoint URL) or a
/// global subscriber is already installed.
pub fn init_telemetry(cfg: TelemetryConfig) -> Result<TelemetryHandle> {
    let resource = Resource::builder()
        .with_service_name(cfg.service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", cfg.service_version.clone()),
            KeyValue::new("deployment.environment", cfg.deployment_environment.clone()),
        ])
        .build();

    let base = cfg.endpoint.as_deref().map(|e| e.trim_end_matches('/'));

    let tracer_provider = match base {
        Some(base) => {
            let span_exporter = SpanExporter::builder()
                .with_http()
                .with_protocol(Protocol::HttpBinary)
                .with_endpoint(format!("{}/v1/traces", base))
                .build()?;
            let provider = SdkTracerProvider::builder()
                .with_batch_exporter(span_exporter)
                .with_resource(resource.clone())
                .build();
            global::set_tracer_provider(provider.clone());
            Some(provider)
        }
        None => None,
    };

    #[cfg(feature = "otlp-log")]
    let logger_provider = match base {
        Some(base) => {
            let log_exporter = LogExporter::builder()
                .with_http()
                .with_protocol(Protocol::HttpBinary)
                .with_endpoint(format!("{}/v1/logs", base))
                .build()?;
            Some(
                SdkLoggerProvider::builder()
                    .with_batch_exporter(log_exporter)
                    .with_resource(resource.clone())
                    .build(),
            )
        }
        None => None,
    };

    #[cfg(feature = "otlp-log")]
    let bridge_layer = logger_provider.as_ref().map(OpenTelemetryTracingBridge::new);

    let otel_trace_layer = tracer_provider
        .as_ref()
        .map(|provider| OpenTelemetryLayer::new(provider.tracer(INSTRUMENTATION_SCOPE)));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    #[cfg(feature = "console-log")]
    let fmt_layer_plain = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact();

    #[cfg(all(feature = "console-log", feature = "otlp-log"))]
    Registry::default()
        .with(filter)
        .with(fmt_layer_plain)
        .with(bridge_layer)
        .with(otel_trace_layer)
        .try_init()?;

    #[cfg(all(feature = "console-log", not(feature = "otlp-log")))]
    Registry::default()
        .with(filter)
        .with(fmt_layer_plain)
        .with(otel_trace_layer)
        .try_init()?;

    #[cfg(all(not(feature = "console-log"), feature = "otlp-log"))]
    Registry::default()
        .with(filter)
        .with(bridge_layer)
        .with(otel_trace_layer)
        .try_init()?;

    #[cfg(all(not(feature = "console-log"), not(feature = "otlp-log")))]
    Registry::default()
        .with(filter)
        .with(otel_trace_layer)
        .try_init()?;

    #[cfg(feature = "otlp-log")]
    return Ok(TelemetryHandle {
        tracer_provider,
        logger_provider,
    });

    #[cfg(not(feature = "otlp-log"))]
    return Ok(TelemetryHandle { tracer_provider });
}
