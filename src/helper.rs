// SPDX-License-Identifier: MIT
//! Central chokepoint for process telemetry.
//!
//! Every request handler reports its lifecycle through [`TelemetryHelper`], which
//! turns a `(process name, stage, context, error)` tuple into a [`TraceRecord`]
//! (plus an [`ExceptionRecord`] when an error is attached) and hands it to the
//! configured [`TelemetrySink`].
//!
//! # Failure model
//! * No [`Environment`] supplied at construction: a wiring defect, every call
//!   returns [`TelemetryError::NotInitialized`] and nothing is emitted.
//! * No sink, or the sink reports itself unavailable: logged locally, the call
//!   returns `Ok(())`.
//! * Context serialization failure: logged locally, the trace goes out without
//!   the `Context` property.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use product_api::config::Environment;
//! use product_api::helper::TelemetryHelper;
//! use product_api::sink::RecordingSink;
//! use product_api::stage::Stage;
//!
//! let sink = Arc::new(RecordingSink::new());
//! let helper = TelemetryHelper::builder()
//!     .environment(Environment::new(["prod"]))
//!     .sink(sink.clone())
//!     .build();
//! helper.log_stage("getAllProducts", Stage::Start).unwrap();
//! assert_eq!(sink.traces()[0].message, "START: getAllProducts");
//! ```
use std::collections::BTreeMap;
use std::panic::Location;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::Environment;
use crate::sink::{ExceptionRecord, TelemetrySink, TraceRecord};
use crate::stage::{Severity, Stage};

pub const CONTEXT_PROPERTY: &str = "Context";
pub const EXCEPTION_MESSAGE_PROPERTY: &str = "ExceptionMessage";
pub const FILE_NAME_PROPERTY: &str = "FileName";
pub const LINE_NUMBER_PROPERTY: &str = "LineNumber";

/// `tracing` target of the `dev`-profile mirror.
pub const MIRROR_TARGET: &str = "telemetry";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("telemetry helper is not initialized; an environment must be configured before logging")]
    NotInitialized,
}

/// An error that can be reported to the sink, optionally with the source
/// location that raised it.
pub trait ReportableError: std::error::Error {
    fn location(&self) -> Option<&'static Location<'static>> {
        None
    }
}

/// Immutable, cheaply clonable telemetry handle shared by all requests.
#[derive(Clone, Default)]
pub struct TelemetryHelper {
    environment: Option<Arc<Environment>>,
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl std::fmt::Debug for TelemetryHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryHelper")
            .field("environment", &self.environment)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

#[derive(Default)]
pub struct TelemetryHelperBuilder {
    environment: Option<Environment>,
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl TelemetryHelperBuilder {
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Like [`Self::sink`], for callers holding an optional sink.
    pub fn maybe_sink(mut self, sink: Option<Arc<dyn TelemetrySink>>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> TelemetryHelper {
        TelemetryHelper {
            environment: self.environment.map(Arc::new),
            sink: self.sink,
        }
    }
}

impl TelemetryHelper {
    pub fn builder() -> TelemetryHelperBuilder {
        TelemetryHelperBuilder::default()
    }

    /// Report one stage of a process.
    ///
    /// Never fails because of the sink; the only error is a missing
    /// environment, which means the helper was wired incorrectly.
    pub fn log_process<C>(
        &self,
        process_name: &str,
        stage: Stage,
        context: Option<&C>,
        error: Option<&dyn ReportableError>,
    ) -> Result<(), TelemetryError>
    where
        C: Serialize + ?Sized,
    {
        let environment = self
            .environment
            .as_deref()
            .ok_or(TelemetryError::NotInitialized)?;

        let sink = match self.sink.as_deref() {
            Some(sink) if sink.is_available() => sink,
            Some(_) => {
                tracing::error!(process = process_name, %stage, "telemetry sink unavailable; event dropped");
                return Ok(());
            }
            None => {
                tracing::error!(process = process_name, %stage, "telemetry sink is not configured; event dropped");
                return Ok(());
            }
        };

        let message = format!("{stage}: {process_name}");
        let severity = stage.severity();
        let mut properties = BTreeMap::new();

        if let Some(context) = context {
            match serde_json::to_string(context) {
                Ok(serialized) => {
                    properties.insert(CONTEXT_PROPERTY.to_string(), serialized);
                }
                Err(e) => {
                    tracing::error!(process = process_name, error = %e, "failed to serialize telemetry context");
                }
            }
        }

        if let Some(error) = error {
            let exception = exception_record(process_name, error);
            properties.insert(EXCEPTION_MESSAGE_PROPERTY.to_string(), exception.message.clone());
            if let (Some(file), Some(line)) = (&exception.file, exception.line) {
                properties.insert(FILE_NAME_PROPERTY.to_string(), file.clone());
                properties.insert(LINE_NUMBER_PROPERTY.to_string(), line.to_string());
            }
            sink.send_exception(exception);
        }

        sink.send_trace(TraceRecord {
            message: message.clone(),
            severity,
            properties,
        });

        if environment.is_diagnostic() {
            mirror_locally(&message, severity, error);
        }
        Ok(())
    }

    /// [`Self::log_process`] without context or error.
    pub fn log_stage(&self, process_name: &str, stage: Stage) -> Result<(), TelemetryError> {
        self.log_process::<()>(process_name, stage, None, None)
    }

    /// Open a process and emit its START event.
    pub fn begin(&self, process_name: &'static str) -> Result<Process<'_>, TelemetryError> {
        self.log_stage(process_name, Stage::Start)?;
        Ok(Process { helper: self, name: process_name })
    }

    /// Like [`Self::begin`], attaching `context` to the START event.
    pub fn begin_with<C>(&self, process_name: &'static str, context: &C) -> Result<Process<'_>, TelemetryError>
    where
        C: Serialize + ?Sized,
    {
        self.log_process(process_name, Stage::Start, Some(context), None)?;
        Ok(Process { helper: self, name: process_name })
    }
}

fn exception_record(process_name: &str, error: &dyn ReportableError) -> ExceptionRecord {
    let location = error.location();
    ExceptionRecord {
        process_name: process_name.to_string(),
        message: error.to_string(),
        file: location.map(|l| l.file().to_string()),
        line: location.map(Location::line),
    }
}

fn mirror_locally(message: &str, severity: Severity, error: Option<&dyn ReportableError>) {
    match severity {
        Severity::Information => tracing::info!(target: MIRROR_TARGET, "{message}"),
        Severity::Warning => tracing::warn!(target: MIRROR_TARGET, "{message}"),
        Severity::Error => match error {
            Some(error) => tracing::error!(target: MIRROR_TARGET, error = %error, "{message}"),
            None => tracing::error!(target: MIRROR_TARGET, "{message}"),
        },
    }
}

/// An open process: START has been emitted and exactly one of
/// [`Process::succeed`], [`Process::succeed_with`] or [`Process::fail`] closes it.
#[must_use = "a process must be closed with succeed() or fail()"]
#[derive(Debug)]
pub struct Process<'a> {
    helper: &'a TelemetryHelper,
    name: &'static str,
}

impl Process<'_> {
    /// Validation checkpoint; emits WARNING without closing the process.
    pub fn checkpoint(&self) -> Result<(), TelemetryError> {
        self.helper.log_stage(self.name, Stage::Warning)
    }

    pub fn succeed(self) -> Result<(), TelemetryError> {
        self.helper.log_stage(self.name, Stage::Success)
    }

    pub fn succeed_with<C>(self, context: &C) -> Result<(), TelemetryError>
    where
        C: Serialize + ?Sized,
    {
        self.helper.log_process(self.name, Stage::Success, Some(context), None)
    }

    pub fn fail(self, error: &dyn ReportableError) -> Result<(), TelemetryError> {
        self.helper
            .log_process::<()>(self.name, Stage::Exception, None, Some(error))
    }
}
