// SPDX-License-Identifier: MIT
//! Product CRUD API with uniform process telemetry.
//!
//! Every request handler reports its lifecycle (START, WARNING, SUCCESS or
//! EXCEPTION) through one chokepoint, [`helper::TelemetryHelper`], which forwards
//! structured trace and exception records to a [`sink::TelemetrySink`]:
//!
//! * [`stage`] – lifecycle stages and their severities.
//! * [`helper`] – the telemetry helper and the [`helper::Process`] guard.
//! * [`sink`] – sink interface, OpenTelemetry-backed and in-memory sinks.
//! * [`product`] – product records and the store collaborator.
//! * [`api`] – axum handlers under `/api/products`.
//! * [`config`] / [`telemetry`] – environment configuration and OTLP bootstrap.
//!
//! # Feature Flags
//! * `console-log` (default) – compact console formatter (file/line/thread id).
//! * `otlp-log` – enable an OTLP log exporter and bridge tracing events into logs.
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use product_api::api::{router, AppState};
//! use product_api::config::AppConfig;
//! use product_api::helper::TelemetryHelper;
//! use product_api::product::InMemoryProductStore;
//! use product_api::telemetry::init_telemetry;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let handle = init_telemetry(config.telemetry.clone())?;
//!     let helper = TelemetryHelper::builder()
//!         .environment(config.environment.clone())
//!         .maybe_sink(handle.sink())
//!         .build();
//!     let app = router(AppState::new(Arc::new(InMemoryProductStore::new()), helper));
//!     let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
//!     axum::serve(listener, app).await?;
//!     handle.shutdown()?;
//!     Ok(())
//! }
//! ```
pub mod api;
pub mod config;
pub mod helper;
pub mod product;
pub mod sink;
pub mod stage;
pub mod telemetry;

#[cfg(test)]
mod tests {
    use super::telemetry::{init_telemetry, TelemetryConfig};

    #[tokio::test]
    async fn telemetry_init_works() {
        let handle = init_telemetry(TelemetryConfig::disabled()).expect("telemetry init");
        assert!(handle.sink().is_none());
        handle.shutdown().expect("shutdown");
    }
}
