// SPDX-License-Identifier: MIT
use std::sync::Arc;

use anyhow::{Context, Result};
use product_api::api::{router, AppState};
use product_api::config::AppConfig;
use product_api::helper::TelemetryHelper;
use product_api::product::InMemoryProductStore;
use product_api::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tracing::{info, warn};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    let telemetry = init_telemetry(config.telemetry.clone())?;

    let sink = telemetry.sink();
    if sink.is_none() {
        warn!("telemetry export disabled; process events are logged locally only");
    }
    let helper = TelemetryHelper::builder()
        .environment(config.environment.clone())
        .maybe_sink(sink)
        .build();

    let app = router(AppState::new(Arc::new(InMemoryProductStore::new()), helper));
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(
        address = %config.bind_addr,
        profiles = ?config.environment.profiles(),
        "application started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    telemetry.shutdown()?;
    Ok(())
}
