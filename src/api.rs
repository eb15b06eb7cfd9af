// SPDX-License-Identifier: MIT
//! HTTP handlers for `/api/products`.
//!
//! Each handler follows the same lifecycle: START, a WARNING validation
//! checkpoint, the store call, then SUCCESS; a store failure is reported as
//! EXCEPTION and returned as a typed [`ApiError`].
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::helper::{TelemetryError, TelemetryHelper};
use crate::product::{Product, ProductId, ProductStore, StoreError, StoreErrorKind};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProductStore>,
    pub telemetry: Arc<TelemetryHelper>,
}

impl AppState {
    /// Wrap a store and a configured helper for use as router state.
    pub fn new(store: Arc<dyn ProductStore>, telemetry: TelemetryHelper) -> Self {
        Self {
            store,
            telemetry: Arc::new(telemetry),
        }
    }
}

/// Build the `/api/products` router with request tracing.
///
/// | Route | Handler |
/// |---|---|
/// | `GET /api/products` | [`get_all_products`] |
/// | `GET /api/products/{id}` | [`get_product_by_id`] |
/// | `POST /api/products` | [`create_product`] |
/// | `DELETE /api/products/{id}` | [`delete_product`] |
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use product_api::api::{router, AppState};
/// use product_api::config::Environment;
/// use product_api::helper::TelemetryHelper;
/// use product_api::product::InMemoryProductStore;
///
/// let helper = TelemetryHelper::builder()
///     .environment(Environment::new(["prod"]))
///     .build();
/// let app = router(AppState::new(Arc::new(InMemoryProductStore::new()), helper));
/// # let _ = app;
/// ```
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/products", get(get_all_products).post(create_product))
        .route("/api/products/{id}", get(get_product_by_id).delete(delete_product))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Handler failure, rendered as a JSON error body by [`IntoResponse`].
///
/// | Variant | Status | `error` code |
/// |---|---|---|
/// | `NotFound` | 404 | `not_found` |
/// | `Store` | 500 | `store_error` |
/// | `Telemetry` | 500 | `telemetry_not_initialized` |
#[derive(Debug, Error)]
pub enum ApiError {
    /// The store has no product with this id.
    #[error("product {0} not found")]
    NotFound(ProductId),

    /// Any other store failure.
    #[error(transparent)]
    Store(StoreError),

    /// The telemetry helper was built without an environment.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err.kind() {
            StoreErrorKind::NotFound(id) => ApiError::NotFound(*id),
            StoreErrorKind::Backend(_) => ApiError::Store(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", self.to_string()),
            ApiError::Store(_) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", self.to_string()),
            ApiError::Telemetry(e) => {
                tracing::error!(error = %e, "request aborted by telemetry setup defect");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "telemetry_not_initialized", self.to_string())
            }
        }
    }
}

/// `{"error": code, "message": message}` with the given status.
pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// `GET /api/products`: every product; the list is attached as SUCCESS context.
pub async fn get_all_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    let process = state.telemetry.begin("getAllProducts")?;
    process.checkpoint()?;

    match state.store.find_all().await {
        Ok(products) => {
            process.succeed_with(&products)?;
            Ok(Json(products))
        }
        Err(err) => {
            process.fail(&err)?;
            Err(err.into())
        }
    }
}

/// `GET /api/products/{id}`: one product, or 404.
pub async fn get_product_by_id(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Product>, ApiError> {
    let process = state.telemetry.begin("getProductById")?;
    process.checkpoint()?;

    match state.store.find_by_id(ProductId(id)).await {
        Ok(product) => {
            process.succeed()?;
            Ok(Json(product))
        }
        Err(err) => {
            process.fail(&err)?;
            Err(err.into())
        }
    }
}

/// `POST /api/products`: save the body (an id is assigned when absent) and
/// return it with 201. The request body is attached as START context.
pub async fn create_product(
    State(state): State<AppState>,
    Json(product): Json<Product>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let process = state.telemetry.begin_with("createProduct", &product)?;
    process.checkpoint()?;

    match state.store.save(product).await {
        Ok(created) => {
            process.succeed()?;
            Ok((StatusCode::CREATED, Json(created)))
        }
        Err(err) => {
            process.fail(&err)?;
            Err(err.into())
        }
    }
}

/// `DELETE /api/products/{id}`: 204 on removal, 404 when absent.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let process = state.telemetry.begin("deleteProduct")?;
    process.checkpoint()?;

    match state.store.delete_by_id(ProductId(id)).await {
        Ok(()) => {
            process.succeed()?;
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) => {
            process.fail(&err)?;
            Err(err.into())
        }
    }
}
