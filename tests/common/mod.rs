//! Shared fixtures for the HTTP integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, Response};
use axum::Router;
use product_api::api::{router, AppState};
use product_api::config::Environment;
use product_api::helper::TelemetryHelper;
use product_api::product::{
    InMemoryProductStore, Product, ProductId, ProductStore, StoreError, StoreResult,
};
use product_api::sink::RecordingSink;
use product_api::stage::Stage;
use tower::ServiceExt;

/// Store whose every operation fails with a backend error.
pub struct FailingStore;

#[async_trait]
impl ProductStore for FailingStore {
    async fn find_all(&self) -> StoreResult<Vec<Product>> {
        Err(StoreError::backend("connection refused"))
    }

    async fn find_by_id(&self, _id: ProductId) -> StoreResult<Product> {
        Err(StoreError::backend("connection refused"))
    }

    async fn save(&self, _product: Product) -> StoreResult<Product> {
        Err(StoreError::backend("connection refused"))
    }

    async fn delete_by_id(&self, _id: ProductId) -> StoreResult<()> {
        Err(StoreError::backend("connection refused"))
    }
}

pub struct Harness {
    pub app: Router,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        let sink = Arc::new(RecordingSink::new());
        let helper = TelemetryHelper::builder()
            .environment(Environment::new(["test"]))
            .sink(sink.clone())
            .build();
        Self {
            app: router(AppState::new(store, helper)),
            sink,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryProductStore::new()))
    }

    pub fn failing() -> Self {
        Self::new(Arc::new(FailingStore))
    }

    pub async fn send(&self, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// `(stage tag, process name)` for every trace, in emission order.
    pub fn stages(&self) -> Vec<(String, String)> {
        self.sink
            .traces()
            .into_iter()
            .map(|t| {
                let (stage, process) = t.message.split_once(": ").unwrap();
                (stage.to_string(), process.to_string())
            })
            .collect()
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Asserts START, then WARNINGs, then exactly one terminal stage equal to `terminal`.
pub fn assert_lifecycle(stages: &[(String, String)], process: &str, terminal: Stage) {
    assert!(stages.iter().all(|(_, p)| p == process), "mixed processes: {stages:?}");
    assert_eq!(stages.first().map(|s| s.0.as_str()), Some(Stage::Start.as_str()));

    let terminals: Vec<_> = stages
        .iter()
        .filter(|(tag, _)| tag == Stage::Success.as_str() || tag == Stage::Exception.as_str())
        .collect();
    assert_eq!(terminals.len(), 1, "expected one terminal stage: {stages:?}");
    assert_eq!(stages.last().map(|s| s.0.as_str()), Some(terminal.as_str()));

    for (tag, _) in &stages[1..stages.len() - 1] {
        assert_eq!(tag, Stage::Warning.as_str());
    }
}
