// SPDX-License-Identifier: MIT
//! Product records and the store collaborator the handlers delegate to.
use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::helper::ReportableError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub u64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProductId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreErrorKind {
    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Store failure, tagged with the source location that raised it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct StoreError {
    kind: StoreErrorKind,
    location: &'static Location<'static>,
}

impl StoreError {
    #[track_caller]
    pub fn not_found(id: ProductId) -> Self {
        Self {
            kind: StoreErrorKind::NotFound(id),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn backend(msg: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Backend(msg.into()),
            location: Location::caller(),
        }
    }

    pub fn kind(&self) -> &StoreErrorKind {
        &self.kind
    }
}

impl ReportableError for StoreError {
    fn location(&self) -> Option<&'static Location<'static>> {
        Some(self.location)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence collaborator for products.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_all(&self) -> StoreResult<Vec<Product>>;

    async fn find_by_id(&self, id: ProductId) -> StoreResult<Product>;

    /// Insert when `product.id` is `None` (an id is assigned), otherwise upsert.
    async fn save(&self, product: Product) -> StoreResult<Product>;

    async fn delete_by_id(&self, id: ProductId) -> StoreResult<()>;
}

/// Map-backed store; ids are assigned from a monotonically increasing counter.
#[derive(Debug)]
pub struct InMemoryProductStore {
    products: RwLock<BTreeMap<ProductId, Product>>,
    next_id: AtomicU64,
}

impl Default for InMemoryProductStore {
    fn default() -> Self {
        Self {
            products: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn find_all(&self) -> StoreResult<Vec<Product>> {
        Ok(self.products.read().await.values().cloned().collect())
    }

    async fn find_by_id(&self, id: ProductId) -> StoreResult<Product> {
        self.products
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn save(&self, mut product: Product) -> StoreResult<Product> {
        let mut products = self.products.write().await;
        let id = match product.id {
            Some(id) => {
                // Saturates at u64::MAX; later auto-assignment then fails below.
                self.next_id.fetch_max(id.0.saturating_add(1), Ordering::SeqCst);
                id
            }
            None => self
                .next_id
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| next.checked_add(1))
                .map(ProductId)
                .map_err(|_| StoreError::backend("id space exhausted"))?,
        };
        product.id = Some(id);
        products.insert(id, product.clone());
        Ok(product)
    }

    async fn delete_by_id(&self, id: ProductId) -> StoreResult<()> {
        match self.products.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    fn widget(id: Option<u64>) -> Product {
        Product {
            id: id.map(ProductId),
            name: "widget".into(),
            description: None,
            price: 9.5,
        }
    }

    #[test]
    fn save_assigns_sequential_ids() {
        let store = InMemoryProductStore::new();
        let first = block_on(store.save(widget(None))).unwrap();
        let second = block_on(store.save(widget(None))).unwrap();
        assert_eq!(first.id, Some(ProductId(1)));
        assert_eq!(second.id, Some(ProductId(2)));
        assert_eq!(block_on(store.find_all()).unwrap().len(), 2);
    }

    #[test]
    fn explicit_id_upserts_and_advances_counter() {
        let store = InMemoryProductStore::new();
        block_on(store.save(widget(Some(10)))).unwrap();
        let mut renamed = widget(Some(10));
        renamed.name = "gadget".into();
        block_on(store.save(renamed)).unwrap();
        assert_eq!(block_on(store.find_by_id(ProductId(10))).unwrap().name, "gadget");

        let next = block_on(store.save(widget(None))).unwrap();
        assert_eq!(next.id, Some(ProductId(11)));
    }

    #[test]
    fn missing_product_is_not_found_with_location() {
        let store = InMemoryProductStore::new();
        let err = block_on(store.find_by_id(ProductId(999))).unwrap_err();
        assert!(matches!(err.kind(), StoreErrorKind::NotFound(_)));
        assert_eq!(err.to_string(), "product 999 not found");
        let location = err.location().unwrap();
        assert!(location.file().ends_with("product.rs"));

        let err = block_on(store.delete_by_id(ProductId(999))).unwrap_err();
        assert_eq!(err.kind(), &StoreErrorKind::NotFound(ProductId(999)));
    }

    #[test]
    fn max_explicit_id_is_stored_and_exhausts_auto_ids() {
        let store = InMemoryProductStore::new();
        let saved = block_on(store.save(widget(Some(u64::MAX)))).unwrap();
        assert_eq!(saved.id, Some(ProductId(u64::MAX)));

        let err = block_on(store.save(widget(None))).unwrap_err();
        assert_eq!(err.kind(), &StoreErrorKind::Backend("id space exhausted".into()));
        assert_eq!(block_on(store.find_all()).unwrap().len(), 1);
    }

    #[test]
    fn delete_removes_product() {
        let store = InMemoryProductStore::new();
        let saved = block_on(store.save(widget(None))).unwrap();
        block_on(store.delete_by_id(saved.id.unwrap())).unwrap();
        assert!(block_on(store.find_all()).unwrap().is_empty());
    }

    #[test]
    fn id_serializes_as_plain_number() {
        let json = serde_json::to_string(&widget(Some(1))).unwrap();
        assert_eq!(json, r#"{"id":1,"name":"widget","price":9.5}"#);
        let parsed: Product = serde_json::from_str(r#"{"name":"widget","price":9.5}"#).unwrap();
        assert_eq!(parsed.id, None);
    }
}
