//! Product catalog: records with mutable stock counters.

mod memory;
mod service;

pub use memory::InMemoryCatalog;
pub use service::CatalogService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::order::Money;

/// Product identifier (SKU or catalog id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh catalog id.
    pub fn generate() -> Self {
        Self(format!("prod-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub price: Money,
    /// Units available. Only changed through [`CatalogStore`] adjustments.
    pub stock: u32,
    pub category: String,
    pub active: bool,
}

impl Product {
    pub fn new(
        id: impl Into<ProductId>,
        title: impl Into<String>,
        price: Money,
        stock: u32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            price,
            stock,
            category: String::new(),
            active: true,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// The units were taken; `remaining` is the new stock level.
    Applied { remaining: u32 },
    /// Nothing was taken because fewer than the requested units exist.
    Insufficient { available: u32 },
    /// No such product.
    NotFound,
}

/// Storage port for the product catalog.
///
/// Stock is never read-compared-written by callers: `try_decrement` must
/// check and take units as one atomic step.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Adds a new product. Fails with `DuplicateProduct` if the id is taken.
    async fn insert(&self, product: Product) -> Result<(), StoreError>;

    async fn get(&self, id: &ProductId) -> Result<Option<Product>, StoreError>;

    /// Lists products ordered by id.
    async fn list(&self, include_inactive: bool) -> Result<Vec<Product>, StoreError>;

    /// Takes `quantity` units if and only if at least that many are in stock.
    async fn try_decrement(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, StoreError>;

    /// Returns `quantity` units to stock and yields the new level.
    async fn increment(&self, id: &ProductId, quantity: u32) -> Result<u32, StoreError>;
}
