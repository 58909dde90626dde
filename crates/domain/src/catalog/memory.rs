use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CatalogStore, Product, ProductId, StockDecrement};
use crate::error::StoreError;

/// In-memory catalog.
///
/// Every stock adjustment happens under the write lock, which makes the
/// check and the decrement a single step.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<BTreeMap<ProductId, Product>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog pre-populated with `products`.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let map = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            products: Arc::new(RwLock::new(map)),
        }
    }

    /// Current stock of a product, if it exists.
    pub async fn stock_of(&self, id: &ProductId) -> Option<u32> {
        self.products.read().await.get(id).map(|p| p.stock)
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn insert(&self, product: Product) -> Result<(), StoreError> {
        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(StoreError::DuplicateProduct(product.id));
        }
        products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.products.read().await.get(id).cloned())
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Product>, StoreError> {
        Ok(self
            .products
            .read()
            .await
            .values()
            .filter(|p| include_inactive || p.active)
            .cloned()
            .collect())
    }

    async fn try_decrement(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, StoreError> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(id) else {
            return Ok(StockDecrement::NotFound);
        };

        if product.stock < quantity {
            return Ok(StockDecrement::Insufficient {
                available: product.stock,
            });
        }

        product.stock -= quantity;
        Ok(StockDecrement::Applied {
            remaining: product.stock,
        })
    }

    async fn increment(&self, id: &ProductId, quantity: u32) -> Result<u32, StoreError> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(id)
            .ok_or_else(|| StoreError::MissingProduct(id.clone()))?;
        product.stock = product.stock.saturating_add(quantity);
        Ok(product.stock)
    }
}
