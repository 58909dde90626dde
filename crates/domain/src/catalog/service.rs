use common::Requester;

use super::{CatalogStore, Product, ProductId};
use crate::error::OrderError;
use crate::order::Money;

/// Administrative and read access to the catalog.
#[derive(Clone)]
pub struct CatalogService<C: CatalogStore> {
    catalog: C,
}

impl<C: CatalogStore> CatalogService<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Adds a product to the catalog. Administrators only.
    #[tracing::instrument(skip(self, requester), fields(actor = %requester.user_id))]
    pub async fn create_product(
        &self,
        requester: &Requester,
        id: Option<ProductId>,
        title: String,
        price: Money,
        stock: u32,
        category: String,
    ) -> Result<Product, OrderError> {
        if !requester.is_admin() {
            return Err(OrderError::AccessDenied("only administrators can add products"));
        }
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(OrderError::Validation("product title is required".into()));
        }
        if price.is_negative() {
            return Err(OrderError::Validation("product price cannot be negative".into()));
        }
        if price > Money::MAX_UNIT_PRICE {
            return Err(OrderError::Validation(format!(
                "product price cannot exceed {}",
                Money::MAX_UNIT_PRICE
            )));
        }

        let product = Product::new(id.unwrap_or_else(ProductId::generate), title, price, stock)
            .with_category(category.trim());
        self.catalog.insert(product.clone()).await?;
        tracing::info!(product_id = %product.id, stock, "product created");
        Ok(product)
    }

    /// Looks up a product. Inactive products are only visible to administrators.
    pub async fn get_product(
        &self,
        id: &ProductId,
        requester: Option<&Requester>,
    ) -> Result<Product, OrderError> {
        let is_admin = requester.is_some_and(Requester::is_admin);
        match self.catalog.get(id).await? {
            Some(product) if product.active || is_admin => Ok(product),
            _ => Err(OrderError::ProductNotFound {
                product_id: id.clone(),
            }),
        }
    }

    pub async fn list_products(
        &self,
        requester: Option<&Requester>,
    ) -> Result<Vec<Product>, OrderError> {
        let is_admin = requester.is_some_and(Requester::is_admin);
        Ok(self.catalog.list(is_admin).await?)
    }

    /// Adds units to a product's stock. Administrators only.
    #[tracing::instrument(skip(self, requester), fields(actor = %requester.user_id))]
    pub async fn restock(
        &self,
        requester: &Requester,
        id: &ProductId,
        quantity: u32,
    ) -> Result<Product, OrderError> {
        if !requester.is_admin() {
            return Err(OrderError::AccessDenied("only administrators can restock"));
        }
        if quantity == 0 {
            return Err(OrderError::Validation("restock quantity must be at least 1".into()));
        }

        if self.catalog.get(id).await?.is_none() {
            return Err(OrderError::ProductNotFound {
                product_id: id.clone(),
            });
        }
        let stock = self.catalog.increment(id, quantity).await?;
        tracing::info!(product_id = %id, quantity, stock, "product restocked");

        self.catalog
            .get(id)
            .await?
            .ok_or_else(|| OrderError::ProductNotFound {
                product_id: id.clone(),
            })
    }
}
