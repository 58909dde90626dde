//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use domain::{CatalogStore, Money, OrderError, OrderStore, Product, ProductId};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{Caller, MaybeCaller};
use crate::response::Reply;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: String,
    pub title: String,
    pub price_cents: i64,
    pub stock: u32,
    pub category: String,
    pub active: bool,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            title: product.title,
            price_cents: product.price.cents(),
            stock: product.stock,
            category: product.category,
            active: product.active,
        }
    }
}

fn count(value: i64, what: &str) -> Result<u32, ApiError> {
    u32::try_from(value)
        .map_err(|_| OrderError::Validation(format!("{what} must be between 0 and {}", u32::MAX)).into())
}

/// GET /products
#[tracing::instrument(skip_all)]
pub async fn list<C, O>(
    State(state): State<Arc<AppState<C, O>>>,
    MaybeCaller(caller): MaybeCaller,
) -> Result<Reply<Vec<ProductResponse>>, ApiError>
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    let products = state
        .orders
        .catalog()
        .list_products(caller.as_ref())
        .await?;
    Ok(Reply::ok(
        "Products retrieved successfully",
        products.into_iter().map(ProductResponse::from).collect(),
    ))
}

/// GET /products/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn get<C, O>(
    State(state): State<Arc<AppState<C, O>>>,
    MaybeCaller(caller): MaybeCaller,
    Path(id): Path<String>,
) -> Result<Reply<ProductResponse>, ApiError>
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    let product = state
        .orders
        .catalog()
        .get_product(&ProductId::new(id), caller.as_ref())
        .await?;
    Ok(Reply::ok(
        "Product retrieved successfully",
        ProductResponse::from(product),
    ))
}

/// POST /products
#[tracing::instrument(skip_all)]
pub async fn create<C, O>(
    State(state): State<Arc<AppState<C, O>>>,
    Caller(caller): Caller,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<Reply<ProductResponse>, ApiError>
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    let Json(req) = payload?;
    let stock = count(req.stock, "stock")?;

    let product = state
        .orders
        .catalog()
        .create_product(
            &caller,
            req.id.filter(|id| !id.trim().is_empty()).map(ProductId::new),
            req.title,
            Money::from_cents(req.price_cents),
            stock,
            req.category,
        )
        .await?;
    Ok(Reply::created(
        "Product created successfully",
        ProductResponse::from(product),
    ))
}

/// PUT /products/{id}/stock
#[tracing::instrument(skip(state, caller, payload))]
pub async fn restock<C, O>(
    State(state): State<Arc<AppState<C, O>>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    payload: Result<Json<RestockRequest>, JsonRejection>,
) -> Result<Reply<ProductResponse>, ApiError>
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    let Json(req) = payload?;
    let quantity = count(req.quantity, "quantity")?;

    let product = state
        .orders
        .catalog()
        .restock(&caller, &ProductId::new(id), quantity)
        .await?;
    Ok(Reply::ok(
        "Stock updated successfully",
        ProductResponse::from(product),
    ))
}
