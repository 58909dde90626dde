//! Domain error types.

use common::OrderId;
use thiserror::Error;

use crate::catalog::ProductId;
use crate::order::OrderStatus;

/// Errors raised by the catalog and order store ports.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored order version did not match the expected one.
    #[error("Concurrent update of order {order_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        order_id: OrderId,
        expected: u64,
        actual: u64,
    },

    /// An order with this number already exists.
    #[error("Duplicate order number: {0}")]
    DuplicateOrderNumber(String),

    /// An order with this id already exists.
    #[error("Duplicate order id: {0}")]
    DuplicateOrder(OrderId),

    /// A product with this id already exists.
    #[error("Duplicate product id: {0}")]
    DuplicateProduct(ProductId),

    /// The order to update does not exist.
    #[error("Order not found: {0}")]
    MissingOrder(OrderId),

    /// The product to adjust does not exist.
    #[error("Product not found: {0}")]
    MissingProduct(ProductId),

    /// The storage backend failed.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A stored document could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Errors returned by order and catalog operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// A referenced product does not exist or is not active.
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    /// A line requests more units than are in stock.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The requester may not perform this operation.
    #[error("Access denied: {0}")]
    AccessDenied(&'static str),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl OrderError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation",
            OrderError::ProductNotFound { .. } => "product_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::AccessDenied(_) => "access_denied",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::Persistence(_) => "persistence",
        }
    }
}
