//! Domain layer for the storefront order service.
//!
//! This crate provides:
//! - the product catalog port with an atomic conditional stock decrement
//! - the order builder (validation, pricing, all-or-nothing stock reservation)
//! - the status transition manager (central transition table, stock
//!   restoration on cancellation, append-only history)
//! - the order query layer (filters, sorting, pagination, ownership checks)
//! - best-effort notification dispatch
//!
//! In-memory store adapters live next to their ports; the PostgreSQL ones
//! are in the `persistence` crate.

pub mod catalog;
pub mod error;
pub mod notification;
pub mod order;
pub mod service;

pub use catalog::{
    CatalogService, CatalogStore, InMemoryCatalog, Product, ProductId, StockDecrement,
};
pub use error::{OrderError, StoreError};
pub use notification::{
    LogNotifier, Notification, NotificationDispatcher, Notifier, NotifyError, RecordingNotifier,
};
pub use order::{
    InMemoryOrderStore, LineItem, LineRequest, Money, Order, OrderBuilder, OrderFilter,
    OrderNumber, OrderPolicy, OrderQueries, OrderSort, OrderStatus, OrderStore, OrderTotals,
    PaymentMethod, PlaceOrder, ShippingAddress, SortField, StatusChange, StatusTransitionManager,
    StatusUpdate,
};
pub use service::OrderService;
