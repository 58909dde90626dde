//! HTTP API for the storefront order service.
//!
//! Exposes order placement, status management, order queries and the
//! product catalog over REST, with structured logging (tracing) and
//! Prometheus metrics. Every JSON response uses the
//! `{success, message, data?, timestamp}` envelope.

pub mod config;
pub mod error;
pub mod extract;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{
    CatalogStore, InMemoryCatalog, InMemoryOrderStore, NotificationDispatcher, OrderPolicy,
    OrderService, OrderStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use persistence::PostgresStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<C, O>
where
    C: CatalogStore + Clone,
    O: OrderStore + Clone,
{
    pub orders: OrderService<C, O>,
    /// Name of the storage backend, reported by `/health`.
    pub storage: &'static str,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<C, O>(state: Arc<AppState<C, O>>, metrics_handle: PrometheusHandle) -> Router
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    use routes::{health, orders, products};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(health::check::<C, O>))
        .route(
            "/orders",
            post(orders::create::<C, O>).get(orders::list::<C, O>),
        )
        .route("/orders/my", get(orders::list_mine::<C, O>))
        .route(
            "/orders/{id}",
            get(orders::get::<C, O>).put(orders::update::<C, O>),
        )
        .route("/orders/{id}/cancel", post(orders::cancel::<C, O>))
        .route(
            "/products",
            get(products::list::<C, O>).post(products::create::<C, O>),
        )
        .route("/products/{id}", get(products::get::<C, O>))
        .route("/products/{id}/stock", put(products::restock::<C, O>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// State backed by in-memory stores, seeded with `catalog`.
pub fn create_in_memory_state(
    catalog: InMemoryCatalog,
    policy: OrderPolicy,
    notifications: NotificationDispatcher,
) -> Arc<AppState<InMemoryCatalog, InMemoryOrderStore>> {
    Arc::new(AppState {
        orders: OrderService::new(catalog, InMemoryOrderStore::new(), policy, notifications),
        storage: "memory",
    })
}

/// State backed by PostgreSQL for both the catalog and the orders.
pub fn create_postgres_state(
    store: PostgresStore,
    policy: OrderPolicy,
    notifications: NotificationDispatcher,
) -> Arc<AppState<PostgresStore, PostgresStore>> {
    Arc::new(AppState {
        orders: OrderService::new(store.clone(), store, policy, notifications),
        storage: "postgres",
    })
}
