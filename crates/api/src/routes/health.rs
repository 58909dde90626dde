//! Liveness endpoint.

use std::sync::Arc;

use axum::extract::State;
use domain::{CatalogStore, OrderStore};
use serde::Serialize;

use crate::AppState;
use crate::response::Reply;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
}

/// GET /health
pub async fn check<C, O>(State(state): State<Arc<AppState<C, O>>>) -> Reply<HealthResponse>
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    Reply::ok(
        "Service is healthy",
        HealthResponse {
            status: "ok",
            storage: state.storage,
        },
    )
}
