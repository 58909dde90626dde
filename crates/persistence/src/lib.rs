//! PostgreSQL adapters for the catalog and order store ports.
//!
//! A single [`PostgresStore`] implements both [`domain::CatalogStore`] and
//! [`domain::OrderStore`] over one connection pool.

mod catalog;
mod error;
mod orders;
mod store;

pub use store::PostgresStore;
