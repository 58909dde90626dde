//! Orders: model, store port, creation, status transitions and queries.

mod builder;
mod memory;
pub(crate) mod model;
mod queries;
mod status;
mod store;
mod transitions;
mod value_objects;

pub use builder::{LineRequest, OrderBuilder, OrderPolicy, PlaceOrder};
pub use memory::InMemoryOrderStore;
pub use model::{Order, OrderTotals, StatusChange};
pub use queries::OrderQueries;
pub use status::OrderStatus;
pub use store::{OrderFilter, OrderSort, OrderStore, SortField};
pub use transitions::{StatusTransitionManager, StatusUpdate};
pub use value_objects::{LineItem, Money, OrderNumber, PaymentMethod, ShippingAddress};
