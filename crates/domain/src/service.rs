//! Order service providing a single entry point for order operations.

use common::{OrderId, Page, PageRequest, Requester};

use crate::catalog::{CatalogService, CatalogStore};
use crate::error::OrderError;
use crate::notification::NotificationDispatcher;
use crate::order::{
    Order, OrderBuilder, OrderFilter, OrderPolicy, OrderQueries, OrderSort, OrderStatus,
    OrderStore, PlaceOrder, StatusTransitionManager, StatusUpdate,
};

/// Service for managing orders and the catalog they draw from.
///
/// Wires the order builder, the status transition manager and the query
/// layer to the same stores.
#[derive(Clone)]
pub struct OrderService<C, O>
where
    C: CatalogStore + Clone,
    O: OrderStore + Clone,
{
    builder: OrderBuilder<C, O>,
    transitions: StatusTransitionManager<C, O>,
    queries: OrderQueries<O>,
    catalog: CatalogService<C>,
}

impl<C, O> OrderService<C, O>
where
    C: CatalogStore + Clone,
    O: OrderStore + Clone,
{
    pub fn new(
        catalog: C,
        orders: O,
        policy: OrderPolicy,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            builder: OrderBuilder::new(
                catalog.clone(),
                orders.clone(),
                policy,
                notifications.clone(),
            ),
            transitions: StatusTransitionManager::new(
                catalog.clone(),
                orders.clone(),
                notifications,
            ),
            queries: OrderQueries::new(orders),
            catalog: CatalogService::new(catalog),
        }
    }

    pub fn catalog(&self) -> &CatalogService<C> {
        &self.catalog
    }

    pub async fn create_order(&self, cmd: PlaceOrder) -> Result<Order, OrderError> {
        self.builder.create_order(cmd).await
    }

    pub async fn update_status(
        &self,
        order_id: OrderId,
        update: StatusUpdate,
        requester: &Requester,
    ) -> Result<Order, OrderError> {
        self.transitions
            .update_status(order_id, update, requester)
            .await
    }

    /// Shorthand for a transition to `cancelled`.
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        note: Option<String>,
        requester: &Requester,
    ) -> Result<Order, OrderError> {
        let update = StatusUpdate {
            note,
            ..StatusUpdate::to(OrderStatus::Cancelled)
        };
        self.update_status(order_id, update, requester).await
    }

    pub async fn set_tracking_number(
        &self,
        order_id: OrderId,
        tracking_number: String,
        requester: &Requester,
    ) -> Result<Order, OrderError> {
        self.transitions
            .set_tracking_number(order_id, tracking_number, requester)
            .await
    }

    pub async fn get_order(
        &self,
        order_id: OrderId,
        requester: &Requester,
    ) -> Result<Order, OrderError> {
        self.queries.get_order(order_id, requester).await
    }

    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        sort: OrderSort,
        page: PageRequest,
        requester: &Requester,
    ) -> Result<Page<Order>, OrderError> {
        self.queries
            .list_orders(filter, sort, page, requester)
            .await
    }

    pub async fn list_my_orders(
        &self,
        filter: OrderFilter,
        sort: OrderSort,
        page: PageRequest,
        requester: &Requester,
    ) -> Result<Page<Order>, OrderError> {
        self.queries
            .list_my_orders(filter, sort, page, requester)
            .await
    }
}
