//! Status changes and their side effects.

use chrono::Utc;
use common::{OrderId, Requester};

use super::{Order, OrderStatus, OrderStore};
use crate::catalog::CatalogStore;
use crate::error::{OrderError, StoreError};
use crate::notification::{Notification, NotificationDispatcher};

/// How often a write that lost a version race is re-evaluated.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// A requested status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub tracking_number: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            note: None,
            tracking_number: None,
        }
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn tracking_number(mut self, tracking_number: impl Into<String>) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }
}

/// Applies status transitions checked against the central transition table.
#[derive(Clone)]
pub struct StatusTransitionManager<C: CatalogStore, O: OrderStore> {
    catalog: C,
    orders: O,
    notifications: NotificationDispatcher,
}

impl<C: CatalogStore, O: OrderStore> StatusTransitionManager<C, O> {
    pub fn new(catalog: C, orders: O, notifications: NotificationDispatcher) -> Self {
        Self {
            catalog,
            orders,
            notifications,
        }
    }

    /// Moves an order to a new status. Administrators only.
    ///
    /// Cancelling returns every line's units to stock. The store's version
    /// check lets exactly one of several concurrent cancellations win, and
    /// only the winner restores stock.
    #[tracing::instrument(skip(self, requester), fields(actor = %requester.user_id))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        update: StatusUpdate,
        requester: &Requester,
    ) -> Result<Order, OrderError> {
        if !requester.is_admin() {
            return Err(OrderError::AccessDenied(
                "only administrators can change order status",
            ));
        }

        let (previous, updated) = self
            .write_with_retry(order_id, |order| {
                let next = order.transition(
                    update.status,
                    &requester.user_id,
                    clean(update.note.clone()),
                    clean(update.tracking_number.clone()),
                    Utc::now(),
                )?;
                Ok((order.status(), next))
            })
            .await
            .inspect_err(|e| {
                if let OrderError::InvalidTransition { from, to } = e {
                    tracing::info!(%from, %to, "rejected status transition");
                }
            })?;

        metrics::counter!("order_status_transitions_total", "to" => updated.status().as_str())
            .increment(1);
        tracing::info!(from = %previous, to = %updated.status(), "order status changed");

        if previous.restores_stock_on(updated.status()) {
            self.restore_stock(&updated).await;
        }

        self.notifications.dispatch(Notification::StatusChanged {
            order: updated.clone(),
            previous,
        });

        Ok(updated)
    }

    /// Sets the tracking number without changing status. Administrators only.
    #[tracing::instrument(skip(self, requester), fields(actor = %requester.user_id))]
    pub async fn set_tracking_number(
        &self,
        order_id: OrderId,
        tracking_number: String,
        requester: &Requester,
    ) -> Result<Order, OrderError> {
        if !requester.is_admin() {
            return Err(OrderError::AccessDenied(
                "only administrators can update orders",
            ));
        }
        let tracking_number = clean(Some(tracking_number))
            .ok_or_else(|| OrderError::Validation("tracking number cannot be empty".into()))?;

        let (_, updated) = self
            .write_with_retry(order_id, |order| {
                Ok((
                    order.status(),
                    order.with_tracking_number(tracking_number.clone(), Utc::now()),
                ))
            })
            .await?;
        Ok(updated)
    }

    /// Loads the order, derives the new version with `change` and writes it
    /// back, re-running `change` against fresh state if another writer won.
    async fn write_with_retry<F>(
        &self,
        order_id: OrderId,
        change: F,
    ) -> Result<(OrderStatus, Order), OrderError>
    where
        F: Fn(&Order) -> Result<(OrderStatus, Order), OrderError>,
    {
        let mut attempt = 1;
        loop {
            let current = self
                .orders
                .get(order_id)
                .await?
                .ok_or(OrderError::OrderNotFound(order_id))?;
            let (previous, updated) = change(&current)?;

            match self.orders.update(&updated, current.version()).await {
                Ok(()) => return Ok((previous, updated)),
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_WRITE_ATTEMPTS => {
                    tracing::debug!(%order_id, attempt, "order changed concurrently, retrying");
                    attempt += 1;
                }
                Err(StoreError::MissingOrder(id)) => return Err(OrderError::OrderNotFound(id)),
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn restore_stock(&self, order: &Order) {
        for item in order.items() {
            match self.catalog.increment(&item.product_id, item.quantity).await {
                Ok(stock) => {
                    metrics::counter!("stock_restored_units_total")
                        .increment(u64::from(item.quantity));
                    tracing::info!(product_id = %item.product_id, quantity = item.quantity, stock, "stock restored");
                }
                Err(e) => tracing::error!(
                    order_id = %order.id(),
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    error = %e,
                    "failed to restore stock for cancelled order"
                ),
            }
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, Product, ProductId};
    use crate::order::model::fixtures::address;
    use crate::order::{
        InMemoryOrderStore, LineRequest, Money, OrderBuilder, OrderPolicy, PlaceOrder,
    };

    struct Fixture {
        catalog: InMemoryCatalog,
        builder: OrderBuilder<InMemoryCatalog, InMemoryOrderStore>,
        manager: StatusTransitionManager<InMemoryCatalog, InMemoryOrderStore>,
    }

    fn fixture() -> Fixture {
        let catalog = InMemoryCatalog::with_products([Product::new(
            "SKU-A",
            "Widget",
            Money::from_cents(1000),
            5,
        )]);
        let orders = InMemoryOrderStore::new();
        let notifications = NotificationDispatcher::default();
        Fixture {
            builder: OrderBuilder::new(
                catalog.clone(),
                orders.clone(),
                OrderPolicy::default(),
                notifications.clone(),
            ),
            manager: StatusTransitionManager::new(catalog.clone(), orders, notifications),
            catalog,
        }
    }

    async fn place(f: &Fixture, quantity: u32) -> Order {
        f.builder
            .create_order(PlaceOrder::new(
                "alice",
                vec![LineRequest::new("SKU-A", quantity)],
                address(),
            ))
            .await
            .unwrap()
    }

    fn admin() -> Requester {
        Requester::admin("root")
    }

    #[tokio::test]
    async fn customers_cannot_change_status() {
        let f = fixture();
        let order = place(&f, 1).await;

        let err = f
            .manager
            .update_status(
                order.id(),
                StatusUpdate::to(OrderStatus::Confirmed),
                &Requester::customer("alice"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn unknown_order() {
        let f = fixture();
        let err = f
            .manager
            .update_status(OrderId::new(), StatusUpdate::to(OrderStatus::Confirmed), &admin())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn cancel_restores_stock_once() {
        let f = fixture();
        let id = ProductId::new("SKU-A");
        let order = place(&f, 2).await;
        assert_eq!(f.catalog.stock_of(&id).await, Some(3));

        let cancelled = f
            .manager
            .update_status(
                order.id(),
                StatusUpdate::to(OrderStatus::Cancelled).note("customer request"),
                &admin(),
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert_eq!(f.catalog.stock_of(&id).await, Some(5));

        let err = f
            .manager
            .update_status(order.id(), StatusUpdate::to(OrderStatus::Cancelled), &admin())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Cancelled
            }
        ));
        assert_eq!(f.catalog.stock_of(&id).await, Some(5));
    }

    #[tokio::test]
    async fn cannot_cancel_after_processing_starts() {
        let f = fixture();
        let order = place(&f, 1).await;
        for status in [OrderStatus::Confirmed, OrderStatus::Processing] {
            f.manager
                .update_status(order.id(), StatusUpdate::to(status), &admin())
                .await
                .unwrap();
        }

        let err = f
            .manager
            .update_status(order.id(), StatusUpdate::to(OrderStatus::Cancelled), &admin())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
        assert_eq!(f.catalog.stock_of(&ProductId::new("SKU-A")).await, Some(4));
    }

    #[tokio::test]
    async fn history_grows_only_on_success() {
        let f = fixture();
        let order = place(&f, 1).await;
        assert_eq!(order.history().len(), 1);

        let confirmed = f
            .manager
            .update_status(order.id(), StatusUpdate::to(OrderStatus::Confirmed), &admin())
            .await
            .unwrap();
        assert_eq!(confirmed.history().len(), 2);

        let _ = f
            .manager
            .update_status(order.id(), StatusUpdate::to(OrderStatus::Delivered), &admin())
            .await
            .unwrap_err();

        let processing = f
            .manager
            .update_status(order.id(), StatusUpdate::to(OrderStatus::Processing), &admin())
            .await
            .unwrap();
        assert_eq!(processing.history().len(), 3);
        assert_eq!(processing.history()[2].actor.as_str(), "root");
    }

    #[tokio::test]
    async fn tracking_number_without_status_change() {
        let f = fixture();
        let order = place(&f, 1).await;

        let updated = f
            .manager
            .set_tracking_number(order.id(), " TRK-9 ".into(), &admin())
            .await
            .unwrap();
        assert_eq!(updated.tracking_number(), Some("TRK-9"));
        assert_eq!(updated.status(), OrderStatus::Pending);
        assert_eq!(updated.history().len(), 1);

        let err = f
            .manager
            .set_tracking_number(order.id(), "   ".into(), &admin())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[tokio::test]
    async fn refund_does_not_touch_stock() {
        let f = fixture();
        let order = place(&f, 2).await;

        let refunded = f
            .manager
            .update_status(order.id(), StatusUpdate::to(OrderStatus::Refunded), &admin())
            .await
            .unwrap();
        assert!(refunded.status().allowed_next().is_empty());
        assert_eq!(f.catalog.stock_of(&ProductId::new("SKU-A")).await, Some(3));
    }
}
