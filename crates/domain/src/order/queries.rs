//! Read access to orders with ownership checks.

use common::{OrderId, Page, PageRequest, Requester};

use super::{Order, OrderFilter, OrderSort, OrderStore};
use crate::error::OrderError;

#[derive(Clone)]
pub struct OrderQueries<O: OrderStore> {
    orders: O,
}

impl<O: OrderStore> OrderQueries<O> {
    pub fn new(orders: O) -> Self {
        Self { orders }
    }

    /// Returns an order to its owner or an administrator.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.user_id))]
    pub async fn get_order(
        &self,
        order_id: OrderId,
        requester: &Requester,
    ) -> Result<Order, OrderError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        if !requester.can_read(order.owner()) {
            tracing::warn!(%order_id, "order read denied");
            return Err(OrderError::AccessDenied("order belongs to another user"));
        }
        Ok(order)
    }

    /// Lists all orders matching `filter`. Administrators only.
    #[tracing::instrument(skip(self, requester), fields(requester = %requester.user_id))]
    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        sort: OrderSort,
        page: PageRequest,
        requester: &Requester,
    ) -> Result<Page<Order>, OrderError> {
        if !requester.is_admin() {
            return Err(OrderError::AccessDenied(
                "only administrators can list all orders",
            ));
        }
        self.list(filter, sort, page).await
    }

    /// Lists the requester's own orders; any owner in `filter` is replaced.
    pub async fn list_my_orders(
        &self,
        filter: OrderFilter,
        sort: OrderSort,
        page: PageRequest,
        requester: &Requester,
    ) -> Result<Page<Order>, OrderError> {
        self.list(filter.owner(requester.user_id.clone()), sort, page)
            .await
    }

    async fn list(
        &self,
        filter: OrderFilter,
        sort: OrderSort,
        page: PageRequest,
    ) -> Result<Page<Order>, OrderError> {
        if let (Some(from), Some(to)) = (filter.created_from, filter.created_to)
            && from > to
        {
            return Err(OrderError::Validation(
                "start date must not be after end date".into(),
            ));
        }
        Ok(self.orders.list(&filter, sort, page).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use common::UserId;

    use super::*;
    use crate::order::InMemoryOrderStore;
    use crate::order::model::fixtures::order_for;

    async fn queries() -> (OrderQueries<InMemoryOrderStore>, Order) {
        let store = InMemoryOrderStore::new();
        let mine = order_for("alice", 100, Utc::now());
        store.insert(&mine).await.unwrap();
        store
            .insert(&order_for("bob", 200, Utc::now()))
            .await
            .unwrap();
        (OrderQueries::new(store), mine)
    }

    #[tokio::test]
    async fn owner_and_admin_can_read() {
        let (queries, order) = queries().await;
        assert!(
            queries
                .get_order(order.id(), &Requester::customer("alice"))
                .await
                .is_ok()
        );
        assert!(
            queries
                .get_order(order.id(), &Requester::admin("root"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn stranger_is_denied() {
        let (queries, order) = queries().await;
        let err = queries
            .get_order(order.id(), &Requester::customer("mallory"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn missing_order() {
        let (queries, _) = queries().await;
        let err = queries
            .get_order(OrderId::new(), &Requester::admin("root"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn my_orders_ignores_foreign_owner_filter() {
        let (queries, _) = queries().await;
        let page = queries
            .list_my_orders(
                OrderFilter::new().owner(UserId::new("bob")),
                OrderSort::default(),
                PageRequest::default(),
                &Requester::customer("alice"),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].owner().as_str(), "alice");
    }

    #[tokio::test]
    async fn listing_everything_is_admin_only() {
        let (queries, _) = queries().await;
        let err = queries
            .list_orders(
                OrderFilter::new(),
                OrderSort::default(),
                PageRequest::default(),
                &Requester::customer("alice"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::AccessDenied(_)));

        let page = queries
            .list_orders(
                OrderFilter::new(),
                OrderSort::default(),
                PageRequest::default(),
                &Requester::admin("root"),
            )
            .await
            .unwrap();
        assert_eq!(page.pagination.total_items, 2);
    }

    #[tokio::test]
    async fn inverted_date_range_is_rejected() {
        let (queries, _) = queries().await;
        let now = Utc::now();
        let err = queries
            .list_orders(
                OrderFilter::new()
                    .created_from(now)
                    .created_to(now - Duration::days(1)),
                OrderSort::default(),
                PageRequest::default(),
                &Requester::admin("root"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }
}
