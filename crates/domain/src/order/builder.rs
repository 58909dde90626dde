//! Order creation: validation, pricing and stock reservation.

use std::time::Instant;

use chrono::Utc;
use common::UserId;

use super::{
    LineItem, Money, Order, OrderNumber, OrderStore, OrderTotals, PaymentMethod, ShippingAddress,
};
use crate::catalog::{CatalogStore, ProductId, StockDecrement};
use crate::error::{OrderError, StoreError};
use crate::notification::{Notification, NotificationDispatcher};

const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Pricing and defaulting rules applied to every new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPolicy {
    /// Flat shipping fee added to every order.
    pub shipping_fee: Money,
    /// Tax on the subtotal, in basis points.
    pub tax_rate_bps: u32,
    /// Largest accepted gap between a client-supplied total and the computed one.
    pub total_tolerance: Money,
    /// Country used when the shipping address names none.
    pub default_country: String,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            shipping_fee: Money::from_cents(500),
            tax_rate_bps: 0,
            total_tolerance: Money::zero(),
            default_country: "US".to_string(),
        }
    }
}

impl OrderPolicy {
    /// Computes the order totals for `items`.
    ///
    /// Fails with `Validation` when any amount overflows.
    pub fn price(&self, items: &[LineItem]) -> Result<OrderTotals, OrderError> {
        let subtotal = items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.checked_add(item.line_total()?))
            .ok_or_else(too_large)?;
        let tax = subtotal
            .basis_points(self.tax_rate_bps)
            .ok_or_else(too_large)?;
        let total_amount = subtotal
            .checked_add(self.shipping_fee)
            .and_then(|sum| sum.checked_add(tax))
            .ok_or_else(too_large)?;

        Ok(OrderTotals {
            subtotal,
            shipping_fee: self.shipping_fee,
            tax,
            total_amount,
        })
    }
}

fn too_large() -> OrderError {
    OrderError::Validation("order total is too large".into())
}

/// A requested line: which product and how many.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl LineRequest {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Everything needed to place an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub owner: UserId,
    pub items: Vec<LineRequest>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    /// Total the client believes it owes. Only cross-checked, never used.
    pub client_total: Option<Money>,
}

impl PlaceOrder {
    pub fn new(
        owner: impl Into<UserId>,
        items: Vec<LineRequest>,
        shipping_address: ShippingAddress,
    ) -> Self {
        Self {
            owner: owner.into(),
            items,
            shipping_address,
            payment_method: PaymentMethod::default(),
            client_total: None,
        }
    }

    pub fn payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    pub fn client_total(mut self, total: Money) -> Self {
        self.client_total = Some(total);
        self
    }
}

/// Units taken from the catalog by one request, so they can be given back.
struct StockReservation<'a, C: CatalogStore> {
    catalog: &'a C,
    taken: Vec<(ProductId, u32)>,
}

impl<'a, C: CatalogStore> StockReservation<'a, C> {
    fn new(catalog: &'a C) -> Self {
        Self {
            catalog,
            taken: Vec::new(),
        }
    }

    async fn take(&mut self, product_id: &ProductId, quantity: u32) -> Result<(), OrderError> {
        match self.catalog.try_decrement(product_id, quantity).await? {
            StockDecrement::Applied { .. } => {
                self.taken.push((product_id.clone(), quantity));
                Ok(())
            }
            StockDecrement::Insufficient { available } => Err(OrderError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available,
            }),
            StockDecrement::NotFound => Err(OrderError::ProductNotFound {
                product_id: product_id.clone(),
            }),
        }
    }

    /// Gives every taken unit back.
    async fn release(self) {
        for (product_id, quantity) in self.taken.into_iter().rev() {
            if let Err(e) = self.catalog.increment(&product_id, quantity).await {
                tracing::error!(%product_id, quantity, error = %e, "failed to release reserved stock");
            } else {
                tracing::warn!(%product_id, quantity, "released reserved stock");
            }
        }
    }
}

/// Builds, prices and persists new orders.
#[derive(Clone)]
pub struct OrderBuilder<C: CatalogStore, O: OrderStore> {
    catalog: C,
    orders: O,
    policy: OrderPolicy,
    notifications: NotificationDispatcher,
}

impl<C: CatalogStore, O: OrderStore> OrderBuilder<C, O> {
    pub fn new(
        catalog: C,
        orders: O,
        policy: OrderPolicy,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            catalog,
            orders,
            policy,
            notifications,
        }
    }

    /// Places an order.
    ///
    /// Either every line's stock is taken and the order is stored, or
    /// nothing changes.
    #[tracing::instrument(skip(self, cmd), fields(owner = %cmd.owner, lines = cmd.items.len()))]
    pub async fn create_order(&self, cmd: PlaceOrder) -> Result<Order, OrderError> {
        let started = Instant::now();
        let result = self.try_create(cmd).await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                metrics::histogram!("order_create_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    order_id = %order.id(),
                    order_number = %order.order_number(),
                    total = %order.total_amount(),
                    "order placed"
                );
                self.notifications
                    .dispatch(Notification::OrderPlaced(order.clone()));
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.kind()).increment(1);
                tracing::info!(error = %e, "order rejected");
            }
        }

        result
    }

    async fn try_create(&self, cmd: PlaceOrder) -> Result<Order, OrderError> {
        if cmd.items.is_empty() {
            return Err(OrderError::Validation(
                "an order needs at least one item".into(),
            ));
        }
        if let Some(line) = cmd.items.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::Validation(format!(
                "quantity for product {} must be at least 1",
                line.product_id
            )));
        }
        let address = cmd
            .shipping_address
            .normalize(&self.policy.default_country)?;

        let items = self.snapshot_lines(&cmd.items).await?;
        let totals = self.policy.price(&items)?;

        if let Some(claimed) = cmd.client_total
            && claimed.distance(totals.total_amount)
                > self.policy.total_tolerance.cents().unsigned_abs()
        {
            return Err(OrderError::Validation(format!(
                "submitted total {claimed} does not match computed total {}",
                totals.total_amount
            )));
        }

        let mut reservation = StockReservation::new(&self.catalog);
        for item in &items {
            if let Err(e) = reservation.take(&item.product_id, item.quantity).await {
                reservation.release().await;
                return Err(e);
            }
        }

        let now = Utc::now();
        let order = Order::place(
            cmd.owner,
            OrderNumber::generate(now),
            items,
            totals,
            cmd.payment_method,
            address,
            now,
        );

        match self.store_with_unique_number(order).await {
            Ok(order) => Ok(order),
            Err(e) => {
                tracing::error!(error = %e, "failed to store order");
                reservation.release().await;
                Err(e.into())
            }
        }
    }

    /// Reads each product once and captures its title and current price.
    ///
    /// Rejects up front when a product is missing, inactive or visibly short
    /// on stock. The authoritative stock check is the atomic decrement.
    async fn snapshot_lines(&self, lines: &[LineRequest]) -> Result<Vec<LineItem>, OrderError> {
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self
                .catalog
                .get(&line.product_id)
                .await?
                .filter(|p| p.active)
                .ok_or_else(|| OrderError::ProductNotFound {
                    product_id: line.product_id.clone(),
                })?;

            if line.quantity > product.stock {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    requested: line.quantity,
                    available: product.stock,
                });
            }

            items.push(LineItem::new(
                product.id,
                product.title,
                line.quantity,
                product.price,
            ));
        }
        Ok(items)
    }

    async fn store_with_unique_number(&self, mut order: Order) -> Result<Order, StoreError> {
        let mut attempt = 1;
        loop {
            match self.orders.insert(&order).await {
                Ok(()) => return Ok(order),
                Err(StoreError::DuplicateOrderNumber(number)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                    tracing::debug!(%number, attempt, "order number collision, regenerating");
                    attempt += 1;
                    order = order.renumbered(OrderNumber::generate(Utc::now()));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use common::{OrderId, Page, PageRequest};

    use super::*;
    use crate::catalog::{InMemoryCatalog, Product};
    use crate::order::model::fixtures::address;
    use crate::order::{InMemoryOrderStore, OrderFilter, OrderSort};

    #[derive(Clone, Copy)]
    enum InsertFailure {
        Backend,
        NumberTaken,
    }

    /// Order store whose first `failures` inserts fail.
    #[derive(Clone)]
    struct FlakyOrderStore {
        inner: InMemoryOrderStore,
        failure: InsertFailure,
        failures: usize,
        inserts: Arc<AtomicUsize>,
    }

    impl FlakyOrderStore {
        fn new(failure: InsertFailure, failures: usize) -> Self {
            Self {
                inner: InMemoryOrderStore::new(),
                failure,
                failures,
                inserts: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn inserts(&self) -> usize {
            self.inserts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OrderStore for FlakyOrderStore {
        async fn insert(&self, order: &Order) -> Result<(), StoreError> {
            if self.inserts.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(match self.failure {
                    InsertFailure::Backend => StoreError::Backend("connection reset".into()),
                    InsertFailure::NumberTaken => {
                        StoreError::DuplicateOrderNumber(order.order_number().to_string())
                    }
                });
            }
            self.inner.insert(order).await
        }

        async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
            self.inner.get(id).await
        }

        async fn update(&self, order: &Order, expected_version: u64) -> Result<(), StoreError> {
            self.inner.update(order, expected_version).await
        }

        async fn list(
            &self,
            filter: &OrderFilter,
            sort: OrderSort,
            page: PageRequest,
        ) -> Result<Page<Order>, StoreError> {
            self.inner.list(filter, sort, page).await
        }
    }

    fn flaky_builder(
        catalog: InMemoryCatalog,
        orders: FlakyOrderStore,
    ) -> OrderBuilder<InMemoryCatalog, FlakyOrderStore> {
        OrderBuilder::new(
            catalog,
            orders,
            OrderPolicy::default(),
            NotificationDispatcher::default(),
        )
    }

    fn two_lines() -> Vec<LineRequest> {
        vec![LineRequest::new("SKU-A", 2), LineRequest::new("SKU-B", 3)]
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::with_products([
            Product::new("SKU-A", "Widget", Money::from_cents(1000), 3),
            Product::new("SKU-B", "Gadget", Money::from_cents(250), 10),
            Product::new("SKU-X", "Retired", Money::from_cents(50), 10).inactive(),
        ])
    }

    fn builder(catalog: InMemoryCatalog) -> OrderBuilder<InMemoryCatalog, InMemoryOrderStore> {
        OrderBuilder::new(
            catalog,
            InMemoryOrderStore::new(),
            OrderPolicy::default(),
            NotificationDispatcher::default(),
        )
    }

    #[test]
    fn policy_prices_subtotal_shipping_and_tax() {
        let policy = OrderPolicy {
            tax_rate_bps: 1_000,
            ..OrderPolicy::default()
        };
        let items = vec![
            LineItem::new("SKU-A", "Widget", 2, Money::from_cents(1000)),
            LineItem::new("SKU-B", "Gadget", 4, Money::from_cents(250)),
        ];

        let totals = policy.price(&items).unwrap();
        assert_eq!(totals.subtotal.cents(), 3000);
        assert_eq!(totals.shipping_fee.cents(), 500);
        assert_eq!(totals.tax.cents(), 300);
        assert_eq!(totals.total_amount.cents(), 3800);
    }

    #[tokio::test]
    async fn creates_order_and_takes_stock() {
        let catalog = catalog();
        let builder = builder(catalog.clone());

        let order = builder
            .create_order(PlaceOrder::new(
                "alice",
                vec![LineRequest::new("SKU-A", 1), LineRequest::new("SKU-B", 2)],
                address(),
            ))
            .await
            .unwrap();

        assert_eq!(order.subtotal().cents(), 1500);
        assert_eq!(order.total_amount().cents(), 2000);
        assert_eq!(order.items()[0].title, "Widget");
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-A")).await, Some(2));
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-B")).await, Some(8));
    }

    #[tokio::test]
    async fn rejects_empty_and_zero_quantity() {
        let builder = builder(catalog());

        let err = builder
            .create_order(PlaceOrder::new("alice", vec![], address()))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));

        let err = builder
            .create_order(PlaceOrder::new(
                "alice",
                vec![LineRequest::new("SKU-A", 0)],
                address(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[tokio::test]
    async fn inactive_product_is_not_found() {
        let err = builder(catalog())
            .create_order(PlaceOrder::new(
                "alice",
                vec![LineRequest::new("SKU-X", 1)],
                address(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::ProductNotFound { product_id } if product_id.as_str() == "SKU-X"));
    }

    #[tokio::test]
    async fn duplicate_lines_cannot_oversell() {
        let catalog = catalog();
        let err = builder(catalog.clone())
            .create_order(PlaceOrder::new(
                "alice",
                vec![
                    LineRequest::new("SKU-B", 1),
                    LineRequest::new("SKU-A", 2),
                    LineRequest::new("SKU-A", 2),
                ],
                address(),
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            }
        ));
        // every earlier decrement was handed back
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-A")).await, Some(3));
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-B")).await, Some(10));
    }

    #[tokio::test]
    async fn client_total_is_only_a_cross_check() {
        let catalog = catalog();
        let builder = builder(catalog.clone());
        let lines = vec![LineRequest::new("SKU-A", 1)];

        let err = builder
            .create_order(
                PlaceOrder::new("alice", lines.clone(), address())
                    .client_total(Money::from_cents(1)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(msg) if msg.contains("does not match")));
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-A")).await, Some(3));

        let order = builder
            .create_order(
                PlaceOrder::new("alice", lines, address()).client_total(Money::from_cents(1500)),
            )
            .await
            .unwrap();
        assert_eq!(order.total_amount().cents(), 1500);
    }

    #[test]
    fn policy_rejects_overflowing_totals() {
        let policy = OrderPolicy::default();
        let items = vec![LineItem::new("SKU-Y", "Yacht", 3, Money::from_cents(i64::MAX / 2))];
        assert!(matches!(policy.price(&items), Err(OrderError::Validation(_))));

        let items = vec![LineItem::new("SKU-Y", "Yacht", 1, Money::from_cents(i64::MAX))];
        assert!(matches!(policy.price(&items), Err(OrderError::Validation(_))));
    }

    #[tokio::test]
    async fn overflowing_order_takes_no_stock() {
        let catalog = InMemoryCatalog::with_products([Product::new(
            "SKU-Y",
            "Yacht",
            Money::from_cents(i64::MAX / 2),
            5,
        )]);
        let orders = InMemoryOrderStore::new();
        let builder = OrderBuilder::new(
            catalog.clone(),
            orders.clone(),
            OrderPolicy::default(),
            NotificationDispatcher::default(),
        );

        let err = builder
            .create_order(PlaceOrder::new(
                "alice",
                vec![LineRequest::new("SKU-Y", 3)],
                address(),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Validation(msg) if msg.contains("too large")));
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-Y")).await, Some(5));
        assert_eq!(orders.order_count().await, 0);
    }

    #[tokio::test]
    async fn extreme_client_total_is_a_mismatch() {
        let catalog = catalog();
        let builder = builder(catalog.clone());

        for claimed in [i64::MIN, i64::MAX] {
            let err = builder
                .create_order(
                    PlaceOrder::new("alice", vec![LineRequest::new("SKU-A", 1)], address())
                        .client_total(Money::from_cents(claimed)),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, OrderError::Validation(msg) if msg.contains("does not match")));
        }
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-A")).await, Some(3));
    }

    #[tokio::test]
    async fn failed_persist_gives_stock_back() {
        let catalog = catalog();
        let orders = FlakyOrderStore::new(InsertFailure::Backend, 1);
        let builder = flaky_builder(catalog.clone(), orders.clone());

        let err = builder
            .create_order(PlaceOrder::new("alice", two_lines(), address()))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Persistence(StoreError::Backend(_))));
        assert_eq!(orders.inserts(), 1);
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-A")).await, Some(3));
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-B")).await, Some(10));
    }

    #[tokio::test]
    async fn order_number_collisions_are_retried() {
        let catalog = catalog();
        let orders = FlakyOrderStore::new(InsertFailure::NumberTaken, ORDER_NUMBER_ATTEMPTS - 1);
        let builder = flaky_builder(catalog.clone(), orders.clone());

        let order = builder
            .create_order(PlaceOrder::new("alice", two_lines(), address()))
            .await
            .unwrap();

        assert_eq!(orders.inserts(), ORDER_NUMBER_ATTEMPTS);
        assert!(orders.get(order.id()).await.unwrap().is_some());
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-A")).await, Some(1));
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-B")).await, Some(7));
    }

    #[tokio::test]
    async fn order_number_collisions_give_up_after_five_attempts() {
        let catalog = catalog();
        let orders = FlakyOrderStore::new(InsertFailure::NumberTaken, ORDER_NUMBER_ATTEMPTS);
        let builder = flaky_builder(catalog.clone(), orders.clone());

        let err = builder
            .create_order(PlaceOrder::new("alice", two_lines(), address()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::Persistence(StoreError::DuplicateOrderNumber(_))
        ));
        assert_eq!(orders.inserts(), ORDER_NUMBER_ATTEMPTS);
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-A")).await, Some(3));
        assert_eq!(catalog.stock_of(&ProductId::new("SKU-B")).await, Some(10));
    }
}
