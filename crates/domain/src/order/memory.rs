use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, Page, PageRequest};
use tokio::sync::RwLock;

use super::{Order, OrderFilter, OrderSort, OrderStore};
use crate::error::StoreError;

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    numbers: HashMap<String, OrderId>,
}

/// In-memory order store for tests and single-process deployments.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let number = order.order_number().as_str();

        if state.numbers.contains_key(number) {
            return Err(StoreError::DuplicateOrderNumber(number.to_string()));
        }
        if state.orders.contains_key(&order.id()) {
            return Err(StoreError::DuplicateOrder(order.id()));
        }

        state.numbers.insert(number.to_string(), order.id());
        state.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn update(&self, order: &Order, expected_version: u64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let stored = state
            .orders
            .get_mut(&order.id())
            .ok_or(StoreError::MissingOrder(order.id()))?;

        if stored.version() != expected_version {
            return Err(StoreError::VersionConflict {
                order_id: order.id(),
                expected: expected_version,
                actual: stored.version(),
            });
        }

        *stored = order.clone();
        Ok(())
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        sort: OrderSort,
        page: PageRequest,
    ) -> Result<Page<Order>, StoreError> {
        let state = self.state.read().await;
        let mut matching: Vec<&Order> = state
            .orders
            .values()
            .filter(|order| filter.matches(order))
            .collect();
        matching.sort_by(|a, b| sort.compare(a, b));

        let pagination = page.paginate(matching.len() as u64);
        let items = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.page_size() as usize)
            .cloned()
            .collect();

        Ok(Page { items, pagination })
    }
}
