//! Order storage port and the query vocabulary it understands.

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, Page, PageRequest, SortDirection, UserId};

use super::{Order, OrderStatus};
use crate::error::StoreError;

/// Conjunctive filter over stored orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Only orders placed by this user.
    pub owner: Option<UserId>,

    /// Only orders currently in this status.
    pub status: Option<OrderStatus>,

    /// Only orders created at or after this instant.
    pub created_from: Option<DateTime<Utc>>,

    /// Only orders created at or before this instant.
    pub created_to: Option<DateTime<Utc>>,
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn created_from(mut self, from: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self
    }

    pub fn created_to(mut self, to: DateTime<Utc>) -> Self {
        self.created_to = Some(to);
        self
    }

    /// Returns true if `order` satisfies every set criterion.
    pub fn matches(&self, order: &Order) -> bool {
        self.owner.as_ref().is_none_or(|o| order.owner() == o)
            && self.status.is_none_or(|s| order.status() == s)
            && self.created_from.is_none_or(|from| order.created_at() >= from)
            && self.created_to.is_none_or(|to| order.created_at() <= to)
    }
}

/// Fields orders can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    TotalAmount,
    Status,
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" | "created_at" | "date" => Ok(SortField::CreatedAt),
            "totalAmount" | "total_amount" | "totalPrice" | "total" => Ok(SortField::TotalAmount),
            "status" => Ok(SortField::Status),
            other => Err(format!("cannot sort orders by {other}")),
        }
    }
}

/// Sort order for listings. Defaults to newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl OrderSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Compares two orders; ties fall back to the order id so pages are stable.
    pub fn compare(&self, a: &Order, b: &Order) -> Ordering {
        let primary = match self.field {
            SortField::CreatedAt => a.created_at().cmp(&b.created_at()),
            SortField::TotalAmount => a.total_amount().cmp(&b.total_amount()),
            SortField::Status => a.status().rank().cmp(&b.status().rank()),
        };
        let ordering = primary.then_with(|| a.id().cmp(&b.id()));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Storage port for orders.
///
/// Orders are never deleted. Updates are compare-and-swap on the version.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Stores a new order.
    ///
    /// Fails with `DuplicateOrderNumber` if the order number is taken.
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Replaces the stored order if its version still equals `expected_version`.
    async fn update(&self, order: &Order, expected_version: u64) -> Result<(), StoreError>;

    /// Returns one page of orders matching `filter` in `sort` order.
    async fn list(
        &self,
        filter: &OrderFilter,
        sort: OrderSort,
        page: PageRequest,
    ) -> Result<Page<Order>, StoreError>;
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::order::model::fixtures::order_for;

    #[test]
    fn filter_is_conjunctive() {
        let now = Utc::now();
        let order = order_for("alice", 1000, now);

        assert!(OrderFilter::new().matches(&order));
        assert!(
            OrderFilter::new()
                .owner(UserId::new("alice"))
                .status(OrderStatus::Pending)
                .matches(&order)
        );
        assert!(
            !OrderFilter::new()
                .owner(UserId::new("alice"))
                .status(OrderStatus::Shipped)
                .matches(&order)
        );
    }

    #[test]
    fn date_range_is_inclusive() {
        let now = Utc::now();
        let order = order_for("alice", 1000, now);

        assert!(OrderFilter::new().created_from(now).created_to(now).matches(&order));
        assert!(
            !OrderFilter::new()
                .created_from(now + Duration::seconds(1))
                .matches(&order)
        );
        assert!(
            !OrderFilter::new()
                .created_to(now - Duration::seconds(1))
                .matches(&order)
        );
    }

    #[test]
    fn default_sort_is_newest_first() {
        let now = Utc::now();
        let older = order_for("alice", 1000, now - Duration::minutes(5));
        let newer = order_for("alice", 1000, now);

        let sort = OrderSort::default();
        assert_eq!(sort.compare(&newer, &older), Ordering::Less);
    }

    #[test]
    fn sort_by_total_ascending() {
        let now = Utc::now();
        let cheap = order_for("alice", 100, now);
        let pricey = order_for("alice", 9000, now);

        let sort = OrderSort::new(SortField::TotalAmount, SortDirection::Asc);
        assert_eq!(sort.compare(&cheap, &pricey), Ordering::Less);
    }

    #[test]
    fn sort_field_parses_api_names() {
        assert_eq!("createdAt".parse::<SortField>().unwrap(), SortField::CreatedAt);
        assert_eq!("totalPrice".parse::<SortField>().unwrap(), SortField::TotalAmount);
        assert!("owner".parse::<SortField>().is_err());
    }
}
