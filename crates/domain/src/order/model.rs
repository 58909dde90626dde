//! The order record.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{LineItem, Money, OrderNumber, OrderStatus, PaymentMethod, ShippingAddress};
use crate::error::OrderError;

/// One entry in an order's append-only status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
    pub actor: UserId,
    pub note: Option<String>,
}

/// Computed amounts of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub tax: Money,
    pub total_amount: Money,
}

/// A placed order.
///
/// Line items and totals are fixed at creation. Afterwards only the
/// status, history and tracking number change, and each change bumps
/// `version` so stores can reject stale writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    order_number: OrderNumber,
    owner: UserId,
    items: Vec<LineItem>,
    totals: OrderTotals,
    payment_method: PaymentMethod,
    status: OrderStatus,
    shipping_address: ShippingAddress,
    tracking_number: Option<String>,
    history: Vec<StatusChange>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Order {
    /// Builds a fresh `pending` order with its first history entry.
    pub(crate) fn place(
        owner: UserId,
        order_number: OrderNumber,
        items: Vec<LineItem>,
        totals: OrderTotals,
        payment_method: PaymentMethod,
        shipping_address: ShippingAddress,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            order_number,
            history: vec![StatusChange {
                status: OrderStatus::Pending,
                at,
                actor: owner.clone(),
                note: Some("Order placed".to_string()),
            }],
            owner,
            items,
            totals,
            payment_method,
            status: OrderStatus::Pending,
            shipping_address,
            tracking_number: None,
            created_at: at,
            updated_at: at,
            version: 1,
        }
    }

    /// Same order under a new number, used when the first one collided.
    pub(crate) fn renumbered(mut self, order_number: OrderNumber) -> Self {
        self.order_number = order_number;
        self
    }

    /// Returns the order moved to `next`, with the change appended to history.
    pub(crate) fn transition(
        &self,
        next: OrderStatus,
        actor: &UserId,
        note: Option<String>,
        tracking_number: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let mut updated = self.clone();
        updated.status = next;
        updated.history.push(StatusChange {
            status: next,
            at,
            actor: actor.clone(),
            note,
        });
        if tracking_number.is_some() {
            updated.tracking_number = tracking_number;
        }
        updated.updated_at = at;
        updated.version += 1;
        Ok(updated)
    }

    /// Returns the order with a new tracking number and no status change.
    pub(crate) fn with_tracking_number(&self, tracking_number: String, at: DateTime<Utc>) -> Order {
        let mut updated = self.clone();
        updated.tracking_number = Some(tracking_number);
        updated.updated_at = at;
        updated.version += 1;
        updated
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn totals(&self) -> OrderTotals {
        self.totals
    }

    pub fn subtotal(&self) -> Money {
        self.totals.subtotal
    }

    pub fn shipping_fee(&self) -> Money {
        self.totals.shipping_fee
    }

    pub fn tax(&self) -> Money {
        self.totals.tax
    }

    pub fn total_amount(&self) -> Money {
        self.totals.total_amount
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
