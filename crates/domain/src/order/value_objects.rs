//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ProductId;
use crate::error::OrderError;

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Highest unit price the catalog accepts ($100,000,000.00).
    pub const MAX_UNIT_PRICE: Money = Money {
        cents: 10_000_000_000,
    };

    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_times(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Adds two amounts, or `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    /// Applies a rate expressed in basis points, rounding half up.
    ///
    /// Returns `None` when the result does not fit.
    pub fn basis_points(&self, bps: u32) -> Option<Money> {
        let scaled = i128::from(self.cents) * i128::from(bps);
        i64::try_from((scaled + 5_000) / 10_000)
            .ok()
            .map(Money::from_cents)
    }

    /// Absolute difference between two amounts, in cents.
    pub fn distance(&self, other: Money) -> u64 {
        self.cents.abs_diff(other.cents)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

/// One product, quantity and captured unit price within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,

    /// Product title at the time the order was placed.
    pub title: String,

    pub quantity: u32,

    /// Unit price captured at order creation; never re-read from the catalog.
    pub unit_price: Money,
}

impl LineItem {
    pub fn new(
        product_id: impl Into<ProductId>,
        title: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            title: title.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns `unit_price * quantity`, or `None` if it overflows.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_times(self.quantity)
    }
}

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: String,
}

impl ShippingAddress {
    /// Trims every field, checks the required ones and fills in the country.
    pub fn normalize(self, default_country: &str) -> Result<Self, OrderError> {
        fn required(field: &'static str, value: String) -> Result<String, OrderError> {
            let value = value.trim().to_string();
            if value.is_empty() {
                return Err(OrderError::Validation(format!(
                    "shipping address {field} is required"
                )));
            }
            Ok(value)
        }

        fn optional(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        let country = self.country.trim();
        Ok(Self {
            name: required("name", self.name)?,
            phone: required("phone", self.phone)?,
            street: required("street", self.street)?,
            city: required("city", self.city)?,
            state: optional(self.state),
            zip: optional(self.zip),
            country: if country.is_empty() {
                default_country.to_string()
            } else {
                country.to_string()
            },
        })
    }
}

/// How the customer intends to pay. Recorded only; no payment is taken here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
    Card,
    BankTransfer,
    Wallet,
}

/// Human-meaningful, unique order reference such as `ORD-20250131-9F2C01AB`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Date prefix plus a random suffix. Uniqueness is enforced by the store.
    pub fn generate(at: DateTime<Utc>) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!(
            "ORD-{}-{}",
            at.format("%Y%m%d"),
            suffix[..8].to_ascii_uppercase()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
