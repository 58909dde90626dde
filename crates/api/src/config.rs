//! Application configuration loaded from environment variables.

use domain::{Money, OrderPolicy};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory stores when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default `10`)
/// - `SHIPPING_FEE_CENTS`, `TAX_RATE_BPS`, `TOTAL_TOLERANCE_CENTS`,
///   `DEFAULT_COUNTRY`: order pricing policy
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub shipping_fee_cents: i64,
    pub tax_rate_bps: u32,
    pub total_tolerance_cents: i64,
    pub default_country: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let trimmed = |key: &str| lookup(key).map(|v| v.trim().to_string());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: trimmed("PORT").and_then(|v| v.parse().ok()).unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: trimmed("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            shipping_fee_cents: trimmed("SHIPPING_FEE_CENTS")
                .and_then(|v| v.parse().ok())
                .filter(|fee: &i64| *fee >= 0)
                .unwrap_or(defaults.shipping_fee_cents),
            tax_rate_bps: trimmed("TAX_RATE_BPS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tax_rate_bps),
            total_tolerance_cents: trimmed("TOTAL_TOLERANCE_CENTS")
                .and_then(|v| v.parse().ok())
                .filter(|tolerance: &i64| *tolerance >= 0)
                .unwrap_or(defaults.total_tolerance_cents),
            default_country: lookup("DEFAULT_COUNTRY")
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or(defaults.default_country),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Pricing rules handed to the order builder.
    pub fn order_policy(&self) -> OrderPolicy {
        OrderPolicy {
            shipping_fee: Money::from_cents(self.shipping_fee_cents),
            tax_rate_bps: self.tax_rate_bps,
            total_tolerance: Money::from_cents(self.total_tolerance_cents),
            default_country: self.default_country.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            shipping_fee_cents: 500,
            tax_rate_bps: 0,
            total_tolerance_cents: 0,
            default_country: "US".to_string(),
        }
    }
}
