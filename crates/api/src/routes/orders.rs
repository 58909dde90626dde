//! Order endpoints: placement, status updates, cancellation and queries.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use chrono::{DateTime, NaiveDate, Utc};
use common::{DEFAULT_PAGE_SIZE, OrderId, Page, PageRequest, SortDirection, UserId};
use domain::{
    CatalogStore, LineRequest, Money, Order, OrderError, OrderFilter, OrderSort, OrderStatus,
    OrderStore, PaymentMethod, PlaceOrder, ShippingAddress, SortField, StatusUpdate,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::Caller;
use crate::response::Reply;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub shipping_address: ShippingAddressRequest,
    pub payment_method: Option<PaymentMethod>,
    /// The client's idea of the total, in cents. Cross-checked only.
    #[serde(alias = "totalPriceCents")]
    pub total_price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    #[serde(alias = "productId")]
    pub product: String,
    pub quantity: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShippingAddressRequest {
    pub name: String,
    pub phone: String,
    #[serde(alias = "address")]
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    #[serde(alias = "zipCode")]
    pub zip: Option<String>,
    pub country: Option<String>,
}

impl From<ShippingAddressRequest> for ShippingAddress {
    fn from(req: ShippingAddressRequest) -> Self {
        ShippingAddress {
            name: req.name,
            phone: req.phone,
            street: req.street,
            city: req.city,
            state: req.state,
            zip: req.zip,
            country: req.country.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub tracking_number: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    pub note: Option<String>,
}

/// Query string shared by the listing endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub user_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates. A plain end date
/// covers the whole day.
fn parse_date(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| OrderError::Validation(format!("invalid date: {value}")))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .ok_or_else(|| OrderError::Validation(format!("invalid date: {value}")).into())
}

impl ListOrdersQuery {
    fn page_request(&self) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }

    fn sort(&self) -> Result<OrderSort, ApiError> {
        let field = match present(&self.sort_by) {
            Some(field) => field.parse::<SortField>().map_err(OrderError::Validation)?,
            None => SortField::default(),
        };
        let direction = match present(&self.order) {
            Some(direction) => direction
                .parse::<SortDirection>()
                .map_err(OrderError::Validation)?,
            None => SortDirection::default(),
        };
        Ok(OrderSort::new(field, direction))
    }

    fn filter(&self) -> Result<OrderFilter, ApiError> {
        let mut filter = OrderFilter::new();
        if let Some(status) = present(&self.status) {
            filter = filter.status(status.parse().map_err(OrderError::Validation)?);
        }
        if let Some(user_id) = present(&self.user_id) {
            filter = filter.owner(UserId::new(user_id));
        }
        if let Some(start) = present(&self.start_date) {
            filter = filter.created_from(parse_date(start, false)?);
        }
        if let Some(end) = present(&self.end_date) {
            filter = filter.created_to(parse_date(end, true)?);
        }
        Ok(filter)
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    /// Absent only for lines whose total does not fit, which pricing rejects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_total_cents: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeResponse {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub user: String,
    pub items: Vec<OrderItemResponse>,
    pub subtotal_cents: i64,
    pub shipping_fee_cents: i64,
    pub tax_cents: i64,
    pub total_amount_cents: i64,
    /// Same value as `totalAmountCents`, kept for older clients.
    pub total_price_cents: i64,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub tracking_number: Option<String>,
    pub status_history: Vec<StatusChangeResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            order_number: order.order_number().to_string(),
            user: order.owner().to_string(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product: item.product_id.to_string(),
                    title: item.title.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    line_total_cents: item.line_total().map(|total| total.cents()),
                })
                .collect(),
            subtotal_cents: order.subtotal().cents(),
            shipping_fee_cents: order.shipping_fee().cents(),
            tax_cents: order.tax().cents(),
            total_amount_cents: order.total_amount().cents(),
            total_price_cents: order.total_amount().cents(),
            payment_method: order.payment_method(),
            status: order.status(),
            shipping_address: order.shipping_address().clone(),
            tracking_number: order.tracking_number().map(String::from),
            status_history: order
                .history()
                .iter()
                .map(|change| StatusChangeResponse {
                    status: change.status,
                    timestamp: change.at,
                    actor: change.actor.to_string(),
                    note: change.note.clone(),
                })
                .collect(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            version: order.version(),
        }
    }
}

fn page_response(page: Page<Order>) -> Page<OrderResponse> {
    page.map(|order| OrderResponse::from(&order))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))
}

// -- Handlers --

/// POST /orders
#[tracing::instrument(skip_all)]
pub async fn create<C, O>(
    State(state): State<Arc<AppState<C, O>>>,
    Caller(caller): Caller,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Reply<OrderResponse>, ApiError>
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    let Json(req) = payload?;

    let items = req
        .items
        .into_iter()
        .map(|item| {
            // Out-of-range quantities become 0 and fail domain validation.
            let quantity = u32::try_from(item.quantity).unwrap_or(0);
            LineRequest::new(item.product, quantity)
        })
        .collect();

    let mut cmd = PlaceOrder::new(caller.user_id, items, req.shipping_address.into());
    if let Some(method) = req.payment_method {
        cmd = cmd.payment_method(method);
    }
    if let Some(total) = req.total_price {
        cmd = cmd.client_total(Money::from_cents(total));
    }

    let order = state.orders.create_order(cmd).await?;
    Ok(Reply::created(
        "Order created successfully",
        OrderResponse::from(&order),
    ))
}

/// GET /orders/my
#[tracing::instrument(skip_all)]
pub async fn list_mine<C, O>(
    State(state): State<Arc<AppState<C, O>>>,
    Caller(caller): Caller,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Reply<Page<OrderResponse>>, ApiError>
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    let Query(query) = query?;
    let page = state
        .orders
        .list_my_orders(
            query.filter()?,
            query.sort()?,
            query.page_request(),
            &caller,
        )
        .await?;
    Ok(Reply::ok("Orders retrieved successfully", page_response(page)))
}

/// GET /orders
#[tracing::instrument(skip_all)]
pub async fn list<C, O>(
    State(state): State<Arc<AppState<C, O>>>,
    Caller(caller): Caller,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Reply<Page<OrderResponse>>, ApiError>
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    let Query(query) = query?;
    let page = state
        .orders
        .list_orders(
            query.filter()?,
            query.sort()?,
            query.page_request(),
            &caller,
        )
        .await?;
    Ok(Reply::ok("Orders retrieved successfully", page_response(page)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn get<C, O>(
    State(state): State<Arc<AppState<C, O>>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Reply<OrderResponse>, ApiError>
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    let order = state
        .orders
        .get_order(parse_order_id(&id)?, &caller)
        .await?;
    Ok(Reply::ok(
        "Order retrieved successfully",
        OrderResponse::from(&order),
    ))
}

/// PUT /orders/{id}
///
/// With a `status` this is a transition (the tracking number and note ride
/// along); with only a `trackingNumber` it just records the tracking number.
#[tracing::instrument(skip(state, caller, payload))]
pub async fn update<C, O>(
    State(state): State<Arc<AppState<C, O>>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    payload: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> Result<Reply<OrderResponse>, ApiError>
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;
    let Json(req) = payload?;

    let order = match (present(&req.status), req.tracking_number) {
        (Some(status), tracking_number) => {
            let status: OrderStatus = status.parse().map_err(OrderError::Validation)?;
            let update = StatusUpdate {
                status,
                note: req.note,
                tracking_number,
            };
            state
                .orders
                .update_status(order_id, update, &caller)
                .await?
        }
        (None, Some(tracking_number)) => {
            state
                .orders
                .set_tracking_number(order_id, tracking_number, &caller)
                .await?
        }
        (None, None) => {
            return Err(
                OrderError::Validation("provide a status or a tracking number".into()).into(),
            );
        }
    };

    Ok(Reply::ok(
        "Order updated successfully",
        OrderResponse::from(&order),
    ))
}

/// Reads the optional cancel body. Empty or whitespace-only bodies carry no note.
fn cancel_note(body: &[u8]) -> Result<Option<String>, ApiError> {
    if body.trim_ascii().is_empty() {
        return Ok(None);
    }
    let req: CancelOrderRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid cancel body: {e}")))?;
    Ok(req.note)
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state, caller, body))]
pub async fn cancel<C, O>(
    State(state): State<Arc<AppState<C, O>>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Reply<OrderResponse>, ApiError>
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;
    let note = cancel_note(&body)?;

    let order = state.orders.cancel_order(order_id, note, &caller).await?;
    Ok(Reply::ok(
        "Order cancelled successfully",
        OrderResponse::from(&order),
    ))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn address_accepts_legacy_field_names() {
        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [{ "product": "p1", "quantity": 2 }],
            "shippingAddress": {
                "name": "Ann",
                "phone": "555",
                "address": "1 Main St",
                "city": "Springfield",
                "zipCode": "12345"
            },
            "paymentMethod": "card",
            "totalPrice": 2500
        }))
        .unwrap();

        let address = ShippingAddress::from(req.shipping_address);
        assert_eq!(address.street, "1 Main St");
        assert_eq!(address.zip.as_deref(), Some("12345"));
        assert_eq!(address.country, "");
        assert_eq!(req.payment_method, Some(PaymentMethod::Card));
        assert_eq!(req.total_price, Some(2500));
    }

    #[test]
    fn plain_end_date_covers_the_day() {
        let start = parse_date("2025-03-01", false).unwrap();
        let end = parse_date("2025-03-01", true).unwrap();
        assert_eq!(start.hour(), 0);
        assert_eq!(end.hour(), 23);
        assert_eq!(end.day(), 1);

        let exact = parse_date("2025-03-01T10:30:00+02:00", true).unwrap();
        assert_eq!(exact.hour(), 8);

        assert!(parse_date("yesterday", false).is_err());
    }

    #[test]
    fn query_builds_filter_and_sort() {
        let query = ListOrdersQuery {
            page: Some(0),
            limit: Some(500),
            status: Some("Shipped".into()),
            sort_by: Some("totalPrice".into()),
            order: Some("asc".into()),
            user_id: Some(" ".into()),
            ..ListOrdersQuery::default()
        };

        let page = query.page_request();
        assert_eq!(page.page(), 1);
        assert_eq!(page.page_size(), 100);

        let filter = query.filter().unwrap();
        assert_eq!(filter.status, Some(OrderStatus::Shipped));
        assert!(filter.owner.is_none());

        let sort = query.sort().unwrap();
        assert_eq!(sort.field, SortField::TotalAmount);
        assert_eq!(sort.direction, SortDirection::Asc);
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        let query = ListOrdersQuery {
            status: Some("lost".into()),
            ..ListOrdersQuery::default()
        };
        assert!(matches!(
            query.filter(),
            Err(ApiError::Order(OrderError::Validation(_)))
        ));
    }

    #[test]
    fn cancel_body_is_optional() {
        assert_eq!(cancel_note(b"").unwrap(), None);
        assert_eq!(cancel_note(b"  \n").unwrap(), None);
        assert_eq!(cancel_note(b"{}").unwrap(), None);
        assert_eq!(
            cancel_note(br#"{"note":"duplicate"}"#).unwrap().as_deref(),
            Some("duplicate")
        );
        assert!(matches!(cancel_note(b"{"), Err(ApiError::BadRequest(_))));
    }
}
