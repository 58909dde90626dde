use async_trait::async_trait;
use common::{OrderId, Page, PageRequest, SortDirection};
use domain::{Order, OrderFilter, OrderSort, OrderStore, SortField, StoreError};
use sqlx::{Postgres, QueryBuilder};

use crate::PostgresStore;
use crate::error::{backend, corrupt, unique_violation};

fn to_document(order: &Order) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(order).map_err(|e| corrupt("cannot encode order", e))
}

fn from_document(document: serde_json::Value) -> Result<Order, StoreError> {
    serde_json::from_value(document).map_err(|e| corrupt("cannot decode order", e))
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "created_at",
        SortField::TotalAmount => "total_amount_cents",
        SortField::Status => "status_rank",
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(owner) = &filter.owner {
        qb.push(" AND owner = ").push_bind(owner.as_str().to_owned());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.created_from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.created_to {
        qb.push(" AND created_at <= ").push_bind(to);
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, owner, status, status_rank, total_amount_cents,
                                created_at, updated_at, version, document)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.order_number().as_str())
        .bind(order.owner().as_str())
        .bind(order.status().as_str())
        .bind(order.status().rank())
        .bind(order.total_amount().cents())
        .bind(order.created_at())
        .bind(order.updated_at())
        .bind(order.version() as i64)
        .bind(to_document(order)?)
        .execute(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some("unique_order_number") => {
                StoreError::DuplicateOrderNumber(order.order_number().to_string())
            }
            Some(_) => StoreError::DuplicateOrder(order.id()),
            None => backend(e),
        })?;

        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let document: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT document FROM orders WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

        document.map(from_document).transpose()
    }

    async fn update(&self, order: &Order, expected_version: u64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, status_rank = $3, total_amount_cents = $4, updated_at = $5,
                version = $6, document = $7
            WHERE id = $1 AND version = $8
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.status().rank())
        .bind(order.total_amount().cents())
        .bind(order.updated_at())
        .bind(order.version() as i64)
        .bind(to_document(order)?)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(order.id().as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match actual {
            Some(actual) => {
                tracing::debug!(order_id = %order.id(), expected_version, actual, "order version conflict");
                Err(StoreError::VersionConflict {
                    order_id: order.id(),
                    expected: expected_version,
                    actual: actual as u64,
                })
            }
            None => Err(StoreError::MissingOrder(order.id())),
        }
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        sort: OrderSort,
        page: PageRequest,
    ) -> Result<Page<Order>, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        let direction = match sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        let mut select = QueryBuilder::<Postgres>::new("SELECT document FROM orders");
        push_filter(&mut select, filter);
        select
            .push(format!(
                " ORDER BY {} {direction}, id {direction}",
                sort_column(sort.field)
            ))
            .push(" LIMIT ")
            .push_bind(i64::from(page.page_size()))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let documents: Vec<serde_json::Value> = select
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let items = documents
            .into_iter()
            .map(from_document)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            pagination: page.paginate(total as u64),
        })
    }
}
