use async_trait::async_trait;
use domain::{CatalogStore, Money, Product, ProductId, StockDecrement, StoreError};
use sqlx::{Row, postgres::PgRow};

use crate::PostgresStore;
use crate::error::{backend, corrupt, unique_violation};

fn stock_from_db(stock: i64) -> Result<u32, StoreError> {
    u32::try_from(stock).map_err(|e| corrupt("stock out of range", e))
}

fn row_to_product(row: PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::new(row.try_get::<String, _>("id").map_err(backend)?),
        title: row.try_get("title").map_err(backend)?,
        price: Money::from_cents(row.try_get("price_cents").map_err(backend)?),
        stock: stock_from_db(row.try_get("stock").map_err(backend)?)?,
        category: row.try_get("category").map_err(backend)?,
        active: row.try_get("active").map_err(backend)?,
    })
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn insert(&self, product: Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, title, price_cents, stock, category, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.title)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(&product.category)
        .bind(product.active)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if unique_violation(&e).is_some() {
                return StoreError::DuplicateProduct(product.id.clone());
            }
            backend(e)
        })?;

        Ok(())
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, title, price_cents, stock, category, active
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(row_to_product).transpose()
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, price_cents, stock, category, active
            FROM products
            WHERE $1 OR active
            ORDER BY id ASC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn try_decrement(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, StoreError> {
        // The guard and the write are one statement, so concurrent buyers
        // cannot both pass the check.
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        if let Some(remaining) = remaining {
            return Ok(StockDecrement::Applied {
                remaining: stock_from_db(remaining)?,
            });
        }

        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match available {
            Some(available) => Ok(StockDecrement::Insufficient {
                available: stock_from_db(available)?,
            }),
            None => Ok(StockDecrement::NotFound),
        }
    }

    async fn increment(&self, id: &ProductId, quantity: u32) -> Result<u32, StoreError> {
        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = LEAST(stock + $2, 4294967295)
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match stock {
            Some(stock) => stock_from_db(stock),
            None => Err(StoreError::MissingProduct(id.clone())),
        }
    }
}
