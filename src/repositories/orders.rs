use async_trait::async_trait;
use sqlx::PgPool;

use super::OrderStore;
use crate::models::orders::{NewOrder, Order, OrderItem, OrderKind};

// Runtime-checked queries: building the crate needs no DATABASE_URL.
const ORDER_COLUMNS: &str = r#"
    id,
    username,
    stars,
    amount_ton,
    amount_usd,
    COALESCE(type, 'stars') AS type,
    premium_months,
    created_at,
    COALESCE(completed, false) AS completed
"#;

#[derive(Clone)]
pub struct OrderRepository {
    conn: PgPool,
}

impl OrderRepository {
    pub fn new(conn: PgPool) -> Self {
        OrderRepository { conn }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, anyhow::Error> {
        let (stars, months) = match order.item {
            OrderItem::Stars { quantity } => (Some(quantity), None),
            OrderItem::Premium { months } => (None, Some(months)),
        };

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders
            (username, stars, amount_ton, amount_usd, type, premium_months, created_at, completed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, false)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&order.username)
        .bind(stars)
        .bind(&order.amount_ton)
        .bind(&order.amount_usd)
        .bind(order.item.kind().as_str())
        .bind(months)
        .bind(order.created_at.naive_utc())
        .fetch_one(&self.conn)
        .await?;

        Ok(order)
    }

    async fn list_orders(&self, kind: Option<OrderKind>) -> Result<Vec<Order>, anyhow::Error> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE $1::TEXT IS NULL OR type = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(&self.conn)
        .await?;

        Ok(orders)
    }

    async fn complete_order(&self, order_id: i32) -> Result<bool, anyhow::Error> {
        let result = sqlx::query("UPDATE orders SET completed = true WHERE id = $1")
            .bind(order_id)
            .execute(&self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
