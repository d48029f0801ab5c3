// In crates/database/src/positions.rs

use crate::{Error, Result, SqliteStore, close};
use async_trait::async_trait;
use core_types::{ActivePosition, OrderId, StrategyId};
use rust_decimal::Decimal;
use sqlx::Row;
use std::str::FromStr;

/// The persistent record of every strategy's open orders.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Records one accepted BUY order.
    async fn insert_active_position(&self, position: &ActivePosition) -> Result<()>;

    /// Every tracked order id for `strategy_id`, oldest first.
    async fn list_order_ids(&self, strategy_id: StrategyId) -> Result<Vec<OrderId>>;

    /// Removes every row for `strategy_id`, returning how many were removed.
    async fn delete_active_positions(&self, strategy_id: StrategyId) -> Result<u64>;
}

#[async_trait]
impl PositionStore for SqliteStore {
    async fn insert_active_position(&self, position: &ActivePosition) -> Result<()> {
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(
            r#"
            INSERT INTO active_positions (strategy_id, order_id, quantity, entry_price)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(position.strategy_id.0)
        .bind(&position.order_id.0)
        .bind(position.quantity.to_string())
        .bind(position.entry_price.to_string())
        .execute(&mut conn)
        .await
        .map_err(Error::OperationFailed);
        close(conn).await;

        outcome?;
        tracing::debug!(
            strategy_id = %position.strategy_id,
            order_id = %position.order_id,
            "Active position recorded."
        );
        Ok(())
    }

    async fn list_order_ids(&self, strategy_id: StrategyId) -> Result<Vec<OrderId>> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query(
            "SELECT order_id FROM active_positions WHERE strategy_id = ?1 ORDER BY rowid",
        )
        .bind(strategy_id.0)
        .fetch_all(&mut conn)
        .await
        .map_err(Error::OperationFailed);
        close(conn).await;

        rows?
            .iter()
            .map(|row| {
                row.try_get::<String, _>("order_id")
                    .map(OrderId)
                    .map_err(Error::OperationFailed)
            })
            .collect()
    }

    async fn delete_active_positions(&self, strategy_id: StrategyId) -> Result<u64> {
        let mut conn = self.connect().await?;
        let outcome = sqlx::query("DELETE FROM active_positions WHERE strategy_id = ?1")
            .bind(strategy_id.0)
            .execute(&mut conn)
            .await
            .map_err(Error::OperationFailed);
        close(conn).await;

        Ok(outcome?.rows_affected())
    }
}

impl SqliteStore {
    /// Every tracked position for `strategy_id`, with quantities and prices.
    pub async fn list_active_positions(&self, strategy_id: StrategyId) -> Result<Vec<ActivePosition>> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query(
            r#"
            SELECT strategy_id, order_id, quantity, entry_price
            FROM active_positions
            WHERE strategy_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(strategy_id.0)
        .fetch_all(&mut conn)
        .await
        .map_err(Error::OperationFailed);
        close(conn).await;

        rows?
            .iter()
            .map(|row| {
                let quantity: String = row.try_get("quantity").map_err(Error::OperationFailed)?;
                let entry_price: String =
                    row.try_get("entry_price").map_err(Error::OperationFailed)?;
                Ok(ActivePosition {
                    strategy_id: StrategyId(row.try_get("strategy_id").map_err(Error::OperationFailed)?),
                    order_id: OrderId(row.try_get("order_id").map_err(Error::OperationFailed)?),
                    quantity: parse_decimal("quantity", &quantity)?,
                    entry_price: parse_decimal("entry_price", &entry_price)?,
                })
            })
            .collect()
    }
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| Error::Corrupt(format!("{} '{}': {}", column, raw, e)))
}
