// In crates/database/src/strategy_configs.rs

use crate::{Error, Result, SqliteStore, close};
use core_types::{OrderType, StrategyConfig, StrategyId, Symbol};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

impl SqliteStore {
    /// Loads every active strategy configuration.
    ///
    /// All rows are checked before returning; if any is invalid, every
    /// invalid row is reported in a single `InvalidStrategies` error.
    pub async fn load_active_strategies(&self) -> Result<Vec<StrategyConfig>> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, name, symbol, time_frame, lookback_days, extended_hours, order_type
            FROM day_trading_strategies
            WHERE active = 1
            ORDER BY id
            "#,
        )
        .fetch_all(&mut conn)
        .await
        .map_err(Error::OperationFailed);
        close(conn).await;

        let mut configs = Vec::new();
        let mut problems = Vec::new();
        for row in rows? {
            match decode_strategy(&row) {
                Ok(config) => configs.push(config),
                Err(problem) => problems.push(problem),
            }
        }

        if !problems.is_empty() {
            return Err(Error::InvalidStrategies(problems));
        }
        tracing::info!(count = configs.len(), "Loaded active strategies.");
        Ok(configs)
    }

    /// Inserts or replaces a strategy configuration row.
    pub async fn upsert_strategy(&self, config: &StrategyConfig, active: bool) -> Result<()> {
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(
            r#"
            INSERT OR REPLACE INTO day_trading_strategies
                (id, name, symbol, time_frame, lookback_days, extended_hours, order_type, active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(config.id.0)
        .bind(&config.name)
        .bind(config.symbol.as_str())
        .bind(i64::from(config.timeframe_minutes))
        .bind(i64::from(config.lookback_days))
        .bind(config.extended_hours)
        .bind(config.order_type.to_string())
        .bind(active)
        .execute(&mut conn)
        .await
        .map_err(Error::OperationFailed);
        close(conn).await;

        outcome?;
        Ok(())
    }
}

/// Turns one row into a validated config, or a message naming the row.
fn decode_strategy(row: &SqliteRow) -> std::result::Result<StrategyConfig, String> {
    let id: i64 = row.try_get("id").map_err(|e| format!("unreadable strategy row: {}", e))?;
    let fail = |what: String| format!("strategy {}: {}", id, what);

    let name: String = row.try_get("name").map_err(|e| fail(e.to_string()))?;
    let symbol: String = row.try_get("symbol").map_err(|e| fail(e.to_string()))?;
    let time_frame: i64 = row.try_get("time_frame").map_err(|e| fail(e.to_string()))?;
    let lookback_days: i64 = row.try_get("lookback_days").map_err(|e| fail(e.to_string()))?;
    let extended_hours: bool = row.try_get("extended_hours").map_err(|e| fail(e.to_string()))?;
    let order_type: String = row.try_get("order_type").map_err(|e| fail(e.to_string()))?;

    let timeframe_minutes = u32::try_from(time_frame)
        .map_err(|_| fail(format!("time_frame {} is out of range", time_frame)))?;
    let lookback_days = u32::try_from(lookback_days)
        .map_err(|_| fail(format!("lookback_days {} is out of range", lookback_days)))?;
    let order_type: OrderType = order_type.parse().map_err(|e: core_types::Error| fail(e.to_string()))?;

    let config = StrategyConfig {
        id: StrategyId(id),
        name: name.trim().to_string(),
        symbol: Symbol::new(symbol),
        timeframe_minutes,
        lookback_days,
        extended_hours,
        order_type,
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}
