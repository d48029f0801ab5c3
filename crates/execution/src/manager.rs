// In crates/execution/src/manager.rs

use crate::types::{OrderOutcome, SellSummary, round_price};
use crate::{Broker, Error, Result};
use api_client::{OrderSnapshot, OrderTicket};
use core_types::{ActivePosition, Instruction, OrderId, Signal, StrategyConfig, StrategyId, Symbol};
use database::PositionStore;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Turns signals into broker orders and keeps the position store in step.
///
/// Every broker call is bounded by `call_timeout`; a timeout counts as a
/// failure of that call and is never retried here.
pub struct OrderManager {
    broker: Arc<dyn Broker>,
    store: Arc<dyn PositionStore>,
    call_timeout: Duration,
    sell_expiry_minutes: u32,
}

impl OrderManager {
    pub fn new(
        broker: Arc<dyn Broker>,
        store: Arc<dyn PositionStore>,
        call_timeout: Duration,
        sell_expiry_minutes: u32,
    ) -> Self {
        Self {
            broker,
            store,
            call_timeout,
            sell_expiry_minutes,
        }
    }

    pub fn broker_name(&self) -> &'static str {
        self.broker.name()
    }

    /// Acts on a strategy's signal.
    ///
    /// BUY orders expire after the strategy's timeframe. The signal price is
    /// rounded before use; zero means a market order.
    pub async fn execute(&self, config: &StrategyConfig, signal: &Signal) -> Result<OrderOutcome> {
        let instruction = signal
            .instruction
            .order_instruction()
            .ok_or_else(|| Error::InvalidInstruction("NONE".to_string()))?;
        validate(&config.symbol, signal.quantity)?;
        let price = signal.price;

        match instruction {
            Instruction::Buy => {
                let order_id = self
                    .buy(config.id, &config.symbol, signal.quantity, price, config.timeframe_minutes)
                    .await?;
                Ok(OrderOutcome::Bought(order_id))
            }
            Instruction::Sell => {
                let summary = self.sell(config.id, &config.symbol, price).await?;
                Ok(OrderOutcome::Sold(summary))
            }
        }
    }

    /// Places a BUY and records it as an active position.
    ///
    /// Nothing is recorded when placement fails.
    pub async fn buy(
        &self,
        strategy_id: StrategyId,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
        expiry_minutes: u32,
    ) -> Result<OrderId> {
        validate(symbol, quantity)?;
        let ticket = OrderTicket {
            symbol: symbol.clone(),
            quantity,
            price: round_price(price),
            expiry_minutes,
            instruction: Instruction::Buy,
        };

        let order_id = match self.place(&ticket).await {
            Ok(order_id) => order_id,
            Err(e) => {
                tracing::error!(strategy_id = %strategy_id, symbol = %symbol, error = %e, "BUY placement failed.");
                return Err(e);
            }
        };

        let position = ActivePosition {
            strategy_id,
            order_id: order_id.clone(),
            quantity,
            entry_price: ticket.price,
        };
        if let Err(e) = self.store.insert_active_position(&position).await {
            tracing::error!(
                strategy_id = %strategy_id,
                order_id = %order_id,
                error = %e,
                "BUY placed but the position could not be recorded."
            );
            return Err(e.into());
        }

        tracing::info!(strategy_id = %strategy_id, order_id = %order_id, "BUY recorded as active position.");
        Ok(order_id)
    }

    /// Closes out every tracked order for the strategy.
    ///
    /// Filled entries are sold at `price` with the one-day expiry; anything
    /// else is cancelled. Whatever happens to individual orders, all of the
    /// strategy's rows are deleted at the end.
    pub async fn sell(&self, strategy_id: StrategyId, symbol: &Symbol, price: Decimal) -> Result<SellSummary> {
        if symbol.as_str().is_empty() {
            return Err(Error::InvalidOrderRequest("symbol is required".to_string()));
        }
        let price = round_price(price);
        let mut summary = SellSummary::default();

        let order_ids = match self.store.list_order_ids(strategy_id).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(strategy_id = %strategy_id, error = %e, "Could not list active positions.");
                Vec::new()
            }
        };

        for order_id in order_ids {
            let snapshot = match self.lookup(&order_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(strategy_id = %strategy_id, order_id = %order_id, error = %e, "Order lookup failed, skipping.");
                    summary.failed.push(order_id);
                    continue;
                }
            };

            if snapshot.is_filled() && snapshot.filled_quantity > Decimal::ZERO {
                let ticket = OrderTicket {
                    symbol: symbol.clone(),
                    quantity: snapshot.filled_quantity,
                    price,
                    expiry_minutes: self.sell_expiry_minutes,
                    instruction: Instruction::Sell,
                };
                match self.place(&ticket).await {
                    Ok(sell_id) => {
                        tracing::info!(
                            strategy_id = %strategy_id,
                            entry_order_id = %order_id,
                            order_id = %sell_id,
                            quantity = %snapshot.filled_quantity,
                            "SELL placed for filled entry."
                        );
                        summary.sold.push(sell_id);
                    }
                    Err(e) => {
                        tracing::error!(strategy_id = %strategy_id, order_id = %order_id, error = %e, "SELL placement failed.");
                        summary.failed.push(order_id);
                    }
                }
            } else {
                match self.cancel(&order_id).await {
                    Ok(accepted) => {
                        tracing::info!(
                            strategy_id = %strategy_id,
                            order_id = %order_id,
                            status = %snapshot.status,
                            accepted,
                            "Unfilled entry cancelled."
                        );
                        summary.cancelled.push(order_id);
                    }
                    Err(e) => {
                        tracing::error!(strategy_id = %strategy_id, order_id = %order_id, error = %e, "Cancellation failed.");
                        summary.failed.push(order_id);
                    }
                }
            }
        }

        summary.cleared = self.store.delete_active_positions(strategy_id).await?;
        tracing::info!(strategy_id = %strategy_id, cleared = summary.cleared, "Active positions cleared.");
        Ok(summary)
    }

    async fn place(&self, ticket: &OrderTicket) -> Result<OrderId> {
        self.bounded("place_order", self.broker.place_order(ticket)).await
    }

    async fn lookup(&self, order_id: &OrderId) -> Result<OrderSnapshot> {
        self.bounded("get_order", self.broker.get_order(order_id)).await
    }

    async fn cancel(&self, order_id: &OrderId) -> Result<bool> {
        self.bounded("cancel_order", self.broker.cancel_order(order_id)).await
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| Error::Timeout { operation })?
    }
}

fn validate(symbol: &Symbol, quantity: Decimal) -> Result<()> {
    if symbol.as_str().is_empty() {
        return Err(Error::InvalidOrderRequest("symbol is required".to_string()));
    }
    if quantity <= Decimal::ZERO {
        return Err(Error::InvalidOrderRequest(format!("quantity must be positive, got {}", quantity)));
    }
    Ok(())
}
