// In crates/execution/src/simulated.rs

use crate::{Broker, Result};
use api_client::{OrderSnapshot, OrderTicket};
use async_trait::async_trait;
use core_types::OrderId;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// A paper account that fills every order immediately and in full.
///
/// Used when live trading is disabled: the whole lifecycle runs, but no
/// order ever reaches the brokerage.
#[derive(Debug, Default)]
pub struct PaperBroker {
    state: Mutex<PaperState>,
}

#[derive(Debug, Default)]
struct PaperState {
    next_id: u64,
    orders: HashMap<OrderId, PaperOrder>,
}

#[derive(Debug)]
struct PaperOrder {
    ticket: OrderTicket,
    status: &'static str,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of orders placed so far.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl Broker for PaperBroker {
    fn name(&self) -> &'static str {
        "PaperBroker"
    }

    async fn place_order(&self, ticket: &OrderTicket) -> Result<OrderId> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let order_id = OrderId(format!("paper-{}", state.next_id));
        state.orders.insert(
            order_id.clone(),
            PaperOrder {
                ticket: ticket.clone(),
                status: "FILLED",
            },
        );

        tracing::info!(
            order_id = %order_id,
            symbol = %ticket.symbol,
            instruction = %ticket.instruction,
            quantity = %ticket.quantity,
            price = %ticket.price,
            "Paper order filled."
        );
        Ok(order_id)
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<OrderSnapshot> {
        let state = self.state.lock().await;
        let order = state.orders.get(order_id).ok_or_else(|| api_client::Error::ApiError {
            status: 404,
            msg: format!("unknown paper order {}", order_id),
        })?;
        Ok(OrderSnapshot {
            status: order.status.to_string(),
            filled_quantity: if order.status == "FILLED" {
                order.ticket.quantity
            } else {
                Default::default()
            },
        })
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.orders.get_mut(order_id) {
            Some(order) => {
                order.status = "CANCELED";
                tracing::info!(order_id = %order_id, "Paper order cancelled.");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
