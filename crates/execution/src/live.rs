// In crates/execution/src/live.rs

use crate::{Broker, Result};
use api_client::{ApiClient, OrderSnapshot, OrderTicket};
use async_trait::async_trait;
use core_types::OrderId;

/// A broker that places real orders through the brokerage REST API.
#[derive(Debug, Clone)]
pub struct LiveBroker {
    api_client: ApiClient,
}

impl LiveBroker {
    pub fn new(api_client: ApiClient) -> Self {
        Self { api_client }
    }
}

#[async_trait]
impl Broker for LiveBroker {
    fn name(&self) -> &'static str {
        "LiveBroker"
    }

    async fn place_order(&self, ticket: &OrderTicket) -> Result<OrderId> {
        tracing::info!(?ticket, "Placing live order...");
        Ok(self.api_client.place_order(ticket).await?)
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<OrderSnapshot> {
        Ok(self.api_client.get_order(order_id).await?)
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<bool> {
        tracing::info!(order_id = %order_id, "Cancelling live order...");
        Ok(self.api_client.cancel_order(order_id).await?)
    }
}
