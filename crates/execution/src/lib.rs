// In crates/execution/src/lib.rs

use api_client::{OrderSnapshot, OrderTicket};
use async_trait::async_trait;
use core_types::OrderId;

pub mod error;
pub mod live;
pub mod manager;
pub mod simulated;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use live::LiveBroker;
pub use manager::OrderManager;
pub use simulated::PaperBroker;
pub use types::{OrderOutcome, SellSummary, round_price};

/// The universal interface for an order destination.
///
/// A `Broker` places, inspects, and cancels orders on behalf of the
/// `OrderManager`, which owns the lifecycle logic. It could be the live
/// brokerage or an in-memory paper account.
#[async_trait]
pub trait Broker: Send + Sync {
    /// The name of the broker (e.g., "LiveBroker", "PaperBroker").
    fn name(&self) -> &'static str;

    /// Places an order and returns the id the broker assigned to it.
    async fn place_order(&self, ticket: &OrderTicket) -> Result<OrderId>;

    async fn get_order(&self, order_id: &OrderId) -> Result<OrderSnapshot>;

    /// Returns `Ok(false)` when the broker refused the cancellation.
    async fn cancel_order(&self, order_id: &OrderId) -> Result<bool>;
}
