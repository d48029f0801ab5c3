// In crates/execution/src/types.rs

use core_types::OrderId;
use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds an outbound order price to the brokerage's tick size.
///
/// Prices below 1.0 keep 4 decimal places, all others 2. Zero stays zero,
/// which marks a market order.
pub fn round_price(price: Decimal) -> Decimal {
    let places = if price < Decimal::ONE { 4 } else { 2 };
    price.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// What a SELL cycle did with each tracked order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SellSummary {
    /// New SELL orders placed for filled entries.
    pub sold: Vec<OrderId>,
    /// Unfilled entries that were cancelled (or whose cancellation was attempted).
    pub cancelled: Vec<OrderId>,
    /// Entries whose status or follow-up call failed.
    pub failed: Vec<OrderId>,
    /// Rows removed from the position store.
    pub cleared: u64,
}

/// The result of acting on one signal.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Bought(OrderId),
    Sold(SellSummary),
}
