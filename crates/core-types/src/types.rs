// In crates/core-types/src/types.rs

use crate::StrategyId;
use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tradable ticker, always stored upper-cased (e.g., "SPY").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Symbol(raw.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One raw one-minute OHLCV observation as delivered by the stream.
///
/// Immutable once observed; `timestamp` is the start of the minute in UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: Symbol,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Bar {
    /// Minutes since UTC midnight. Modulo any timeframe that divides an hour
    /// this matches the exchange-local minute, since the exchange's offset
    /// from UTC is a whole number of hours.
    pub fn minute_of_day(&self) -> u32 {
        self.timestamp.hour() * 60 + self.timestamp.minute()
    }
}

/// A boundary-aligned N-minute bar built from a full bucket of raw bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedBar {
    pub symbol: Symbol,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub bucket_start: DateTime<Utc>,
}

/// An order-side instruction understood by the brokerage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    Buy,
    Sell,
}

impl Instruction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Instruction::Buy => "BUY",
            Instruction::Sell => "SELL",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The instruction carried by a strategy signal. `None` means "do nothing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignalInstruction {
    Buy,
    Sell,
    #[default]
    None,
}

impl SignalInstruction {
    /// The order instruction this signal asks for, if any.
    pub fn order_instruction(&self) -> Option<Instruction> {
        match self {
            SignalInstruction::Buy => Some(Instruction::Buy),
            SignalInstruction::Sell => Some(Instruction::Sell),
            SignalInstruction::None => None,
        }
    }
}

impl From<Option<Instruction>> for SignalInstruction {
    fn from(value: Option<Instruction>) -> Self {
        match value {
            Some(Instruction::Buy) => SignalInstruction::Buy,
            Some(Instruction::Sell) => SignalInstruction::Sell,
            None => SignalInstruction::None,
        }
    }
}

/// The ephemeral result of one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub instruction: SignalInstruction,
    pub quantity: Decimal,
    /// Zero designates a market order.
    pub price: Decimal,
}

impl Signal {
    pub fn none() -> Self {
        Self {
            instruction: SignalInstruction::None,
            quantity: Decimal::ZERO,
            price: Decimal::ZERO,
        }
    }
}

/// A brokerage-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tracked, not-yet-closed brokerage order belonging to a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivePosition {
    pub strategy_id: StrategyId,
    pub order_id: OrderId,
    pub quantity: Decimal,
    pub entry_price: Decimal,
}
