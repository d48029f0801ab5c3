// In crates/strategies/src/lib.rs

use core_types::{AggregatedBar, Instruction};
use rust_decimal::Decimal;

pub mod error;
pub mod factory;
pub mod registry;
pub mod rsi_reversion;
pub mod sma_cross;
pub mod types;

pub use error::{Error, Result};
pub use registry::StrategyRegistry;

/// One row of an evaluated series: the input bar plus the strategy's verdict for it.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedBar {
    pub bar: AggregatedBar,
    /// `None` means no signal on this row.
    pub signal: Option<Instruction>,
    pub quantity: Decimal,
}

impl EvaluatedBar {
    pub fn quiet(bar: &AggregatedBar) -> Self {
        Self {
            bar: bar.clone(),
            signal: None,
            quantity: Decimal::ZERO,
        }
    }
}

/// The universal interface for a trading-signal function.
///
/// A strategy is a pure function over an aggregated bar series: it returns the
/// same series, row for row, augmented with a signal and a quantity. Only the
/// last row is acted upon by the engine.
pub trait Strategy: Send + Sync {
    /// The name of the strategy.
    fn name(&self) -> &'static str;

    fn evaluate(&self, series: &[AggregatedBar]) -> anyhow::Result<Vec<EvaluatedBar>>;
}
