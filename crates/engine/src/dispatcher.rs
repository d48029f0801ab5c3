// In crates/engine/src/dispatcher.rs

use core_types::{AggregatedBar, OrderType, Signal, SignalInstruction, StrategyConfig};
use rust_decimal::Decimal;
use std::panic::{AssertUnwindSafe, catch_unwind};
use strategies::{EvaluatedBar, StrategyRegistry};

/// Runs a strategy over its aggregated series and reads the verdict on the
/// latest bar.
///
/// A failing or panicking strategy is logged and treated as no signal; it
/// never takes the supervisor down.
pub struct SignalDispatcher {
    registry: StrategyRegistry,
}

impl SignalDispatcher {
    pub fn new(registry: StrategyRegistry) -> Self {
        Self { registry }
    }

    pub fn dispatch(&self, config: &StrategyConfig, series: &[AggregatedBar]) -> Signal {
        if series.is_empty() {
            return Signal::none();
        }

        let last = match self.evaluate_last(config, series) {
            Ok(Some(row)) => row,
            Ok(None) => return Signal::none(),
            Err(e) => {
                tracing::error!(
                    strategy_id = %config.id,
                    name = %config.name,
                    error = %e,
                    "Strategy evaluation failed; no signal this cycle."
                );
                return Signal::none();
            }
        };

        let instruction = SignalInstruction::from(last.signal);
        if instruction == SignalInstruction::None {
            return Signal::none();
        }

        let price = match config.order_type {
            OrderType::Market => Decimal::ZERO,
            OrderType::Limit => last.bar.close,
        };
        Signal {
            instruction,
            quantity: last.quantity,
            price,
        }
    }

    fn evaluate_last(
        &self,
        config: &StrategyConfig,
        series: &[AggregatedBar],
    ) -> strategies::Result<Option<EvaluatedBar>> {
        let strategy = self
            .registry
            .get(&config.name)
            .ok_or_else(|| strategies::Error::UnknownStrategy(config.name.clone()))?;

        let evaluation = catch_unwind(AssertUnwindSafe(|| strategy.evaluate(series)));
        let rows = match evaluation {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => {
                return Err(strategies::Error::Evaluation {
                    name: config.name.clone(),
                    reason: format!("{:#}", e),
                });
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic".to_string());
                return Err(strategies::Error::Evaluation {
                    name: config.name.clone(),
                    reason: format!("panicked: {}", reason),
                });
            }
        };

        Ok(rows.into_iter().last())
    }
}
