// In crates/strategies/src/sma_cross.rs

use crate::types::SmaCrossSettings;
use crate::{EvaluatedBar, Strategy};
use anyhow::{Context, anyhow, bail};
use core_types::{AggregatedBar, Instruction};
use num_traits::cast::ToPrimitive;
use rust_decimal::Decimal;
use ta::Next;
use ta::indicators::SimpleMovingAverage as Sma;

/// Close-price / simple-moving-average crossover.
///
/// BUY when the close crosses above its SMA, SELL when it crosses below.
/// Each signal sizes the order as `position_size / close`.
#[derive(Debug, Clone)]
pub struct SmaCross {
    settings: SmaCrossSettings,
}

impl SmaCross {
    pub fn new(settings: SmaCrossSettings) -> Self {
        Self { settings }
    }
}

impl Strategy for SmaCross {
    fn name(&self) -> &'static str {
        "sma_cross"
    }

    fn evaluate(&self, series: &[AggregatedBar]) -> anyhow::Result<Vec<EvaluatedBar>> {
        let length = self.settings.length as usize;
        let mut sma = Sma::new(length).map_err(|e| anyhow!("invalid SMA length {}: {:?}", length, e))?;
        let position_size = Decimal::try_from(self.settings.position_size)
            .context("position_size is not representable")?;

        let mut rows = Vec::with_capacity(series.len());
        // (close, sma) of the previous row once the average is warmed up.
        let mut previous: Option<(f64, f64)> = None;

        for (i, bar) in series.iter().enumerate() {
            let close = bar
                .close
                .to_f64()
                .context("close price does not fit in f64")?;
            let average = sma.next(close);
            let mut row = EvaluatedBar::quiet(bar);

            // The average is undefined until `length` closes have been seen.
            if i + 1 < length {
                rows.push(row);
                continue;
            }

            if let Some((prev_close, prev_average)) = previous {
                let signal = if prev_close < prev_average && close > average {
                    Some(Instruction::Buy)
                } else if prev_close > prev_average && close < average {
                    Some(Instruction::Sell)
                } else {
                    None
                };

                if signal.is_some() {
                    if bar.close <= Decimal::ZERO {
                        bail!("non-positive close {} at {}", bar.close, bar.bucket_start);
                    }
                    row.signal = signal;
                    row.quantity = (position_size / bar.close).round_dp(4);
                }
            }

            previous = Some((close, average));
            rows.push(row);
        }

        Ok(rows)
    }
}
