// In crates/strategies/src/rsi_reversion.rs

use crate::types::RsiReversionSettings;
use crate::{EvaluatedBar, Strategy};
use anyhow::{Context, anyhow, bail};
use core_types::{AggregatedBar, Instruction};
use num_traits::cast::ToPrimitive;
use rust_decimal::Decimal;
use ta::Next;
use ta::indicators::RelativeStrengthIndex as Rsi;

/// RSI mean reversion: BUY when RSI climbs back out of the oversold band,
/// SELL when it pushes into the overbought band.
#[derive(Debug, Clone)]
pub struct RsiReversion {
    settings: RsiReversionSettings,
}

impl RsiReversion {
    pub fn new(settings: RsiReversionSettings) -> Self {
        Self { settings }
    }
}

impl Strategy for RsiReversion {
    fn name(&self) -> &'static str {
        "rsi_reversion"
    }

    fn evaluate(&self, series: &[AggregatedBar]) -> anyhow::Result<Vec<EvaluatedBar>> {
        let period = self.settings.period as usize;
        let mut rsi = Rsi::new(period).map_err(|e| anyhow!("invalid RSI period {}: {:?}", period, e))?;
        let position_size = Decimal::try_from(self.settings.position_size)
            .context("position_size is not representable")?;
        let (oversold, overbought) = (self.settings.oversold, self.settings.overbought);
        if oversold >= overbought {
            bail!("oversold ({}) must be below overbought ({})", oversold, overbought);
        }

        let mut rows = Vec::with_capacity(series.len());
        let mut previous: Option<f64> = None;

        for (i, bar) in series.iter().enumerate() {
            let close = bar
                .close
                .to_f64()
                .context("close price does not fit in f64")?;
            let value = rsi.next(close);
            let mut row = EvaluatedBar::quiet(bar);

            // Needs `period` price changes before the reading is meaningful.
            if i < period {
                rows.push(row);
                continue;
            }

            if let Some(prev) = previous {
                let signal = if prev < oversold && value >= oversold {
                    Some(Instruction::Buy)
                } else if prev < overbought && value >= overbought {
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

            previous = Some(value);
            rows.push(row);
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use core_types::Symbol;
    use rust_decimal_macros::dec;

    fn series(closes: &[f64]) -> Vec<AggregatedBar> {
        let start = Utc.with_ymd_and_hms(2025, 10, 27, 13, 30, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                let close = Decimal::try_from(*close).unwrap();
                AggregatedBar {
                    symbol: Symbol::new("QQQ"),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: dec!(100),
                    bucket_start: start + Duration::minutes(i as i64),
                }
            })
            .collect()
    }

    #[test]
    fn rally_into_overbought_sells() {
        let strategy = RsiReversion::new(RsiReversionSettings {
            period: 2,
            ..Default::default()
        });
        // A flat tape sits at RSI 50; the final up-tick drives it through 70.
        let rows = strategy
            .evaluate(&series(&[100.0, 100.0, 100.0, 100.0, 101.0]))
            .unwrap();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[4].signal, Some(Instruction::Sell));
        assert!(rows[..4].iter().all(|r| r.signal.is_none()));
    }

    #[test]
    fn inverted_bands_are_rejected() {
        let strategy = RsiReversion::new(RsiReversionSettings {
            oversold: 80.0,
            overbought: 20.0,
            ..Default::default()
        });
        assert!(strategy.evaluate(&series(&[1.0, 2.0])).is_err());
    }

    #[test]
    fn short_series_is_quiet() {
        let strategy = RsiReversion::new(RsiReversionSettings::default());
        let rows = strategy.evaluate(&series(&[1.0, 2.0, 3.0])).unwrap();
        assert!(rows.iter().all(|r| r.signal.is_none()));
    }
}
