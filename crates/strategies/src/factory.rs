// In crates/strategies/src/factory.rs

use crate::rsi_reversion::RsiReversion;
use crate::sma_cross::SmaCross;
use crate::types::StrategySettings;
use crate::{Error, Result, Strategy};
use std::sync::Arc;

/// The names of every built-in strategy, in the order they are documented.
pub const BUILTIN_STRATEGIES: &[&str] = &["sma_cross", "rsi_reversion"];

/// Creates a built-in strategy instance by name, using its configured
/// parameters or its defaults when the settings omit them.
///
/// `smaCross` is accepted as an alias of `sma_cross` so that existing
/// strategy rows keep resolving.
pub fn create_strategy(
    name: &str,
    settings: &StrategySettings,
) -> Result<Arc<dyn Strategy>> {
    let strategy: Arc<dyn Strategy> = match name {
        "sma_cross" | "smaCross" => {
            let params = settings.sma_cross.clone().unwrap_or_default();
            if params.length == 0 {
                return Err(Error::InvalidSettings {
                    name: name.to_string(),
                    reason: "length must be positive".to_string(),
                });
            }
            Arc::new(SmaCross::new(params))
        }
        "rsi_reversion" => {
            let params = settings.rsi_reversion.clone().unwrap_or_default();
            if params.period == 0 || params.oversold >= params.overbought {
                return Err(Error::InvalidSettings {
                    name: name.to_string(),
                    reason: "period must be positive and oversold below overbought".to_string(),
                });
            }
            Arc::new(RsiReversion::new(params))
        }
        unknown => return Err(Error::UnknownStrategy(unknown.to_string())),
    };

    Ok(strategy)
}
