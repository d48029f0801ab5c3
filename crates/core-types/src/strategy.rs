use crate::{Error, Result, Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// The unique identifier of one configured strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrategyId(pub i64);

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

impl FromStr for OrderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "MARKET" => Ok(OrderType::Market),
            "LIMIT" => Ok(OrderType::Limit),
            other => Err(Error::InvalidInput(format!("unknown order type '{}'", other))),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => f.write_str("MARKET"),
            OrderType::Limit => f.write_str("LIMIT"),
        }
    }
}

/// The configuration of a single strategy instance.
///
/// Loaded once at startup and immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub id: StrategyId,
    /// The registry name of the signal function (e.g., "sma_cross").
    pub name: String,
    pub symbol: Symbol,
    pub timeframe_minutes: u32,
    pub lookback_days: u32,
    pub extended_hours: bool,
    pub order_type: OrderType,
}

impl StrategyConfig {
    /// Checks the invariants that the rest of the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.timeframe_minutes == 0 {
            return Err(Error::InvalidInput(format!(
                "strategy {} has a non-positive timeframe",
                self.id
            )));
        }
        // Buckets are aligned to UTC midnight and must tile the day.
        if MINUTES_PER_DAY % self.timeframe_minutes != 0 {
            return Err(Error::InvalidInput(format!(
                "strategy {} timeframe of {} minutes does not divide the day",
                self.id, self.timeframe_minutes
            )));
        }
        if self.symbol.0.is_empty() {
            return Err(Error::InvalidInput(format!("strategy {} has no symbol", self.id)));
        }
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput(format!("strategy {} has no name", self.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(timeframe_minutes: u32) -> StrategyConfig {
        StrategyConfig {
            id: StrategyId(1),
            name: "sma_cross".to_string(),
            symbol: Symbol::new("spy"),
            timeframe_minutes,
            lookback_days: 10,
            extended_hours: false,
            order_type: OrderType::Market,
        }
    }

    #[test]
    fn zero_timeframe_is_rejected() {
        assert!(config(5).validate().is_ok());
        assert!(matches!(config(0).validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn timeframe_must_divide_the_day() {
        for minutes in [1, 5, 15, 30, 60, 240, 1440] {
            assert!(config(minutes).validate().is_ok(), "{} minutes", minutes);
        }
        for minutes in [7, 45, 2000] {
            assert!(matches!(config(minutes).validate(), Err(Error::InvalidInput(_))), "{} minutes", minutes);
        }
    }

    #[test]
    fn order_type_parsing() {
        assert_eq!("limit".parse::<OrderType>().unwrap(), OrderType::Limit);
        assert_eq!("MARKET".parse::<OrderType>().unwrap(), OrderType::Market);
        assert!("stop".parse::<OrderType>().is_err());
    }
}
