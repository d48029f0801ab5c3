// In crates/strategies/src/types.rs

use serde::{Deserialize, Serialize};

/// Parameter blocks for the built-in strategies. A missing block means "use defaults".
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StrategySettings {
    pub sma_cross: Option<SmaCrossSettings>,
    pub rsi_reversion: Option<RsiReversionSettings>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SmaCrossSettings {
    /// The moving-average period, in aggregated bars.
    #[serde(default = "default_sma_length")]
    pub length: u32,
    /// Dollar amount committed per signal; quantity = position_size / close.
    #[serde(default = "default_position_size")]
    pub position_size: f64,
}

impl Default for SmaCrossSettings {
    fn default() -> Self {
        Self {
            length: default_sma_length(),
            position_size: default_position_size(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RsiReversionSettings {
    #[serde(default = "default_rsi_period")]
    pub period: u32,
    #[serde(default = "default_oversold")]
    pub oversold: f64,
    #[serde(default = "default_overbought")]
    pub overbought: f64,
    #[serde(default = "default_position_size")]
    pub position_size: f64,
}

impl Default for RsiReversionSettings {
    fn default() -> Self {
        Self {
            period: default_rsi_period(),
            oversold: default_oversold(),
            overbought: default_overbought(),
            position_size: default_position_size(),
        }
    }
}

fn default_sma_length() -> u32 { 200 }
fn default_position_size() -> f64 { 150.0 }
fn default_rsi_period() -> u32 { 14 }
fn default_oversold() -> f64 { 30.0 }
fn default_overbought() -> f64 { 70.0 }
