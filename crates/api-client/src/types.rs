// In crates/api-client/src/types.rs

use chrono::{DateTime, Utc};
use core_types::{Instruction, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Everything needed to place one single-leg equity order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTicket {
    pub symbol: Symbol,
    pub quantity: Decimal,
    /// Zero places a MARKET order, anything else a LIMIT order.
    pub price: Decimal,
    /// Minutes until the order is cancelled. Zero means no cancel time.
    pub expiry_minutes: u32,
    pub instruction: Instruction,
}

/// The fields of a brokerage order the lifecycle manager cares about.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub status: String,
    #[serde(default)]
    pub filled_quantity: Decimal,
}

impl OrderSnapshot {
    pub fn is_filled(&self) -> bool {
        self.status.eq_ignore_ascii_case("FILLED")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNumber {
    pub account_number: String,
    pub hash_value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
    #[serde(default)]
    pub streamer_info: Vec<StreamerInfo>,
}

/// Connection details for the streamer websocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamerInfo {
    pub streamer_socket_url: String,
    pub schwab_client_customer_id: String,
    pub schwab_client_correl_id: String,
    pub schwab_client_channel: String,
    pub schwab_client_function_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PriceHistory {
    #[serde(default)]
    pub candles: Vec<Candle>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Candle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Epoch milliseconds.
    pub datetime: i64,
}

/// An OAuth access credential. Replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    1800
}
