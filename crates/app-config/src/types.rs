// In crates/app-config/src/types.rs

use serde::Deserialize;
use strategies::types::StrategySettings;

use crate::{Error, Result};

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Trading credentials and endpoints for the brokerage.
    pub broker: BrokerSettings,
    /// Separate credentials for price-history calls. Falls back to `broker`.
    #[serde(default)]
    pub market_data: Option<CredentialSettings>,
    #[serde(default)]
    pub auth: AuthSettings,
    /// Settings for the database connection.
    pub database: DatabaseSettings,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub orders: OrderSettings,
    #[serde(default)]
    pub strategies: StrategySettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
    /// When false, orders go to the in-memory paper broker instead of the brokerage.
    #[serde(default)]
    pub live_trading_enabled: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BrokerSettings {
    pub app_key: String,
    pub secret_key: String,
    pub refresh_token: String,
    /// The hashed account number used in every account-scoped URL.
    pub account_hash: String,
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Timeout applied to every outbound REST call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Where refreshed tokens are written, if anywhere.
    #[serde(default)]
    pub token_path: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CredentialSettings {
    pub app_key: String,
    pub secret_key: String,
    pub refresh_token: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AuthSettings {
    #[serde(default = "default_refresh_interval_minutes")]
    pub refresh_interval_minutes: u64,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: default_refresh_interval_minutes(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseSettings {
    /// The SQLite connection URL (e.g., "sqlite://database/autotrade.db").
    pub url: String,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StreamSettings {
    /// Wait after a normal closure before resubscribing.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Wait between failed resubscribe attempts.
    #[serde(default = "default_resubscribe_backoff_secs")]
    pub resubscribe_backoff_secs: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay_secs(),
            resubscribe_backoff_secs: default_resubscribe_backoff_secs(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct OrderSettings {
    /// Expiration of closing SELL orders, one trading day by default.
    #[serde(default = "default_sell_expiry_minutes")]
    pub sell_expiry_minutes: u32,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            sell_expiry_minutes: default_sell_expiry_minutes(),
        }
    }
}

impl Settings {
    /// The brokerage credentials used for orders and account calls.
    pub fn trading_credentials(&self) -> CredentialSettings {
        CredentialSettings {
            app_key: self.broker.app_key.clone(),
            secret_key: self.broker.secret_key.clone(),
            refresh_token: self.broker.refresh_token.clone(),
        }
    }

    /// The credentials used for market-data calls, the trading ones unless a
    /// separate `[market_data]` set is configured.
    pub fn market_data_credentials(&self) -> CredentialSettings {
        self.market_data.clone().unwrap_or_else(|| self.trading_credentials())
    }

    /// Reports every missing required setting, not just the first one.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        let required = [
            ("broker.app_key", &self.broker.app_key),
            ("broker.secret_key", &self.broker.secret_key),
            ("broker.refresh_token", &self.broker.refresh_token),
            ("broker.account_hash", &self.broker.account_hash),
            ("database.url", &self.database.url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                problems.push(format!("{} is required", name));
            }
        }

        if let Some(market_data) = &self.market_data {
            let required = [
                ("market_data.app_key", &market_data.app_key),
                ("market_data.secret_key", &market_data.secret_key),
                ("market_data.refresh_token", &market_data.refresh_token),
            ];
            for (name, value) in required {
                if value.trim().is_empty() {
                    problems.push(format!("{} is required", name));
                }
            }
        }

        if self.broker.request_timeout_secs == 0 {
            problems.push("broker.request_timeout_secs must be positive".to_string());
        }
        if self.auth.refresh_interval_minutes == 0 {
            problems.push("auth.refresh_interval_minutes must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Invalid(problems))
        }
    }
}

/// Helper functions for serde defaults
fn default_rest_base_url() -> String { "https://api.schwabapi.com".to_string() }
fn default_token_url() -> String { "https://api.schwabapi.com/v1/oauth/token".to_string() }
fn default_request_timeout_secs() -> u64 { 30 }
fn default_refresh_interval_minutes() -> u64 { 25 }
fn default_retry_delay_secs() -> u64 { 60 }
fn default_busy_timeout_secs() -> u64 { 5 }
fn default_reconnect_delay_secs() -> u64 { 1 }
fn default_resubscribe_backoff_secs() -> u64 { 5 }
fn default_sell_expiry_minutes() -> u32 { 1440 }
