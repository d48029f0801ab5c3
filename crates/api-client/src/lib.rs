// In crates/api-client/src/lib.rs

use app_config::types::BrokerSettings;
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use core_types::{Bar, OrderId, Symbol};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

pub mod auth;
pub mod error;
pub mod live_connector;
pub mod types;

// Re-export public types
pub use auth::{CredentialStore, TokenRefresher};
pub use error::{Error, Result};
pub use live_connector::LiveConnector;
pub use types::*;

use types::PriceHistory;

/// The brokerage REST client.
///
/// Every request carries the credential that is current at the moment it is
/// sent, and is bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: String,
    account_hash: String,
    credentials: Arc<CredentialStore>,
    request_timeout: Duration,
}

impl ApiClient {
    /// Constructs a new ApiClient from BrokerSettings.
    pub fn new(settings: &BrokerSettings, credentials: Arc<CredentialStore>) -> Result<Self> {
        Self::with_base_url(
            &settings.rest_base_url,
            &settings.account_hash,
            Duration::from_secs(settings.request_timeout_secs),
            credentials,
        )
    }

    pub fn with_base_url(
        base_url: &str,
        account_hash: &str,
        timeout: Duration,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ClientBuildError(e.to_string()))?;
        Ok(ApiClient {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_hash: account_hash.to_string(),
            credentials,
            request_timeout: timeout,
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// The limit applied to every outbound call, streamer handshakes included.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.credentials.current_access_token())
    }

    fn orders_url(&self) -> String {
        format!("{}/trader/v1/accounts/{}/orders", self.base_url, self.account_hash)
    }

    /// Places a single-leg equity order.
    ///
    /// Corresponds to `POST /trader/v1/accounts/{hash}/orders`. The new order's
    /// id is the last segment of the `Location` header of the 201 response.
    pub async fn place_order(&self, ticket: &OrderTicket) -> Result<OrderId> {
        let body = order_body(ticket, Utc::now())?;
        let response = self
            .authorized(self.http_client.post(self.orders_url()))
            .json(&body)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(api_error(response).await);
        }

        let order_id = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|location| location.to_str().ok())
            .and_then(|location| location.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
            .map(|id| OrderId(id.to_string()))
            .ok_or(Error::MissingOrderId)?;

        tracing::info!(
            order_id = %order_id,
            symbol = %ticket.symbol,
            instruction = %ticket.instruction,
            quantity = %ticket.quantity,
            price = %ticket.price,
            "Order placed."
        );
        Ok(order_id)
    }

    /// Fetches the current status of an order.
    pub async fn get_order(&self, order_id: &OrderId) -> Result<OrderSnapshot> {
        let url = format!("{}/{}", self.orders_url(), order_id);
        let response = self.authorized(self.http_client.get(&url)).send().await?;
        parse_json(response).await
    }

    /// Requests cancellation of an order. `Ok(false)` means the brokerage refused.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<bool> {
        let url = format!("{}/{}", self.orders_url(), order_id);
        let response = self.authorized(self.http_client.delete(&url)).send().await?;
        let status = response.status();
        if matches!(status, StatusCode::OK | StatusCode::NO_CONTENT) {
            return Ok(true);
        }

        let msg = response.text().await.unwrap_or_default();
        tracing::warn!(order_id = %order_id, status = status.as_u16(), msg = %msg, "Order cancellation refused.");
        Ok(false)
    }

    /// Lists the accounts linked to the credential.
    pub async fn get_account_numbers(&self) -> Result<Vec<AccountNumber>> {
        let url = format!("{}/trader/v1/accounts/accountNumbers", self.base_url);
        let response = self.authorized(self.http_client.get(&url)).send().await?;
        parse_json(response).await
    }

    /// Whether the configured account hash belongs to the credential.
    pub async fn verify_account(&self) -> Result<bool> {
        let accounts = self.get_account_numbers().await?;
        Ok(accounts.iter().any(|a| a.hash_value == self.account_hash))
    }

    /// Fetches streamer connection details.
    pub async fn get_user_preference(&self) -> Result<UserPreference> {
        let url = format!("{}/trader/v1/userPreference", self.base_url);
        let response = self.authorized(self.http_client.get(&url)).send().await?;
        parse_json(response).await
    }

    /// Fetches one-minute bars covering the last `lookback_days` days.
    ///
    /// Corresponds to `GET /marketdata/v1/pricehistory`.
    pub async fn get_price_history(
        &self,
        symbol: &Symbol,
        lookback_days: u32,
        extended_hours: bool,
    ) -> Result<Vec<Bar>> {
        let url = format!("{}/marketdata/v1/pricehistory", self.base_url);
        let response = self
            .authorized(self.http_client.get(&url))
            .query(&[
                ("symbol", symbol.as_str().to_string()),
                ("periodType", "day".to_string()),
                ("period", lookback_days.to_string()),
                ("frequencyType", "minute".to_string()),
                ("frequency", "1".to_string()),
                ("needExtendedHoursData", extended_hours.to_string()),
            ])
            .send()
            .await?;
        let history: PriceHistory = parse_json(response).await?;

        let mut bars = Vec::with_capacity(history.candles.len());
        for candle in history.candles {
            let Some(timestamp) = minute_from_millis(candle.datetime) else {
                tracing::warn!(symbol = %symbol, datetime = candle.datetime, "Skipping candle with invalid timestamp.");
                continue;
            };
            bars.push(Bar {
                symbol: symbol.clone(),
                open: candle.open,
                high: candle.high,
                low: candle.low,
                close: candle.close,
                volume: candle.volume,
                timestamp,
            });
        }
        Ok(bars)
    }
}

/// Builds the JSON body of an order request.
fn order_body(ticket: &OrderTicket, now: DateTime<Utc>) -> Result<Value> {
    let quantity = ticket
        .quantity
        .to_f64()
        .ok_or_else(|| Error::InvalidRequest(format!("quantity {} is not representable", ticket.quantity)))?;
    let order_type = if ticket.price.is_zero() { "MARKET" } else { "LIMIT" };

    let mut body = json!({
        "session": "NORMAL",
        "duration": "DAY",
        "orderType": order_type,
        "orderStrategyType": "SINGLE",
        "orderLegCollection": [{
            "instruction": ticket.instruction.as_str(),
            "quantity": quantity,
            "instrument": {
                "symbol": ticket.symbol.as_str(),
                "assetType": "EQUITY"
            }
        }]
    });

    if ticket.price > Decimal::ZERO {
        body["price"] = Value::String(ticket.price.to_string());
    }
    if ticket.expiry_minutes > 0 {
        let cancel_at = now + ChronoDuration::minutes(i64::from(ticket.expiry_minutes));
        body["cancelTime"] = Value::String(cancel_at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string());
    }
    Ok(body)
}

/// Converts epoch milliseconds to the start of that minute.
pub(crate) fn minute_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)?
        .duration_trunc(ChronoDuration::minutes(1))
        .ok()
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

async fn api_error(response: Response) -> Error {
    let status = response.status().as_u16();
    let msg = response.text().await.unwrap_or_default();
    Error::ApiError { status, msg }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_types::Instruction;
    use rust_decimal_macros::dec;

    fn ticket(price: Decimal, expiry_minutes: u32) -> OrderTicket {
        OrderTicket {
            symbol: Symbol::new("SPY"),
            quantity: dec!(3),
            price,
            expiry_minutes,
            instruction: Instruction::Buy,
        }
    }

    #[test]
    fn zero_price_builds_a_market_order_without_price() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 14, 30, 0).unwrap();
        let body = order_body(&ticket(Decimal::ZERO, 0), now).unwrap();

        assert_eq!(body["orderType"], "MARKET");
        assert!(body.get("price").is_none());
        assert!(body.get("cancelTime").is_none());
        assert_eq!(body["orderLegCollection"][0]["instruction"], "BUY");
        assert_eq!(body["orderLegCollection"][0]["instrument"]["assetType"], "EQUITY");
    }

    #[test]
    fn priced_order_is_a_limit_with_cancel_time() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 14, 30, 0).unwrap();
        let body = order_body(&ticket(dec!(12.35), 5), now).unwrap();

        assert_eq!(body["orderType"], "LIMIT");
        assert_eq!(body["price"], "12.35");
        assert_eq!(body["cancelTime"], "2025-03-04T14:35:00.000Z");
    }

    #[test]
    fn millis_are_truncated_to_the_minute() {
        let ts = minute_from_millis(1_741_098_645_123).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 3, 4, 14, 30, 0).unwrap());
    }
}
