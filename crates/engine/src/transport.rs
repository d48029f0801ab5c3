// In crates/engine/src/transport.rs

use api_client::{ApiClient, LiveConnector};
use async_trait::async_trait;
use core_types::{Bar, Symbol};

/// The live bar feed the supervisor consumes.
///
/// `receive_next` reports a closure as `api_client::Error::StreamClosed`,
/// saying whether it was normal.
#[async_trait]
pub trait BarTransport: Send {
    async fn login(&mut self) -> api_client::Result<()>;

    async fn subscribe(&mut self, symbols: &[Symbol]) -> api_client::Result<()>;

    async fn receive_next(&mut self) -> api_client::Result<Vec<Bar>>;
}

#[async_trait]
impl BarTransport for LiveConnector {
    async fn login(&mut self) -> api_client::Result<()> {
        LiveConnector::login(self).await
    }

    async fn subscribe(&mut self, symbols: &[Symbol]) -> api_client::Result<()> {
        LiveConnector::subscribe(self, symbols).await
    }

    async fn receive_next(&mut self) -> api_client::Result<Vec<Bar>> {
        LiveConnector::receive_next(self).await
    }
}

/// Where startup history comes from.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn minute_bars(
        &self,
        symbol: &Symbol,
        lookback_days: u32,
        extended_hours: bool,
    ) -> api_client::Result<Vec<Bar>>;
}

#[async_trait]
impl HistorySource for ApiClient {
    async fn minute_bars(
        &self,
        symbol: &Symbol,
        lookback_days: u32,
        extended_hours: bool,
    ) -> api_client::Result<Vec<Bar>> {
        self.get_price_history(symbol, lookback_days, extended_hours).await
    }
}
