// In crates/api-client/src/live_connector.rs

use crate::types::StreamerInfo;
use crate::{ApiClient, Error, Result, minute_from_millis};
use core_types::{Bar, Symbol};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Fields requested from the CHART_EQUITY service: key, sequence, OHLCV,
/// chart time and chart day.
const CHART_EQUITY_FIELDS: &str = "0,1,2,3,4,5,6,7,8";

/// A connector for the brokerage's streamer websocket.
///
/// `login` (re)opens the socket and authenticates with the current access
/// token, `subscribe` requests one-minute chart bars, and `receive_next`
/// blocks until the next batch of bars or a closure. The connect and every
/// acknowledgement wait are bounded by the client's request timeout.
pub struct LiveConnector {
    api_client: ApiClient,
    timeout: Duration,
    socket: Option<Socket>,
    info: Option<StreamerInfo>,
    request_id: u64,
}

impl LiveConnector {
    pub fn new(api_client: ApiClient) -> Self {
        Self {
            timeout: api_client.request_timeout(),
            api_client,
            socket: None,
            info: None,
            request_id: 0,
        }
    }

    fn next_request_id(&mut self) -> String {
        let id = self.request_id;
        self.request_id += 1;
        id.to_string()
    }

    /// Connects (dropping any previous socket) and performs the ADMIN LOGIN.
    pub async fn login(&mut self) -> Result<()> {
        let preference = self.api_client.get_user_preference().await?;
        let info = preference
            .streamer_info
            .into_iter()
            .next()
            .ok_or_else(|| Error::Stream("no streamer info in user preference".to_string()))?;

        tracing::info!(url = %info.streamer_socket_url, "Connecting to streamer...");
        self.socket = None;
        let (socket, _) = bounded(self.timeout, "streamer connect", async {
            connect_async(info.streamer_socket_url.as_str())
                .await
                .map_err(|e| Error::Stream(e.to_string()))
        })
        .await?;
        self.socket = Some(socket);

        let request_id = self.next_request_id();
        let login = json!({
            "requests": [{
                "service": "ADMIN",
                "command": "LOGIN",
                "requestid": request_id,
                "SchwabClientCustomerId": info.schwab_client_customer_id,
                "SchwabClientCorrelId": info.schwab_client_correl_id,
                "parameters": {
                    "Authorization": self.api_client.credentials().current_access_token(),
                    "SchwabClientChannel": info.schwab_client_channel,
                    "SchwabClientFunctionId": info.schwab_client_function_id
                }
            }]
        });
        self.info = Some(info);
        self.send(login).await?;
        bounded(self.timeout, "LOGIN acknowledgement", self.await_response("ADMIN", "LOGIN")).await?;
        tracing::info!("Streamer login successful.");
        Ok(())
    }

    /// Subscribes to one-minute chart bars for `symbols`.
    pub async fn subscribe(&mut self, symbols: &[Symbol]) -> Result<()> {
        let info = self
            .info
            .clone()
            .ok_or_else(|| Error::Stream("subscribe called before login".to_string()))?;
        let keys = symbols.iter().map(Symbol::as_str).collect::<Vec<_>>().join(",");

        let request_id = self.next_request_id();
        let subs = json!({
            "requests": [{
                "service": "CHART_EQUITY",
                "command": "SUBS",
                "requestid": request_id,
                "SchwabClientCustomerId": info.schwab_client_customer_id,
                "SchwabClientCorrelId": info.schwab_client_correl_id,
                "parameters": {
                    "keys": keys,
                    "fields": CHART_EQUITY_FIELDS
                }
            }]
        });
        self.send(subs).await?;
        bounded(self.timeout, "SUBS acknowledgement", self.await_response("CHART_EQUITY", "SUBS")).await?;
        tracing::info!(symbols = %keys, "Subscribed to chart bars.");
        Ok(())
    }

    /// Waits for the next message carrying chart bars.
    ///
    /// Heartbeats and acknowledgements are skipped. A closure is reported as
    /// `Error::StreamClosed`: normal for close codes 1000 and 1001 or a close
    /// frame without a code, abnormal otherwise.
    pub async fn receive_next(&mut self) -> Result<Vec<Bar>> {
        loop {
            let text = self.read_text().await?;
            let bars = parse_chart_bars(&text)?;
            if !bars.is_empty() {
                return Ok(bars);
            }
        }
    }

    async fn send(&mut self, request: Value) -> Result<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| Error::Stream("not connected".to_string()))?;
        socket
            .send(Message::text(request.to_string()))
            .await
            .map_err(|e| Error::Stream(e.to_string()))
    }

    async fn read_text(&mut self) -> Result<String> {
        loop {
            let next = match self.socket.as_mut() {
                Some(socket) => socket.next().await,
                None => return Err(Error::StreamClosed { normal: false }),
            };
            match next {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_string()),
                Some(Ok(Message::Close(frame))) => {
                    let normal = match &frame {
                        Some(frame) => matches!(frame.code, CloseCode::Normal | CloseCode::Away),
                        None => true,
                    };
                    tracing::warn!(?frame, normal, "Streamer closed the connection.");
                    self.socket = None;
                    return Err(Error::StreamClosed { normal });
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Error reading from streamer.");
                    self.socket = None;
                    return Err(Error::StreamClosed { normal: false });
                }
                None => {
                    self.socket = None;
                    return Err(Error::StreamClosed { normal: false });
                }
            }
        }
    }

    /// Reads until the acknowledgement for `service`/`command` arrives.
    async fn await_response(&mut self, service: &str, command: &str) -> Result<()> {
        loop {
            let text = self.read_text().await?;
            let Ok(message) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            let Some(responses) = message.get("response").and_then(Value::as_array) else {
                continue;
            };
            for response in responses {
                if response.get("service").and_then(Value::as_str) != Some(service)
                    || response.get("command").and_then(Value::as_str) != Some(command)
                {
                    continue;
                }
                let content = response.get("content");
                let code = content.and_then(|c| c.get("code")).and_then(Value::as_i64).unwrap_or(-1);
                if code == 0 {
                    return Ok(());
                }
                let msg = content
                    .and_then(|c| c.get("msg"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                return Err(Error::Stream(format!("{} {} rejected: {} ({})", service, command, msg, code)));
            }
        }
    }
}

/// Runs `call`, failing with `Error::Stream` once `limit` has passed.
async fn bounded<T>(limit: Duration, what: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| Error::Stream(format!("{} timed out after {:?}", what, limit)))?
}

/// Extracts every CHART_EQUITY bar from one streamer message.
///
/// Messages without chart data yield an empty list; malformed items are
/// logged and skipped.
pub fn parse_chart_bars(text: &str) -> Result<Vec<Bar>> {
    let message: Value = serde_json::from_str(text)?;
    let mut bars = Vec::new();

    let Some(data) = message.get("data").and_then(Value::as_array) else {
        return Ok(bars);
    };
    for entry in data {
        if entry.get("service").and_then(Value::as_str) != Some("CHART_EQUITY") {
            continue;
        }
        let Some(content) = entry.get("content").and_then(Value::as_array) else {
            continue;
        };
        for item in content {
            match parse_chart_item(item) {
                Some(bar) => bars.push(bar),
                None => tracing::warn!(%item, "Skipping malformed chart bar."),
            }
        }
    }
    Ok(bars)
}

fn parse_chart_item(item: &Value) -> Option<Bar> {
    let symbol = item.get("key").and_then(Value::as_str).filter(|s| !s.trim().is_empty())?;
    let millis = item.get("7").and_then(Value::as_i64)?;
    Some(Bar {
        symbol: Symbol::new(symbol),
        open: decimal_field(item, "2")?,
        high: decimal_field(item, "3")?,
        low: decimal_field(item, "4")?,
        close: decimal_field(item, "5")?,
        volume: decimal_field(item, "6")?,
        timestamp: minute_from_millis(millis)?,
    })
}

fn decimal_field(item: &Value, field: &str) -> Option<Decimal> {
    match item.get(field)? {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}
