use api_client::types::Credential;
use api_client::{ApiClient, CredentialStore, Error, OrderTicket, TokenRefresher};
use chrono::Utc;
use core_types::{Instruction, OrderId, Symbol};
use mockito::{Matcher, Server};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn store(access_token: &str) -> Arc<CredentialStore> {
    Arc::new(CredentialStore::new(Credential {
        access_token: access_token.to_string(),
        refresh_token: "refresh-1".to_string(),
        expires_at: Utc::now(),
    }))
}

fn client(server: &Server, credentials: Arc<CredentialStore>) -> ApiClient {
    ApiClient::with_base_url(&server.url(), "HASH", Duration::from_secs(5), credentials).unwrap()
}

fn buy_ticket() -> OrderTicket {
    OrderTicket {
        symbol: Symbol::new("SPY"),
        quantity: dec!(2),
        price: dec!(571.25),
        expiry_minutes: 5,
        instruction: Instruction::Buy,
    }
}

#[tokio::test]
async fn order_id_comes_from_the_location_header() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/trader/v1/accounts/HASH/orders")
        .match_header("authorization", "Bearer token-1")
        .match_body(Matcher::PartialJson(json!({
            "orderType": "LIMIT",
            "price": "571.25",
            "session": "NORMAL",
            "orderStrategyType": "SINGLE"
        })))
        .with_status(201)
        .with_header("location", "https://api.example/trader/v1/accounts/HASH/orders/98765")
        .create_async()
        .await;

    let order_id = client(&server, store("token-1")).place_order(&buy_ticket()).await.unwrap();

    assert_eq!(order_id, OrderId("98765".to_string()));
    mock.assert_async().await;
}

#[tokio::test]
async fn rejected_order_is_an_api_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/trader/v1/accounts/HASH/orders")
        .with_status(400)
        .with_body(r#"{"message":"bad quantity"}"#)
        .create_async()
        .await;

    let result = client(&server, store("t")).place_order(&buy_ticket()).await;
    assert!(matches!(result, Err(Error::ApiError { status: 400, .. })));
}

#[tokio::test]
async fn created_without_location_has_no_order_id() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/trader/v1/accounts/HASH/orders")
        .with_status(201)
        .create_async()
        .await;

    let result = client(&server, store("t")).place_order(&buy_ticket()).await;
    assert!(matches!(result, Err(Error::MissingOrderId)));
}

#[tokio::test]
async fn order_status_and_cancellation() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/trader/v1/accounts/HASH/orders/42")
        .with_status(200)
        .with_body(r#"{"status":"FILLED","filledQuantity":3.0,"orderId":42}"#)
        .create_async()
        .await;
    server
        .mock("DELETE", "/trader/v1/accounts/HASH/orders/42")
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("DELETE", "/trader/v1/accounts/HASH/orders/43")
        .with_status(400)
        .create_async()
        .await;

    let api = client(&server, store("t"));
    let snapshot = api.get_order(&OrderId("42".into())).await.unwrap();
    assert!(snapshot.is_filled());
    assert_eq!(snapshot.filled_quantity, dec!(3));

    assert!(api.cancel_order(&OrderId("42".into())).await.unwrap());
    assert!(!api.cancel_order(&OrderId("43".into())).await.unwrap());
}

#[tokio::test]
async fn configured_account_hash_must_be_linked() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/trader/v1/accounts/accountNumbers")
        .with_status(200)
        .with_body(r#"[{"accountNumber":"123","hashValue":"OTHER"},{"accountNumber":"456","hashValue":"HASH"}]"#)
        .create_async()
        .await;

    assert!(client(&server, store("t")).verify_account().await.unwrap());
}

#[tokio::test]
async fn price_history_becomes_minute_bars() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/marketdata/v1/pricehistory")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "SPY".into()),
            Matcher::UrlEncoded("period".into(), "3".into()),
            Matcher::UrlEncoded("frequencyType".into(), "minute".into()),
            Matcher::UrlEncoded("needExtendedHoursData".into(), "false".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"symbol":"SPY","empty":false,"candles":[
                {"open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":100,"datetime":1741098600000},
                {"open":1.5,"high":2.5,"low":1.0,"close":2.0,"volume":200,"datetime":1741098660000}]}"#,
        )
        .create_async()
        .await;

    let bars = client(&server, store("t"))
        .get_price_history(&Symbol::new("SPY"), 3, false)
        .await
        .unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[1].close, dec!(2.0));
    assert!(bars[0].timestamp < bars[1].timestamp);
}

#[tokio::test]
async fn refresh_swaps_in_the_new_credential() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/oauth/token")
        .match_header("authorization", Matcher::Regex("^Basic ".into()))
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"access_token":"token-2","expires_in":1800,"token_type":"Bearer"}"#)
        .create_async()
        .await;

    let credentials = store("token-1");
    let refresher = TokenRefresher::new(
        format!("{}/v1/oauth/token", server.url()),
        "key",
        "secret",
        credentials.clone(),
        Duration::from_secs(5),
    )
    .unwrap();

    refresher.refresh_once().await.unwrap();

    mock.assert_async().await;
    assert_eq!(credentials.current_access_token(), "token-2");
    // No new refresh token in the response: the old one is kept.
    assert_eq!(credentials.current().refresh_token, "refresh-1");
}

#[tokio::test]
async fn failed_refresh_keeps_the_old_credential() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/oauth/token")
        .with_status(401)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let credentials = store("token-1");
    let refresher = TokenRefresher::new(
        format!("{}/v1/oauth/token", server.url()),
        "key",
        "secret",
        credentials.clone(),
        Duration::from_secs(5),
    )
    .unwrap();

    assert!(matches!(refresher.refresh_once().await, Err(Error::ApiError { status: 401, .. })));
    assert_eq!(credentials.current_access_token(), "token-1");
}
