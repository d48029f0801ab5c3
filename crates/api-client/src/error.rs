// In crates/api-client/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to build the API client: {0}")]
    ClientBuildError(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(#[from] serde_json::Error),
    #[error("API error: status {status}, msg: {msg}")]
    ApiError { status: u16, msg: String },
    #[error("Order was accepted but no order id was returned")]
    MissingOrderId,
    #[error("Stream closed (normal: {normal})")]
    StreamClosed { normal: bool },
    #[error("Stream error: {0}")]
    Stream(String),
    #[error("Credential error: {0}")]
    Credential(String),
}

pub type Result<T> = std::result::Result<T, Error>;
