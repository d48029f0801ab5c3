// In crates/api-client/src/auth.rs

use crate::types::{Credential, TokenResponse};
use crate::{Error, Result};
use arc_swap::ArcSwap;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// The current access credential, shared between the refresher (the only
/// writer) and every outbound call (readers).
///
/// Readers always see a complete credential: a refresh swaps in a whole new
/// value rather than mutating the old one.
#[derive(Debug)]
pub struct CredentialStore {
    current: ArcSwap<Credential>,
}

impl CredentialStore {
    pub fn new(initial: Credential) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// A store holding only a refresh token; the first refresh fills in the rest.
    pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self::new(Credential {
            access_token: String::new(),
            refresh_token: refresh_token.into(),
            expires_at: Utc::now(),
        })
    }

    pub fn current(&self) -> Arc<Credential> {
        self.current.load_full()
    }

    pub fn current_access_token(&self) -> String {
        self.current.load().access_token.clone()
    }

    pub fn replace(&self, credential: Credential) {
        self.current.store(Arc::new(credential));
    }
}

/// Renews the access credential on a fixed interval.
pub struct TokenRefresher {
    http_client: Client,
    token_url: String,
    app_key: String,
    secret_key: String,
    store: Arc<CredentialStore>,
    token_path: Option<PathBuf>,
    interval: Duration,
    retry_delay: Duration,
}

impl TokenRefresher {
    pub fn new(
        token_url: impl Into<String>,
        app_key: impl Into<String>,
        secret_key: impl Into<String>,
        store: Arc<CredentialStore>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::ClientBuildError(e.to_string()))?;
        Ok(Self {
            http_client,
            token_url: token_url.into(),
            app_key: app_key.into(),
            secret_key: secret_key.into(),
            store,
            token_path: None,
            interval: Duration::from_secs(25 * 60),
            retry_delay: Duration::from_secs(60),
        })
    }

    /// Writes every refreshed credential to `path` as JSON.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    pub fn with_schedule(mut self, interval: Duration, retry_delay: Duration) -> Self {
        self.interval = interval;
        self.retry_delay = retry_delay;
        self
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Exchanges the current refresh token for a new credential and swaps it in.
    pub async fn refresh_once(&self) -> Result<()> {
        let refresh_token = self.store.current().refresh_token.clone();
        if refresh_token.is_empty() {
            return Err(Error::Credential("no refresh token available".to_string()));
        }

        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.app_key, Some(&self.secret_key))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::ApiError {
                status: status.as_u16(),
                msg: text,
            });
        }

        let token: TokenResponse = serde_json::from_str(&text)?;
        let credential = Credential {
            access_token: token.access_token,
            // A refresh token is only rotated when the server sends a new one.
            refresh_token: token.refresh_token.unwrap_or(refresh_token),
            expires_at: Utc::now() + ChronoDuration::seconds(token.expires_in),
        };

        if let Some(path) = &self.token_path {
            if let Err(e) = persist(path, &credential).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to persist refreshed token.");
            }
        }

        self.store.replace(credential);
        tracing::info!("Access token refreshed.");
        Ok(())
    }

    /// The refresh loop. Runs until the task is dropped.
    pub async fn run(&self) {
        loop {
            tokio::time::sleep(self.interval).await;
            while let Err(e) = self.refresh_once().await {
                tracing::error!(
                    error = %e,
                    retry_in_secs = self.retry_delay.as_secs(),
                    "Failed to refresh access token."
                );
                tokio::time::sleep(self.retry_delay).await;
            }
        }
    }
}

async fn persist(path: &PathBuf, credential: &Credential) -> Result<()> {
    let body = serde_json::to_vec_pretty(credential)?;
    tokio::fs::write(path, body)
        .await
        .map_err(|e| Error::Credential(e.to_string()))
}
