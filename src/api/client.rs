//! HTTP transport to the betting backend

use crate::api::models::{BalanceRequest, BalanceResponse, BetCall};
use crate::api::routes;
use crate::common::traits::{BalanceSource, BetTransport};
use crate::common::types::RoundOutcome;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Error type for backend communication
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
    #[error("failed: {status}: {body}")]
    Failed { status: StatusCode, body: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("rejected: {0}")]
    Rejected(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Reqwest(e) if e.is_timeout())
    }
}

/// JSON-over-HTTP client for bet and balance endpoints
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a transport for `base_url`.
    ///
    /// `timeout` bounds every request; `None` waits indefinitely.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            other => return Err(TransportError::InvalidScheme(other.to_string())),
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POST `body` to `path` and return status and raw body
    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<(StatusCode, bytes::Bytes), TransportError> {
        let url = self.base_url.join(path)?;
        debug!("POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        Ok((status, bytes))
    }
}

#[async_trait]
impl BetTransport for HttpTransport {
    async fn send_bet(&self, call: &BetCall) -> Result<RoundOutcome, TransportError> {
        let (status, bytes) = self.post(&call.path, &call.body).await?;

        // The backend answers rejected bets with 4xx and a regular envelope
        match serde_json::from_slice::<RoundOutcome>(&bytes) {
            Ok(outcome) => Ok(outcome),
            Err(_) if !status.is_success() => Err(TransportError::Failed {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }),
            Err(e) => Err(TransportError::Decode(e.to_string())),
        }
    }
}

#[async_trait]
impl BalanceSource for HttpTransport {
    async fn fetch_balance(&self, user_id: &str) -> Result<f64, TransportError> {
        let body = serde_json::to_value(BalanceRequest {
            user_id: user_id.to_string(),
        })
        .map_err(|e| TransportError::Decode(e.to_string()))?;
        let (status, bytes) = self.post(routes::USER_BALANCE, &body).await?;

        let response: BalanceResponse = match serde_json::from_slice(&bytes) {
            Ok(response) => response,
            Err(_) if !status.is_success() => {
                return Err(TransportError::Failed {
                    status,
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                })
            }
            Err(e) => return Err(TransportError::Decode(e.to_string())),
        };

        match (response.success, response.balance) {
            (true, Some(balance)) => Ok(balance),
            (true, None) => Err(TransportError::Decode("balance missing from response".into())),
            (false, _) => Err(TransportError::Rejected(
                response.error.unwrap_or_else(|| "balance query rejected".into()),
            )),
        }
    }
}
