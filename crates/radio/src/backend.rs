//! Backend collaborator the delivery queue relays to

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use thiserror::Error;

use sos_relay_core::RelayMessage;

/// Failure to get a message to the backend at all. An HTTP error status is
/// not a transport fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFault {
    #[error("backend request timed out")]
    Timeout,

    #[error("backend unreachable: {0}")]
    Connect(String),

    #[error("backend request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Delivers one message, returning the backend's HTTP status code.
    async fn post(&self, message: &RelayMessage) -> Result<u16, TransportFault>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn post(&self, message: &RelayMessage) -> Result<u16, TransportFault> {
        (**self).post(message).await
    }
}

/// POSTs messages as flat JSON objects to a fixed endpoint.
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpBackend {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(url: impl Into<String>) -> Result<Self, TransportFault> {
        Self::with_timeout(url, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportFault> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportFault::Request(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl From<reqwest::Error> for TransportFault {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportFault::Timeout
        } else if e.is_connect() {
            TransportFault::Connect(e.to_string())
        } else {
            TransportFault::Request(e.to_string())
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn post(&self, message: &RelayMessage) -> Result<u16, TransportFault> {
        let response = self.client.post(&self.url).json(message).send().await?;
        let status = response.status();
        if status.is_success() {
            debug!("Backend accepted msg_id {} with {}", message.msg_id(), status);
        } else {
            warn!("Backend answered {} for msg_id {}", status, message.msg_id());
        }
        Ok(status.as_u16())
    }
}
