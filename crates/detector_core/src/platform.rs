//! Seams to the platform layer. The core calls into these and never
//! implements them; the binary supplies host adapters and tests supply fakes.

use std::time::Duration;

use async_trait::async_trait;
use shared::{domain::LinkState, settings::WifiCredentials};
use thiserror::Error;

use crate::status::StatusSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("connection attempt timed out")]
    Timeout,
    #[error("access point rejected credentials")]
    Rejected,
    #[error("radio unavailable: {0}")]
    Radio(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("timeout")]
    Timeout,
    #[error("connection refused: {0}")]
    Connect(String),
    #[error("connection reset")]
    Reset,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub timeout: Duration,
}

impl PostRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Radio driver. `connect` may block up to `timeout`; the supervisor also
/// bounds it from the outside.
#[async_trait]
pub trait RadioLink: Send + Sync {
    async fn connect(
        &self,
        credentials: &WifiCredentials,
        timeout: Duration,
    ) -> Result<(), LinkError>;
    fn is_link_up(&self) -> bool;
}

/// Synchronous, non-blocking hardware read.
pub trait SensorInput: Send {
    fn read_sensor(&mut self) -> bool;
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post(&self, request: PostRequest) -> Result<HttpResponse, TransportError>;
}

/// One-way status sink. Calls are fire-and-forget.
pub trait StatusPresenter: Send + Sync {
    fn link_changed(&self, from: LinkState, to: LinkState);
    fn present(&self, status: &StatusSnapshot);
}
