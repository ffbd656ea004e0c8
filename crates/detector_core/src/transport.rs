use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use tracing::debug;

use crate::platform::{HttpResponse, HttpTransport, PostRequest, TransportError};

pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|error| TransportError::Other(error.to_string()))?;
        Ok(Self { http })
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|error| TransportError::Other(format!("header name '{name}': {error}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|error| TransportError::Other(format!("header value for '{name}': {error}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn classify_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout;
    }
    if error.is_connect() {
        return TransportError::Connect(error.to_string());
    }
    let message = error.to_string();
    if message.to_ascii_lowercase().contains("connection reset") {
        return TransportError::Reset;
    }
    TransportError::Other(message)
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: PostRequest) -> Result<HttpResponse, TransportError> {
        let headers = header_map(&request.headers)?;
        let response = self
            .http
            .post(&request.url)
            .headers(headers)
            .body(request.body)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(error) => {
                debug!(status, %error, "response body unreadable");
                String::new()
            }
        };
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
