use std::{sync::Arc, time::Duration};

use shared::{
    domain::{DeliveryOutcome, DetectionEvent},
    error::ControllerError,
    settings::Settings,
};
use tracing::debug;

use crate::platform::{HttpTransport, PostRequest, TransportError};

pub const DETECT_PATH: &str = "api/pir/detect";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
const EMPTY_JSON_BODY: &str = "{}";
const MAX_LOGGED_BODY_CHARS: usize = 256;

/// Relays one detection per call. Assumes the caller has checked the link;
/// never retries.
pub struct DeliveryAgent {
    transport: Arc<dyn HttpTransport>,
    request_timeout: Duration,
}

impl DeliveryAgent {
    pub fn new(transport: Arc<dyn HttpTransport>, request_timeout: Duration) -> Self {
        Self {
            transport,
            request_timeout,
        }
    }

    pub fn build_request(&self, settings: &Settings) -> Result<PostRequest, ControllerError> {
        let mut url = settings
            .endpoint
            .base_url()?
            .join(DETECT_PATH)
            .map_err(|error| ControllerError::config(format!("detection url: {error}")))?;
        url.query_pairs_mut()
            .append_pair("device", &settings.device_name);

        Ok(PostRequest {
            url: url.into(),
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("ApiKey {}", settings.api_key),
                ),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: EMPTY_JSON_BODY.to_string(),
            timeout: self.request_timeout,
        })
    }

    pub async fn deliver(&self, event: &DetectionEvent, settings: &Settings) -> DeliveryOutcome {
        let request = match self.build_request(settings) {
            Ok(request) => request,
            Err(error) => return DeliveryOutcome::TransportFailed(error.to_string()),
        };
        debug!(sequence_id = %event.sequence_id, url = %request.url, "posting detection");

        // The transport gets the same bound; this one covers drivers that ignore it.
        let response = match tokio::time::timeout(
            self.request_timeout,
            self.transport.post(request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        let outcome = match response {
            Ok(response) => {
                debug!(
                    status = response.status,
                    body = %truncate(&response.body, MAX_LOGGED_BODY_CHARS),
                    "endpoint response"
                );
                classify_status(response.status)
            }
            Err(error) => DeliveryOutcome::TransportFailed(error.to_string()),
        };

        debug!(sequence_id = %event.sequence_id, ?outcome, "delivery attempt finished");
        outcome
    }
}

pub fn classify_status(status: u16) -> DeliveryOutcome {
    match status {
        200..=299 => DeliveryOutcome::Delivered,
        100..=599 => DeliveryOutcome::Rejected(status),
        other => DeliveryOutcome::TransportFailed(format!("invalid status code {other}")),
    }
}

fn truncate(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}

#[cfg(test)]
#[path = "tests/delivery_tests.rs"]
mod tests;
