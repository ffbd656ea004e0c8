use std::{sync::Arc, time::Duration};

use shared::{
    domain::{LinkState, Timestamp},
    settings::WifiCredentials,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::platform::{LinkError, RadioLink};

const MAX_BACKOFF_DOUBLINGS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Upper bound on a single `connect` call.
    pub connect_timeout: Duration,
    /// Delay before retrying after the first failed attempt; doubles per failure.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    pub fn backoff_after(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let doublings = (failures - 1).min(MAX_BACKOFF_DOUBLINGS);
        self.initial_backoff
            .saturating_mul(1 << doublings)
            .min(self.max_backoff)
    }
}

/// Owns the link state. Each `tick` makes at most one transition:
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Disconnected (link lost)
///                     \-> Failed -> Disconnected (retry after backoff)
/// ```
pub struct ConnectivitySupervisor {
    radio: Arc<dyn RadioLink>,
    credentials: WifiCredentials,
    policy: ReconnectPolicy,
    state: LinkState,
    consecutive_failures: u32,
    retry_at: Option<Timestamp>,
}

impl ConnectivitySupervisor {
    pub fn new(
        radio: Arc<dyn RadioLink>,
        credentials: WifiCredentials,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            radio,
            credentials,
            policy,
            state: LinkState::Disconnected,
            consecutive_failures: 0,
            retry_at: None,
        }
    }

    pub fn current_state(&self) -> LinkState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn retry_at(&self) -> Option<Timestamp> {
        self.retry_at
    }

    pub async fn tick(&mut self, now: Timestamp) -> LinkState {
        let next = match self.state {
            LinkState::Disconnected => self.on_disconnected(now),
            LinkState::Connecting => self.attempt(now).await,
            LinkState::Connected => self.on_connected(),
            LinkState::Failed => LinkState::Disconnected,
        };
        if next != self.state {
            debug!(from = %self.state, to = %next, at = %now, "link transition");
            self.state = next;
        }
        self.state
    }

    fn on_disconnected(&mut self, now: Timestamp) -> LinkState {
        match self.retry_at {
            Some(retry_at) if now < retry_at => LinkState::Disconnected,
            _ => {
                info!(
                    ssid = %self.credentials.ssid,
                    attempt = self.consecutive_failures + 1,
                    "connecting to wifi"
                );
                LinkState::Connecting
            }
        }
    }

    async fn attempt(&mut self, now: Timestamp) -> LinkState {
        let timeout = self.policy.connect_timeout;
        let started = Instant::now();
        let result = match tokio::time::timeout(
            timeout,
            self.radio.connect(&self.credentials, timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LinkError::Timeout),
        };
        // `now` was sampled before the attempt; the failure happened later.
        let failed_at = now + started.elapsed();

        match result {
            Ok(()) => {
                info!(ssid = %self.credentials.ssid, "wifi connected");
                self.consecutive_failures = 0;
                self.retry_at = None;
                LinkState::Connected
            }
            Err(error) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let backoff = self.policy.backoff_after(self.consecutive_failures);
                self.retry_at = Some(failed_at + backoff);
                warn!(
                    %error,
                    failures = self.consecutive_failures,
                    retry_in_ms = backoff.as_millis() as u64,
                    "wifi connection failed"
                );
                LinkState::Failed
            }
        }
    }

    fn on_connected(&mut self) -> LinkState {
        if self.radio.is_link_up() {
            return LinkState::Connected;
        }
        warn!("wifi connection lost, reconnecting");
        self.retry_at = None;
        LinkState::Disconnected
    }
}

#[cfg(test)]
#[path = "tests/connectivity_tests.rs"]
mod tests;
