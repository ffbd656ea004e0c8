use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use serde::Serialize;
use shared::{
    domain::{DeliveryOutcome, DetectionEvent, LinkState, Timestamp},
    error::ControllerError,
    settings::Settings,
};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    connectivity::ConnectivitySupervisor,
    delivery::DeliveryAgent,
    platform::{SensorInput, StatusPresenter},
    sensor_gate::SensorGate,
    status::{DetectionSummary, StatusSnapshot},
};

const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// What happened to an accepted detection. Every variant except `Delivered`
/// means the event is gone; nothing is queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Disposition {
    Delivered,
    Rejected(u16),
    TransportFailed(String),
    DroppedNoLink,
}

impl From<DeliveryOutcome> for Disposition {
    fn from(outcome: DeliveryOutcome) -> Self {
        match outcome {
            DeliveryOutcome::Delivered => Disposition::Delivered,
            DeliveryOutcome::Rejected(status) => Disposition::Rejected(status),
            DeliveryOutcome::TransportFailed(reason) => Disposition::TransportFailed(reason),
        }
    }
}

impl Disposition {
    pub fn into_result(self) -> Result<(), ControllerError> {
        match self {
            Disposition::Delivered => Ok(()),
            Disposition::Rejected(status) => Err(ControllerError::DeliveryRejected(status)),
            Disposition::TransportFailed(reason) => Err(ControllerError::TransportFailed(reason)),
            Disposition::DroppedNoLink => Err(ControllerError::LinkUnavailable),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub delivered: u64,
    pub rejected: u64,
    pub transport_failed: u64,
    pub dropped_no_link: u64,
    /// Active samples swallowed by the cooldown window.
    pub suppressed_samples: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub link: LinkState,
    pub transition: Option<(LinkState, LinkState)>,
    pub event: Option<DetectionEvent>,
    pub disposition: Option<Disposition>,
}

pub struct Controller {
    settings: Settings,
    sensor: Box<dyn SensorInput>,
    gate: SensorGate,
    connectivity: ConnectivitySupervisor,
    delivery: DeliveryAgent,
    presenter: Arc<dyn StatusPresenter>,
    stats: ControllerStats,
    last_detection: Option<DetectionSummary>,
    sensor_active: bool,
}

impl Controller {
    pub fn new(
        settings: Settings,
        sensor: Box<dyn SensorInput>,
        connectivity: ConnectivitySupervisor,
        delivery: DeliveryAgent,
        presenter: Arc<dyn StatusPresenter>,
    ) -> Result<Self, ControllerError> {
        settings.validate()?;
        let gate = SensorGate::new(settings.cooldown);
        Ok(Self {
            settings,
            sensor,
            gate,
            connectivity,
            delivery,
            presenter,
            stats: ControllerStats::default(),
            last_detection: None,
            sensor_active: false,
        })
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn detection_count(&self) -> u64 {
        self.stats.delivered
    }

    pub fn link_state(&self) -> LinkState {
        self.connectivity.current_state()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            link: self.connectivity.current_state(),
            sensor_active: self.sensor_active,
            last_detection: self.last_detection.clone(),
            detection_count: self.stats.delivered,
        }
    }

    pub async fn tick(&mut self, now: Timestamp) -> TickReport {
        let previous = self.connectivity.current_state();
        let link = self.connectivity.tick(now).await;
        let transition = (link != previous).then_some((previous, link));
        if let Some((from, to)) = transition {
            self.presenter.link_changed(from, to);
        }

        let raw_level = self.sensor.read_sensor();
        self.sensor_active = raw_level;
        let event = self.gate.sample(raw_level, now);
        if raw_level && event.is_none() {
            self.stats.suppressed_samples += 1;
            debug!(at = %now, "motion detected inside cooldown window");
        }

        let disposition = match &event {
            Some(event) => Some(self.dispatch(event, link).await),
            None => None,
        };

        self.presenter.present(&self.snapshot());

        TickReport {
            link,
            transition,
            event,
            disposition,
        }
    }

    async fn dispatch(&mut self, event: &DetectionEvent, link: LinkState) -> Disposition {
        info!(sequence_id = %event.sequence_id, at = %event.occurred_at, "motion detected");

        let disposition = if link.is_connected() {
            Disposition::from(self.delivery.deliver(event, &self.settings).await)
        } else {
            Disposition::DroppedNoLink
        };

        match &disposition {
            Disposition::Delivered => self.stats.delivered += 1,
            Disposition::Rejected(_) => self.stats.rejected += 1,
            Disposition::TransportFailed(_) => self.stats.transport_failed += 1,
            Disposition::DroppedNoLink => self.stats.dropped_no_link += 1,
        }
        match disposition.clone().into_result() {
            Ok(()) => info!(
                sequence_id = %event.sequence_id,
                total = self.stats.delivered,
                "detection delivered"
            ),
            Err(error) => warn!(
                sequence_id = %event.sequence_id,
                %link,
                code = ?error.code(),
                %error,
                "detection dropped"
            ),
        }

        self.last_detection = Some(DetectionSummary {
            sequence_id: event.sequence_id,
            occurred_at: event.occurred_at,
            disposition: disposition.clone(),
            recorded_at: Utc::now(),
        });
        disposition
    }

    /// Ticks every `period` until `shutdown` resolves. A tick in progress is
    /// always finished before shutdown is observed.
    pub async fn run<F>(&mut self, period: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let period = period.max(MIN_TICK_PERIOD);
        let started = Instant::now();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            device = %self.settings.device_name,
            period_ms = period.as_millis() as u64,
            cooldown_ms = self.settings.cooldown.as_millis() as u64,
            "monitoring motion sensor"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    self.tick(Timestamp::from_millis(elapsed)).await;
                }
            }
        }

        let stats = self.stats;
        info!(
            delivered = stats.delivered,
            rejected = stats.rejected,
            transport_failed = stats.transport_failed,
            dropped_no_link = stats.dropped_no_link,
            suppressed_samples = stats.suppressed_samples,
            "controller stopped"
        );
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
