use std::time::Duration;

use shared::domain::{DetectionEvent, SequenceId, Timestamp};

/// Cooldown gate over raw sensor levels. Holds no clock; every decision is a
/// function of the arguments and the last accepted timestamp.
#[derive(Debug, Clone)]
pub struct SensorGate {
    cooldown: Duration,
    last_accepted_at: Option<Timestamp>,
    sequence: u64,
}

impl SensorGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted_at: None,
            sequence: 0,
        }
    }

    pub fn last_accepted_at(&self) -> Option<Timestamp> {
        self.last_accepted_at
    }

    /// True when an active level at `now` would be suppressed.
    pub fn in_cooldown(&self, now: Timestamp) -> bool {
        match self.last_accepted_at {
            Some(last) => now.saturating_duration_since(last) < self.cooldown,
            None => false,
        }
    }

    pub fn sample(&mut self, raw_level: bool, now: Timestamp) -> Option<DetectionEvent> {
        if !raw_level || self.in_cooldown(now) {
            return None;
        }

        self.last_accepted_at = Some(now);
        self.sequence += 1;
        Some(DetectionEvent {
            occurred_at: now,
            sequence_id: SequenceId(self.sequence),
        })
    }
}
