use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::domain::{LinkState, SequenceId, Timestamp};

use crate::controller::Disposition;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionSummary {
    pub sequence_id: SequenceId,
    pub occurred_at: Timestamp,
    pub disposition: Disposition,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub link: LinkState,
    pub sensor_active: bool,
    pub last_detection: Option<DetectionSummary>,
    pub detection_count: u64,
}

/// Text layout of the 128x64 status panel: title, link line, a large
/// motion glyph, and the delivered count.
pub struct StatusScreen;

impl StatusScreen {
    pub fn render(device_name: &str, status: &StatusSnapshot) -> [String; 4] {
        let link = if status.link.is_connected() {
            "WiFi: OK"
        } else {
            "WiFi: --"
        };
        let glyph = if status.sensor_active { "V" } else { "X" };
        [
            device_name.to_string(),
            link.to_string(),
            glyph.to_string(),
            format!("Count: {}", status.detection_count),
        ]
    }
}
