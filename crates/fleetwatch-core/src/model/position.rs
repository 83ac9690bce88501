// ── Position domain type ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attributes::Attributes;
use super::device::DeviceId;

/// A location fix. The store keeps only the latest one per device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: i64,
    pub device_id: DeviceId,
    /// Timestamp reported by the device; the ordering key for staleness.
    pub device_time: DateTime<Utc>,
    pub fix_time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Knots.
    pub speed: f64,
    pub course: f64,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Position {
    pub fn is_moving(&self) -> bool {
        self.speed > 0.0
    }

    /// `true` when `self` may replace `stored`: its device time must be
    /// strictly later.
    pub fn is_newer_than(&self, stored: &Position) -> bool {
        self.device_time > stored.device_time
    }
}
