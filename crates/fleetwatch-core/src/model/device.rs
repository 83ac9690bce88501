// ── Device domain types ──

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::attributes::Attributes;

// ── DeviceId ────────────────────────────────────────────────────────

/// Server-assigned device identifier. Also the key positions are indexed by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl DeviceId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DeviceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for DeviceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// ── DeviceStatus ────────────────────────────────────────────────────

/// Connectivity status as reported by the server.
///
/// Ordering is the status sort order: online first.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl DeviceStatus {
    /// Parse a wire status string. Anything unrecognized is `Unknown`.
    pub fn from_wire(raw: &str) -> Self {
        raw.trim().parse().unwrap_or_default()
    }

    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

// ── Presence ────────────────────────────────────────────────────────

/// What a list row shows in its status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Online, or no last-update timestamp to be relative to.
    Status(DeviceStatus),
    /// Offline or unknown, last heard from this long ago.
    LastSeen(Duration),
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::LastSeen(ago) => write!(f, "{} ago", humantime::format_duration(coarse(*ago))),
        }
    }
}

/// Round to the largest whole unit so "3h 12m 5s" reads as "3h".
fn coarse(ago: Duration) -> Duration {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;

    let secs = ago.as_secs();
    let unit = match secs {
        s if s >= DAY => DAY,
        s if s >= HOUR => HOUR,
        s if s >= MINUTE => MINUTE,
        _ => 1,
    };
    Duration::from_secs(secs / unit * unit)
}

// ── Device ──────────────────────────────────────────────────────────

/// A tracked device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub unique_id: String,
    pub status: DeviceStatus,
    pub last_update: Option<DateTime<Utc>>,
    pub category: String,
    pub group_id: Option<i64>,
    pub disabled: bool,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Device {
    /// Status label for online devices, otherwise time since last update.
    pub fn presence(&self, now: DateTime<Utc>) -> Presence {
        match self.last_update {
            Some(seen) if !self.status.is_online() => {
                let ago = (now - seen).to_std().unwrap_or_default();
                Presence::LastSeen(ago)
            }
            _ => Presence::Status(self.status),
        }
    }

    /// Resolve a display attribute by key.
    ///
    /// Built-in fields (`id`, `name`, `uniqueId`, `status`, `category`,
    /// `groupId`) win; anything else is looked up in the attribute bag.
    pub fn display_attribute(&self, key: &str) -> Option<String> {
        match key {
            "id" => Some(self.id.to_string()),
            "name" => Some(self.name.clone()),
            "uniqueId" | "unique_id" => Some(self.unique_id.clone()),
            "status" => Some(self.status.to_string()),
            "category" => Some(self.category.clone()),
            "groupId" | "group_id" => self.group_id.map(|g| g.to_string()),
            other => self.attributes.get_display(other),
        }
    }
}
