// Raw wire records as the tracking server sends them.
//
// Every field is optional: the core decides per entity whether a record is
// usable, so one bad record never poisons the rest of its batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A device as returned by `GET /api/devices` or pushed on the live channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub unique_id: Option<String>,
    pub status: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub group_id: Option<i64>,
    pub disabled: Option<bool>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// A position fix as returned by `GET /api/positions` or pushed live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub id: Option<i64>,
    pub device_id: Option<i64>,
    pub device_time: Option<DateTime<Utc>>,
    pub fix_time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Knots.
    pub speed: Option<f64>,
    pub course: Option<f64>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// The authenticated user returned by `GET /api/session`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub administrator: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Decode a JSON array element by element, dropping (and logging) the
/// elements that do not fit `T`. Keeps one malformed record from failing a
/// whole snapshot or live batch.
pub(crate) fn decode_records<T: serde::de::DeserializeOwned>(
    values: Vec<Value>,
    kind: &'static str,
) -> Vec<T> {
    let total = values.len();
    let records: Vec<T> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value) {
            Ok(rec) => Some(rec),
            Err(e) => {
                tracing::warn!(error = %e, kind, "dropping undecodable record");
                None
            }
        })
        .collect();
    if records.len() < total {
        tracing::debug!(kind, total, kept = records.len(), "partial batch decode");
    }
    records
}
