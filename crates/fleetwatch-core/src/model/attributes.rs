// ── Free-form attribute bag ──
//
// Devices and positions carry a server-defined attribute map. Well-known
// keys get typed accessors; everything else stays raw JSON. Insertion
// order is preserved so display output follows the server's ordering.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ALARM: &str = "alarm";
pub const IGNITION: &str = "ignition";
pub const BATTERY_LEVEL: &str = "batteryLevel";
pub const CHARGE: &str = "charge";
pub const MOTION: &str = "motion";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(IndexMap<String, Value>);

impl Attributes {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Numbers, or strings holding a number (some trackers send both).
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Booleans, plus the `"true"`/`"false"` and `0`/`1` encodings.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            _ => None,
        }
    }

    /// Value rendered for display: strings unquoted, `null` as absent.
    pub fn get_display(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    // ── Well-known keys ──────────────────────────────────────────────

    /// Active alarm code(s), e.g. `"sos"` or `"overspeed,powerCut"`.
    pub fn alarm(&self) -> Option<&str> {
        self.get_str(ALARM).filter(|s| !s.is_empty())
    }

    pub fn ignition(&self) -> Option<bool> {
        self.get_bool(IGNITION)
    }

    pub fn motion(&self) -> Option<bool> {
        self.get_bool(MOTION)
    }

    pub fn charge(&self) -> Option<bool> {
        self.get_bool(CHARGE)
    }

    /// Battery percentage, if reported.
    pub fn battery_level(&self) -> Option<f64> {
        self.get_f64(BATTERY_LEVEL)
    }

    /// Battery indicator combining level and charging flag.
    pub fn battery(&self) -> Option<BatteryLevel> {
        let percent = self.battery_level()?;
        Some(BatteryLevel {
            percent,
            bucket: BatteryBucket::for_percent(percent),
            charging: self.charge().unwrap_or(false),
        })
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<serde_json::Map<String, Value>> for Attributes {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

// ── Battery ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BatteryBucket {
    High,
    Medium,
    Low,
}

impl BatteryBucket {
    /// Above 70 is high, above 30 medium, the rest low.
    pub fn for_percent(percent: f64) -> Self {
        if percent > 70.0 {
            Self::High
        } else if percent > 30.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryLevel {
    pub percent: f64,
    pub bucket: BatteryBucket,
    pub charging: bool,
}
