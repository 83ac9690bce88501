// ── Filtered, sorted fleet view ──
//
// Pure projection from a store snapshot and a set of criteria to the
// device list and map markers the views render. No side effects; the same
// inputs always produce the same output.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::{Device, DeviceId, DeviceStatus, Position};
use crate::store::{DeviceMap, FleetSnapshot, PositionMap};

// ── Criteria ────────────────────────────────────────────────────────

/// User-controlled filter state.
///
/// Empty `statuses` / `groups` sets mean "no restriction".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterCriteria {
    /// Case-insensitive substring, matched against name, unique id and the
    /// secondary display attribute.
    pub keyword: String,
    pub statuses: BTreeSet<DeviceStatus>,
    pub groups: BTreeSet<i64>,
    pub show_offline: bool,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            statuses: BTreeSet::new(),
            groups: BTreeSet::new(),
            show_offline: true,
        }
    }
}

impl FilterCriteria {
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = DeviceStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = i64>) -> Self {
        self.groups = groups.into_iter().collect();
        self
    }

    pub fn hide_offline(mut self) -> Self {
        self.show_offline = false;
        self
    }

    /// `true` when the criteria let every device through.
    pub fn is_unrestricted(&self) -> bool {
        self.keyword.is_empty()
            && self.statuses.is_empty()
            && self.groups.is_empty()
            && self.show_offline
    }
}

// ── View options ────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SortKey {
    /// Case-insensitive name.
    #[default]
    Name,
    UniqueId,
    /// Most recently updated first; never-seen devices last.
    LastUpdate,
    /// Online, offline, unknown.
    Status,
}

/// Display preferences that shape the view but are not user filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewOptions {
    pub sort: SortKey,
    /// Attribute used as the row title. `None` means the device name.
    pub primary_attribute: Option<String>,
    /// Attribute shown under the row title and included in keyword
    /// matching (e.g. `"phone"`, `"model"`).
    pub secondary_attribute: Option<String>,
}

impl ViewOptions {
    /// Row title for `device`, falling back to its name.
    pub fn primary_label(&self, device: &Device) -> String {
        self.primary_attribute
            .as_deref()
            .and_then(|key| device.display_attribute(key))
            .unwrap_or_else(|| device.name.clone())
    }

    pub fn secondary_label(&self, device: &Device) -> Option<String> {
        self.secondary_attribute
            .as_deref()
            .and_then(|key| device.display_attribute(key))
    }
}

// ── FilteredView ────────────────────────────────────────────────────

/// Result of [`filter()`].
#[derive(Debug, Clone, Default)]
pub struct FilteredView {
    /// Devices passing the criteria, in sort order.
    pub devices: Vec<Arc<Device>>,
    /// Latest positions of those devices, in the same order.
    pub positions: Vec<Arc<Position>>,
}

impl FilteredView {
    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.iter().any(|d| d.id == id)
    }

    pub fn device_ids(&self) -> HashSet<DeviceId> {
        self.devices.iter().map(|d| d.id).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

// ── filter() ────────────────────────────────────────────────────────

/// Project devices and positions through `criteria`.
///
/// Ties in the sort key are broken by ascending id, so output order is
/// fully deterministic.
pub fn filter(
    devices: &DeviceMap,
    positions: &PositionMap,
    criteria: &FilterCriteria,
    options: &ViewOptions,
) -> FilteredView {
    let keyword = criteria.keyword.to_lowercase();
    let secondary = options.secondary_attribute.as_deref();

    let mut matched: Vec<Arc<Device>> = devices
        .values()
        .filter(|d| passes(d, criteria, &keyword, secondary))
        .cloned()
        .collect();

    sort_devices(&mut matched, options.sort);

    let positions = matched
        .iter()
        .filter_map(|d| positions.get(&d.id).cloned())
        .collect();

    FilteredView {
        devices: matched,
        positions,
    }
}

/// [`filter()`] over a whole snapshot.
pub fn filter_snapshot(
    snapshot: &FleetSnapshot,
    criteria: &FilterCriteria,
    options: &ViewOptions,
) -> FilteredView {
    filter(snapshot.devices(), snapshot.positions(), criteria, options)
}

fn passes(
    device: &Device,
    criteria: &FilterCriteria,
    keyword: &str,
    secondary: Option<&str>,
) -> bool {
    if !criteria.statuses.is_empty() && !criteria.statuses.contains(&device.status) {
        return false;
    }
    if !criteria.groups.is_empty()
        && !device
            .group_id
            .is_some_and(|g| criteria.groups.contains(&g))
    {
        return false;
    }
    if !criteria.show_offline && device.status == DeviceStatus::Offline {
        return false;
    }
    keyword.is_empty() || matches_keyword(device, keyword, secondary)
}

fn matches_keyword(device: &Device, keyword: &str, secondary: Option<&str>) -> bool {
    let hit = |s: &str| s.to_lowercase().contains(keyword);
    hit(&device.name)
        || hit(&device.unique_id)
        || secondary
            .and_then(|key| device.display_attribute(key))
            .is_some_and(|value| hit(&value))
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Text(String),
    Time(Reverse<Option<DateTime<Utc>>>),
    Status(DeviceStatus),
}

fn sort_devices(devices: &mut [Arc<Device>], key: SortKey) {
    devices.sort_by_cached_key(|d| {
        let value = match key {
            SortKey::Name => SortValue::Text(d.name.to_lowercase()),
            SortKey::UniqueId => SortValue::Text(d.unique_id.clone()),
            SortKey::LastUpdate => SortValue::Time(Reverse(d.last_update)),
            SortKey::Status => SortValue::Status(d.status),
        };
        (value, d.id)
    });
}
