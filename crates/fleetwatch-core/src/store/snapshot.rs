// ── Immutable store snapshot ──

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::{Device, DeviceId, Position};

pub type DeviceMap = HashMap<DeviceId, Arc<Device>>;
pub type PositionMap = HashMap<DeviceId, Arc<Position>>;

/// Point-in-time view of the whole fleet.
///
/// Cheap to share (`Arc<FleetSnapshot>`); never mutated after publication.
#[derive(Debug, Clone, Default)]
pub struct FleetSnapshot {
    pub(super) devices: DeviceMap,
    pub(super) positions: PositionMap,
    pub(super) version: u64,
    pub(super) updated_at: Option<DateTime<Utc>>,
}

impl FleetSnapshot {
    pub fn devices(&self) -> &DeviceMap {
        &self.devices
    }

    /// Latest position per device.
    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    pub fn device(&self, id: DeviceId) -> Option<&Arc<Device>> {
        self.devices.get(&id)
    }

    pub fn position(&self, id: DeviceId) -> Option<&Arc<Position>> {
        self.positions.get(&id)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    /// Bumped once per applied mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Wall-clock time of the last applied mutation.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.positions.is_empty()
    }

    // ── Mutation (store-internal) ────────────────────────────────────

    pub(super) fn put_device(&mut self, device: Device, change: &mut StoreChange) {
        let id = device.id;
        if self.devices.get(&id).is_some_and(|cur| **cur == device) {
            return;
        }
        self.devices.insert(id, Arc::new(device));
        change.removed.remove(&id);
        change.devices.insert(id);
    }

    /// Insert unless the stored fix for the device is as new or newer.
    pub(super) fn put_position(&mut self, position: Position, change: &mut StoreChange) {
        let id = position.device_id;
        if let Some(current) = self.positions.get(&id) {
            if !position.is_newer_than(current) {
                tracing::debug!(
                    device_id = %id,
                    current = %current.device_time,
                    incoming = %position.device_time,
                    "dropping stale position"
                );
                change.stale += 1;
                return;
            }
        }
        self.positions.insert(id, Arc::new(position));
        change.positions.insert(id);
    }

    /// Remove a device together with its position.
    pub(super) fn drop_device(&mut self, id: DeviceId, change: &mut StoreChange) {
        let had_device = self.devices.remove(&id).is_some();
        let had_position = self.positions.remove(&id).is_some();
        if had_device || had_position {
            change.devices.remove(&id);
            change.positions.remove(&id);
            change.removed.insert(id);
        }
    }
}

// ── StoreChange ─────────────────────────────────────────────────────

/// Summary of one applied mutation, handed to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreChange {
    /// Snapshot version the change produced. Unchanged when nothing applied.
    pub version: u64,
    /// Devices inserted or replaced.
    pub devices: BTreeSet<DeviceId>,
    /// Devices whose latest position changed.
    pub positions: BTreeSet<DeviceId>,
    /// Devices removed (with their positions).
    pub removed: BTreeSet<DeviceId>,
    /// The whole store was emptied.
    pub cleared: bool,
    /// Positions dropped for being older than the stored fix.
    pub stale: usize,
    /// Records dropped during validation.
    pub rejected: usize,
}

impl StoreChange {
    /// `true` when the mutation left the store untouched.
    pub fn is_empty(&self) -> bool {
        !self.cleared
            && self.devices.is_empty()
            && self.positions.is_empty()
            && self.removed.is_empty()
    }

    /// Every device id the change touched.
    pub fn dirty(&self) -> BTreeSet<DeviceId> {
        self.devices
            .iter()
            .chain(&self.positions)
            .chain(&self.removed)
            .copied()
            .collect()
    }
}
