// ── Full resync application ──
//
// Applies an authoritative REST snapshot on top of whatever the live
// channel already delivered. Upsert-then-prune inside one commit, so
// readers go straight from the old fleet to the new one with no empty
// state in between.

use std::collections::HashSet;

use fleetwatch_api::{DeviceRecord, PositionRecord};

use super::FleetStore;
use super::fleet_store::validate;
use super::snapshot::StoreChange;
use crate::model::{Device, DeviceId, Position};

impl FleetStore {
    /// Replace the fleet with a full snapshot.
    ///
    /// Devices absent from `devices` are removed with their positions.
    /// Positions still obey the staleness rule, so a live fix that raced
    /// ahead of the snapshot is kept.
    pub(crate) fn replace_all(&self, devices: Vec<Device>, positions: Vec<Position>) -> StoreChange {
        let incoming: HashSet<DeviceId> = devices.iter().map(|d| d.id).collect();

        self.commit(|snap, change| {
            for device in devices {
                snap.put_device(device, change);
            }
            for position in positions {
                if incoming.contains(&position.device_id) {
                    snap.put_position(position, change);
                }
            }
            let existing: Vec<DeviceId> = snap
                .devices
                .keys()
                .chain(snap.positions.keys())
                .copied()
                .collect();
            for id in existing {
                if !incoming.contains(&id) {
                    snap.drop_device(id, change);
                }
            }
        })
    }

    /// [`replace_all`](Self::replace_all) over raw wire records.
    pub(crate) fn replace_all_records(
        &self,
        devices: Vec<DeviceRecord>,
        positions: Vec<PositionRecord>,
    ) -> StoreChange {
        let (devices, rejected_devices) = validate::<_, Device>(devices, "device");
        let (positions, rejected_positions) = validate::<_, Position>(positions, "position");

        let mut change = self.replace_all(devices, positions);
        change.rejected = rejected_devices + rejected_positions;
        tracing::debug!(
            version = change.version,
            upserted = change.devices.len(),
            removed = change.removed.len(),
            rejected = change.rejected,
            "applied full resync"
        );
        change
    }
}
