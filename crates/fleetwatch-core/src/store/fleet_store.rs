// ── FleetStore ──

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use fleetwatch_api::{DeviceRecord, PositionRecord};
use tokio::sync::watch;

use super::snapshot::{FleetSnapshot, StoreChange};
use crate::model::{Device, DeviceId, Position};
use crate::stream::SnapshotStream;

/// Central reactive store for live fleet state.
///
/// Readers get immutable `Arc<FleetSnapshot>`s; writers are serialized on
/// an internal lock and publish a complete new snapshot per mutation.
/// Writes are crate-private: outside callers mutate through
/// [`FleetSync`](crate::FleetSync) so selection and the view follow.
pub struct FleetStore {
    state: watch::Sender<Arc<FleetSnapshot>>,
    /// Ids touched since the last `take_dirty()`. The lock also serializes
    /// writers.
    dirty: Mutex<BTreeSet<DeviceId>>,
}

impl FleetStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(Arc::new(FleetSnapshot::default()));
        Self {
            state,
            dirty: Mutex::new(BTreeSet::new()),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<FleetSnapshot> {
        Arc::clone(&self.state.borrow())
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.state.subscribe())
    }

    pub fn device(&self, id: DeviceId) -> Option<Arc<Device>> {
        self.state.borrow().device(id).cloned()
    }

    pub fn position(&self, id: DeviceId) -> Option<Arc<Position>> {
        self.state.borrow().position(id).cloned()
    }

    pub fn device_count(&self) -> usize {
        self.state.borrow().devices().len()
    }

    pub fn version(&self) -> u64 {
        self.state.borrow().version()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state.borrow().updated_at()
    }

    /// Drain the set of device ids touched since the previous call.
    ///
    /// Lets renderers repaint only the rows that changed.
    pub fn take_dirty(&self) -> BTreeSet<DeviceId> {
        std::mem::take(&mut *self.lock())
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Insert or replace devices, keyed by id.
    pub(crate) fn upsert_devices(&self, devices: impl IntoIterator<Item = Device>) -> StoreChange {
        self.commit(|snap, change| {
            for device in devices {
                snap.put_device(device, change);
            }
        })
    }

    /// Record a position fix; older-than-current fixes are dropped.
    pub(crate) fn upsert_position(&self, position: Position) -> StoreChange {
        self.upsert_positions([position])
    }

    pub(crate) fn upsert_positions(
        &self,
        positions: impl IntoIterator<Item = Position>,
    ) -> StoreChange {
        self.commit(|snap, change| {
            for position in positions {
                snap.put_position(position, change);
            }
        })
    }

    /// Apply one live message worth of raw records as a single unit.
    ///
    /// Devices go in before positions. Records that fail validation are
    /// skipped and counted in [`StoreChange::rejected`].
    pub(crate) fn apply_batch(
        &self,
        devices: Vec<DeviceRecord>,
        positions: Vec<PositionRecord>,
    ) -> StoreChange {
        let (devices, rejected_devices) = validate::<_, Device>(devices, "device");
        let (positions, rejected_positions) = validate::<_, Position>(positions, "position");

        let mut change = self.commit(|snap, change| {
            for device in devices {
                snap.put_device(device, change);
            }
            for position in positions {
                snap.put_position(position, change);
            }
        });
        change.rejected = rejected_devices + rejected_positions;
        change
    }

    /// Remove a device and its position.
    pub(crate) fn remove_device(&self, id: DeviceId) -> StoreChange {
        self.commit(|snap, change| snap.drop_device(id, change))
    }

    /// Empty the store.
    pub(crate) fn clear(&self) -> StoreChange {
        self.commit(|snap, change| {
            change.removed.extend(snap.devices.keys().copied());
            change.removed.extend(snap.positions.keys().copied());
            snap.devices.clear();
            snap.positions.clear();
            change.cleared = true;
        })
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Build the next snapshot with `apply` and publish it if anything
    /// changed.
    pub(super) fn commit(
        &self,
        apply: impl FnOnce(&mut FleetSnapshot, &mut StoreChange),
    ) -> StoreChange {
        let mut dirty = self.lock();
        let mut next = FleetSnapshot::clone(&self.state.borrow());
        let mut change = StoreChange {
            version: next.version,
            ..StoreChange::default()
        };

        apply(&mut next, &mut change);
        if change.is_empty() {
            return change;
        }

        next.version += 1;
        next.updated_at = Some(Utc::now());
        change.version = next.version;
        dirty.extend(change.dirty());

        // `send_replace` publishes even with zero receivers.
        self.state.send_replace(Arc::new(next));
        change
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<DeviceId>> {
        self.dirty.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FleetStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert raw records, logging and counting the ones that don't validate.
pub(super) fn validate<R, T>(records: Vec<R>, kind: &'static str) -> (Vec<T>, usize)
where
    T: TryFrom<R, Error = crate::error::CoreError>,
{
    let mut rejected = 0;
    let items = records
        .into_iter()
        .filter_map(|rec| match T::try_from(rec) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(kind, error = %e, "rejecting record");
                rejected += 1;
                None
            }
        })
        .collect();
    (items, rejected)
}
