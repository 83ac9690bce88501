// ── FleetSync facade ──
//
// Single entry point for consumers. Every store mutation goes through here
// so observers run in a fixed order after each applied change:
//
//   1. selection drops ids the change removed
//   2. the filtered view is recomputed and published
//   3. selection is reconciled against the new view
//   4. registered observers run

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use arc_swap::ArcSwap;
use fleetwatch_api::{DeviceRecord, PositionRecord};
use serde::Serialize;
use tokio::sync::watch;

use crate::filter::{FilterCriteria, FilteredView, ViewOptions, filter_snapshot};
use crate::model::{Device, DeviceId, DeviceStatus, Position};
use crate::selection::SelectionCoordinator;
use crate::store::{DeviceMap, FleetSnapshot, FleetStore, PositionMap, StoreChange};
use crate::stream::SnapshotStream;

/// Receives every applied store change, after the snapshot is published.
pub trait StoreObserver: Send + Sync {
    fn store_changed(&self, snapshot: &FleetSnapshot, change: &StoreChange);
}

// ── FleetStats ──────────────────────────────────────────────────────

/// Dashboard counters over the whole fleet (not the filtered view).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetStats {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    /// Devices whose latest fix has non-zero speed.
    pub moving: usize,
}

impl FleetStats {
    pub fn from_snapshot(snapshot: &FleetSnapshot) -> Self {
        let devices = snapshot.devices();
        let count = |status: DeviceStatus| devices.values().filter(|d| d.status == status).count();
        Self {
            total: devices.len(),
            online: count(DeviceStatus::Online),
            offline: count(DeviceStatus::Offline),
            moving: snapshot
                .positions()
                .values()
                .filter(|p| p.is_moving() && devices.contains_key(&p.device_id))
                .count(),
        }
    }
}

// ── FleetSync ───────────────────────────────────────────────────────

pub struct FleetSync {
    store: Arc<FleetStore>,
    selection: SelectionCoordinator,
    criteria: ArcSwap<FilterCriteria>,
    options: ViewOptions,
    view: watch::Sender<Arc<FilteredView>>,
    observers: RwLock<Vec<Arc<dyn StoreObserver>>>,
    /// Serializes mutate-then-notify so views publish in version order.
    publish: Mutex<()>,
}

impl FleetSync {
    pub fn new(options: ViewOptions) -> Self {
        Self::with_criteria(options, FilterCriteria::default())
    }

    pub fn with_criteria(options: ViewOptions, criteria: FilterCriteria) -> Self {
        let store = Arc::new(FleetStore::new());
        let (view, _) = watch::channel(Arc::new(FilteredView::default()));
        Self {
            selection: SelectionCoordinator::new(Arc::clone(&store)),
            store,
            criteria: ArcSwap::from_pointee(criteria),
            options,
            view,
            observers: RwLock::new(Vec::new()),
            publish: Mutex::new(()),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn StoreObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub fn upsert_devices(&self, devices: impl IntoIterator<Item = Device>) -> StoreChange {
        self.mutate(|store| store.upsert_devices(devices))
    }

    pub fn upsert_position(&self, position: Position) -> StoreChange {
        self.mutate(|store| store.upsert_position(position))
    }

    /// Apply one live message worth of records atomically.
    pub fn apply_batch(
        &self,
        devices: Vec<DeviceRecord>,
        positions: Vec<PositionRecord>,
    ) -> StoreChange {
        self.mutate(|store| store.apply_batch(devices, positions))
    }

    /// Replace the fleet with an authoritative snapshot.
    pub fn replace_all(
        &self,
        devices: Vec<DeviceRecord>,
        positions: Vec<PositionRecord>,
    ) -> StoreChange {
        self.mutate(|store| store.replace_all_records(devices, positions))
    }

    pub fn remove_device(&self, id: DeviceId) -> StoreChange {
        self.mutate(|store| store.remove_device(id))
    }

    /// Empty the store. Selection goes with it.
    pub fn clear(&self) -> StoreChange {
        self.mutate(FleetStore::clear)
    }

    // ── Filter & selection ───────────────────────────────────────────

    pub fn criteria(&self) -> Arc<FilterCriteria> {
        self.criteria.load_full()
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    /// Swap the active criteria, recompute the view and reconcile
    /// selection against it.
    pub fn set_criteria(&self, criteria: FilterCriteria) {
        let _guard = self.lock_publish();
        self.criteria.store(Arc::new(criteria));
        let view = self.recompute(&self.store.snapshot());
        self.selection.reconcile(&view);
    }

    /// Select a device that exists and is visible in the current view.
    /// Anything else is ignored. Returns whether `id` is now selected.
    pub fn select(&self, id: DeviceId) -> bool {
        let _guard = self.lock_publish();
        if self.store.device(id).is_some() && !self.view.borrow().contains(id) {
            tracing::debug!(device_id = %id, "ignoring selection of hidden device");
            return false;
        }
        self.selection.select(id)
    }

    pub fn clear_selection(&self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> Option<DeviceId> {
        self.selection.selected()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Option<DeviceId>> {
        self.selection.subscribe()
    }

    pub fn selected_device(&self) -> Option<Arc<Device>> {
        self.selection().and_then(|id| self.store.device(id))
    }

    pub fn selected_position(&self) -> Option<Arc<Position>> {
        self.selection().and_then(|id| self.store.position(id))
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn store(&self) -> &Arc<FleetStore> {
        &self.store
    }

    pub fn snapshot(&self) -> Arc<FleetSnapshot> {
        self.store.snapshot()
    }

    pub fn devices(&self) -> DeviceMap {
        self.store.snapshot().devices().clone()
    }

    pub fn positions(&self) -> PositionMap {
        self.store.snapshot().positions().clone()
    }

    /// View under the active criteria, as last published.
    pub fn filtered_view(&self) -> Arc<FilteredView> {
        Arc::clone(&self.view.borrow())
    }

    /// Ad-hoc view under other criteria. Does not touch the active view or
    /// selection.
    pub fn filtered_view_with(&self, criteria: &FilterCriteria) -> FilteredView {
        filter_snapshot(&self.store.snapshot(), criteria, &self.options)
    }

    pub fn subscribe_view(&self) -> SnapshotStream<FilteredView> {
        SnapshotStream::new(self.view.subscribe())
    }

    pub fn subscribe_snapshots(&self) -> SnapshotStream {
        self.store.subscribe()
    }

    pub fn stats(&self) -> FleetStats {
        FleetStats::from_snapshot(&self.store.snapshot())
    }

    pub fn take_dirty(&self) -> BTreeSet<DeviceId> {
        self.store.take_dirty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn mutate(&self, apply: impl FnOnce(&FleetStore) -> StoreChange) -> StoreChange {
        let _guard = self.lock_publish();
        let change = apply(&self.store);
        if change.is_empty() {
            return change;
        }

        let snapshot = self.store.snapshot();
        self.selection.store_changed(&snapshot, &change);
        let view = self.recompute(&snapshot);
        self.selection.reconcile(&view);

        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.store_changed(&snapshot, &change);
        }
        change
    }

    fn recompute(&self, snapshot: &FleetSnapshot) -> Arc<FilteredView> {
        let view = Arc::new(filter_snapshot(snapshot, &self.criteria.load(), &self.options));
        self.view.send_replace(Arc::clone(&view));
        view
    }

    fn lock_publish(&self) -> std::sync::MutexGuard<'_, ()> {
        self.publish.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FleetSync {
    fn default() -> Self {
        Self::new(ViewOptions::default())
    }
}
