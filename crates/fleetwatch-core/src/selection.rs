// ── Selection coordinator ──
//
// Owns the single selected device id. The id always refers to a device in
// the store and, after every view recomputation, to one that is visible.

use std::sync::Arc;

use tokio::sync::watch;

use crate::filter::FilteredView;
use crate::model::DeviceId;
use crate::store::{FleetSnapshot, FleetStore, StoreChange};
use crate::sync::StoreObserver;

pub struct SelectionCoordinator {
    store: Arc<FleetStore>,
    selected: watch::Sender<Option<DeviceId>>,
}

impl SelectionCoordinator {
    pub fn new(store: Arc<FleetStore>) -> Self {
        let (selected, _) = watch::channel(None);
        Self { store, selected }
    }

    pub fn selected(&self) -> Option<DeviceId> {
        *self.selected.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DeviceId>> {
        self.selected.subscribe()
    }

    /// Select `id` if the store knows the device; an unknown id leaves the
    /// selection as it was. Returns whether `id` is now selected.
    pub fn select(&self, id: DeviceId) -> bool {
        if self.store.device(id).is_none() {
            tracing::debug!(device_id = %id, "ignoring selection of unknown device");
            return false;
        }
        self.set(Some(id));
        true
    }

    pub fn clear(&self) {
        self.set(None);
    }

    /// Drop the selection if the view no longer shows it. Returns `true`
    /// when the selection was cleared.
    pub fn reconcile(&self, view: &FilteredView) -> bool {
        let Some(id) = self.selected() else {
            return false;
        };
        if view.contains(id) {
            return false;
        }
        tracing::debug!(device_id = %id, "selected device left the view");
        self.clear();
        true
    }

    fn set(&self, next: Option<DeviceId>) {
        self.selected.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

impl StoreObserver for SelectionCoordinator {
    fn store_changed(&self, _snapshot: &FleetSnapshot, change: &StoreChange) {
        let Some(id) = self.selected() else {
            return;
        };
        if change.cleared || change.removed.contains(&id) {
            tracing::debug!(device_id = %id, "selected device removed");
            self.clear();
        }
    }
}
