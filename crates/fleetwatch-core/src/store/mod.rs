// ── Fleet state store ──
//
// Canonical device and latest-position mappings. Writers build the next
// snapshot off to the side and publish it in one `watch` send, so every
// mutation (single upsert, live batch, full resync, clear) is atomic from
// a reader's point of view.

mod fleet_store;
mod refresh;
mod snapshot;

pub use fleet_store::FleetStore;
pub use snapshot::{DeviceMap, FleetSnapshot, PositionMap, StoreChange};
