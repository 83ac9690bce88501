//! Real-time fleet state synchronization engine.
//!
//! This crate owns the live fleet state between `fleetwatch-api` and the
//! presentation consumers (CLI, map/list views):
//!
//! - **[`FleetStore`]**: canonical device and latest-position mappings.
//!   Every mutation is applied as one atomic unit and published as an
//!   immutable [`FleetSnapshot`] through a `watch` channel, so readers never
//!   observe a half-applied batch. Positions are monotonic per device.
//!
//! - **[`filter()`]**: pure projection from a snapshot and
//!   [`FilterCriteria`] to a sorted [`FilteredView`].
//!
//! - **[`SelectionCoordinator`]**: the single selected device id, kept
//!   consistent with the store and the active filtered view.
//!
//! - **[`FleetSync`]**: facade that routes every mutation through the
//!   store and then notifies observers in a fixed order (selection, view
//!   recomputation, selection reconciliation). Exposes the read surface.
//!
//! - **[`ConnectionManager`]**: owns the live channel: state machine,
//!   resync on every open, exponential backoff with jitter, auth-loss
//!   handling. The only writer into the store.
//!
//! - **[`AssetGate`]**: bounded-time readiness signal for device-category
//!   icons, with irreversible fallback substitution.

pub mod assets;
pub mod config;
pub mod connection;
pub mod convert;
pub mod error;
pub mod filter;
pub mod model;
pub mod selection;
pub mod store;
pub mod stream;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use assets::{AssetGate, AssetLoader, DirAssetLoader, ReadySignal, icon_key};
pub use config::{SyncConfig, TlsVerification};
pub use connection::{
    AuthEvent, ConnectionManager, ConnectionState, ConnectionStatus, Connector, HttpConnector,
    LiveSource, ReconnectConfig,
};
pub use error::CoreError;
pub use filter::{FilterCriteria, FilteredView, SortKey, ViewOptions, filter};
pub use selection::SelectionCoordinator;
pub use store::{FleetSnapshot, FleetStore, StoreChange};
pub use stream::SnapshotStream;
pub use sync::{FleetStats, FleetSync, StoreObserver};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Attributes, BatteryBucket, BatteryLevel, Device, DeviceId, DeviceStatus, Position, Presence,
};
