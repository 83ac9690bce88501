//! Async transport for fleet tracking servers.
//!
//! Two surfaces, both consumed by `fleetwatch-core`:
//!
//! - **[`FleetClient`]**: REST client for session bootstrap/teardown and the
//!   `/api/devices` + `/api/positions` snapshots.
//! - **[`LiveChannel`]**: the persistent WebSocket update channel, plus
//!   [`decode_frame`] which turns a text frame into [`LiveMessage`]s.
//!
//! Wire records ([`DeviceRecord`], [`PositionRecord`]) are permissive:
//! every field is optional and validation happens per entity in the core.

pub mod client;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use client::FleetClient;
pub use error::Error;
pub use models::{DeviceRecord, PositionRecord, SessionUser};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{ENVELOPE_VERSION, LiveChannel, LiveMessage, decode_frame};
