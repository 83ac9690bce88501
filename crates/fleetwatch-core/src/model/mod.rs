// ── Domain model ──
//
// Canonical fleet entities. Constructed only through the validated
// conversions in `crate::convert`; immutable once published in a snapshot.

pub mod attributes;
pub mod device;
pub mod position;

pub use attributes::{Attributes, BatteryBucket, BatteryLevel};
pub use device::{Device, DeviceId, DeviceStatus, Presence};
pub use position::Position;
