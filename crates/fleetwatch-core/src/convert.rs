// ── Wire-to-domain conversions ──
//
// Bridges the permissive `fleetwatch_api` records into validated domain
// types. A record without identity or without a usable timestamp is
// rejected; every other missing field gets a default.

use fleetwatch_api::{DeviceRecord, PositionRecord};

use crate::error::CoreError;
use crate::model::{Attributes, Device, DeviceId, DeviceStatus, Position};

/// Category used when the server sends none.
pub const DEFAULT_CATEGORY: &str = "default";

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::ValidationFailed {
        message: message.into(),
    }
}

impl TryFrom<DeviceRecord> for Device {
    type Error = CoreError;

    fn try_from(rec: DeviceRecord) -> Result<Self, Self::Error> {
        let id = rec.id.ok_or_else(|| invalid("device record without id"))?;
        let category = rec
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());

        Ok(Device {
            id: DeviceId(id),
            name: rec.name.unwrap_or_default(),
            unique_id: rec.unique_id.unwrap_or_default(),
            status: rec
                .status
                .as_deref()
                .map_or(DeviceStatus::Unknown, DeviceStatus::from_wire),
            last_update: rec.last_update,
            category,
            group_id: rec.group_id,
            disabled: rec.disabled.unwrap_or(false),
            attributes: Attributes::from(rec.attributes),
        })
    }
}

impl TryFrom<PositionRecord> for Position {
    type Error = CoreError;

    fn try_from(rec: PositionRecord) -> Result<Self, Self::Error> {
        let device_id = rec
            .device_id
            .ok_or_else(|| invalid("position record without deviceId"))?;
        let device_time = rec
            .device_time
            .or(rec.fix_time)
            .ok_or_else(|| invalid(format!("position for device {device_id} has no timestamp")))?;
        let (Some(latitude), Some(longitude)) = (rec.latitude, rec.longitude) else {
            return Err(invalid(format!(
                "position for device {device_id} has no coordinates"
            )));
        };

        Ok(Position {
            id: rec.id.unwrap_or_default(),
            device_id: DeviceId(device_id),
            device_time,
            fix_time: rec.fix_time.unwrap_or(device_time),
            latitude,
            longitude,
            speed: rec.speed.unwrap_or(0.0),
            course: rec.course.unwrap_or(0.0),
            attributes: Attributes::from(rec.attributes),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn device_defaults_fill_gaps() {
        let rec = DeviceRecord {
            id: Some(7),
            ..DeviceRecord::default()
        };
        let device = Device::try_from(rec).unwrap();
        assert_eq!(device.id, DeviceId(7));
        assert_eq!(device.status, DeviceStatus::Unknown);
        assert_eq!(device.category, DEFAULT_CATEGORY);
        assert!(!device.disabled);
        assert_eq!(device.name, "");
    }

    #[test]
    fn device_without_id_is_rejected() {
        let rec = DeviceRecord {
            name: Some("ghost".into()),
            ..DeviceRecord::default()
        };
        assert!(matches!(
            Device::try_from(rec),
            Err(CoreError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn position_falls_back_to_fix_time() {
        let fix = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let rec = PositionRecord {
            id: Some(1),
            device_id: Some(3),
            fix_time: Some(fix),
            latitude: Some(52.0),
            longitude: Some(4.0),
            ..PositionRecord::default()
        };
        let pos = Position::try_from(rec).unwrap();
        assert_eq!(pos.device_time, fix);
        assert_eq!(pos.speed, 0.0);
    }

    #[test]
    fn position_requires_device_and_coordinates() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let no_device = PositionRecord {
            device_time: Some(at),
            latitude: Some(1.0),
            longitude: Some(1.0),
            ..PositionRecord::default()
        };
        assert!(Position::try_from(no_device).is_err());

        let no_coords = PositionRecord {
            device_id: Some(1),
            device_time: Some(at),
            ..PositionRecord::default()
        };
        assert!(Position::try_from(no_coords).is_err());
    }
}
