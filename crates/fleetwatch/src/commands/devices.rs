//! Device listing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use fleetwatch_core::{
    AssetGate, Attributes, Device, DirAssetLoader, FilteredView, FleetSnapshot, Position,
    SyncConfig, ViewOptions, icon_key,
};

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Info")]
    info: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Icon")]
    icon: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Flags")]
    flags: String,
    #[tabled(rename = "Position")]
    position: String,
}

/// One device with its latest fix, as serialized by `--output json|yaml`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    #[serde(flatten)]
    pub device: Arc<Device>,
    pub position: Option<Arc<Position>>,
}

/// Everything a row needs besides the device itself.
pub struct RowContext<'a> {
    pub options: &'a ViewOptions,
    pub now: DateTime<Utc>,
    pub color: bool,
    pub icons: Option<&'a AssetGate<DirAssetLoader>>,
}

impl RowContext<'_> {
    pub fn row(&self, entry: &DeviceEntry) -> DeviceRow {
        let d = &entry.device;
        let pos = entry.position.as_deref();
        // Live telemetry lives on the fix; fall back to device attributes.
        let attrs = pos.map_or(&d.attributes, |p| &p.attributes);

        DeviceRow {
            id: d.id.to_string(),
            name: self.options.primary_label(d),
            info: self.options.secondary_label(d).unwrap_or_default(),
            status: output::paint_status(&d.presence(self.now).to_string(), d.status, self.color),
            icon: self.icon(d),
            battery: battery(attrs),
            flags: flags(attrs),
            position: pos.map(format_position).unwrap_or_default(),
        }
    }

    fn icon(&self, device: &Device) -> String {
        let key = icon_key(&device.category);
        match self.icons {
            Some(gate) if gate.is_fallback(&device.category) => format!("{key}*"),
            _ => key.to_owned(),
        }
    }
}

fn battery(attrs: &Attributes) -> String {
    attrs.battery().map_or_else(String::new, |b| {
        let charging = if b.charging { " +" } else { "" };
        format!("{:.0}% {}{charging}", b.percent, b.bucket)
    })
}

fn flags(attrs: &Attributes) -> String {
    let mut flags = Vec::new();
    if let Some(alarm) = attrs.alarm() {
        flags.push(format!("alarm:{alarm}"));
    }
    if attrs.ignition() == Some(true) {
        flags.push("ignition".into());
    }
    if attrs.motion() == Some(true) {
        flags.push("motion".into());
    }
    flags.join(" ")
}

fn format_position(p: &Position) -> String {
    if p.is_moving() {
        format!("{:.5}, {:.5} @ {:.0} kn", p.latitude, p.longitude, p.speed)
    } else {
        format!("{:.5}, {:.5}", p.latitude, p.longitude)
    }
}

/// Pair each visible device with its latest fix.
pub fn entries(view: &FilteredView, snapshot: &FleetSnapshot) -> Vec<DeviceEntry> {
    view.devices
        .iter()
        .map(|d| DeviceEntry {
            device: Arc::clone(d),
            position: snapshot.position(d.id).cloned(),
        })
        .collect()
}

/// Icon gate over the configured asset directory, if any.
pub fn icon_gate(config: &SyncConfig) -> Option<AssetGate<DirAssetLoader>> {
    let dir = config.assets_dir.as_ref()?;
    Some(AssetGate::new(DirAssetLoader::new(dir), config.asset_timeout))
}

/// Wait (bounded by the gate timeout) for the icons of `view`.
pub async fn prepare_icons(gate: &AssetGate<DirAssetLoader>, view: &FilteredView) {
    gate.ensure_ready(view.devices.iter().map(|d| d.category.as_str()))
        .wait()
        .await;
}

pub fn render(
    global: &GlobalOpts,
    ctx: &RowContext<'_>,
    entries: &[DeviceEntry],
) -> Result<String, CliError> {
    output::render_list(&global.output, entries, |e| ctx.row(e), |e| {
        e.device.id.to_string()
    })
}

pub async fn handle(
    config: &SyncConfig,
    args: &DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (options, criteria) = super::view_settings(config, &args.filter);
    let sync = super::load_fleet(config, options, criteria).await?;

    let view = sync.filtered_view();
    let icons = icon_gate(config);
    if let Some(ref gate) = icons {
        prepare_icons(gate, &view).await;
    }
    let ctx = RowContext {
        options: sync.options(),
        now: Utc::now(),
        color: output::should_color(&global.color),
        icons: icons.as_ref(),
    };

    let out = render(global, &ctx, &entries(&view, &sync.snapshot()))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fleetwatch_core::{DeviceId, DeviceStatus};
    use serde_json::json;

    fn device() -> Device {
        Device {
            id: DeviceId(3),
            name: "Truck 3".into(),
            unique_id: "352093".into(),
            status: DeviceStatus::Offline,
            last_update: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            category: "Truck".into(),
            group_id: None,
            disabled: false,
            attributes: [("plate".to_owned(), json!("KX-118"))].into_iter().collect(),
        }
    }

    fn position() -> Position {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        Position {
            id: 1,
            device_id: DeviceId(3),
            device_time: at,
            fix_time: at,
            latitude: 52.520_008,
            longitude: 13.404_954,
            speed: 12.4,
            course: 90.0,
            attributes: [
                ("batteryLevel".to_owned(), json!(82)),
                ("charge".to_owned(), json!(true)),
                ("ignition".to_owned(), json!(true)),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn row_shows_presence_telemetry_and_labels() {
        let options = ViewOptions {
            secondary_attribute: Some("plate".into()),
            ..ViewOptions::default()
        };
        let ctx = RowContext {
            options: &options,
            now: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            color: false,
            icons: None,
        };
        let row = ctx.row(&DeviceEntry {
            device: Arc::new(device()),
            position: Some(Arc::new(position())),
        });

        assert_eq!(row.name, "Truck 3");
        assert_eq!(row.info, "KX-118");
        assert_eq!(row.status, "2h ago");
        assert_eq!(row.icon, "truck");
        assert_eq!(row.battery, "82% high +");
        assert_eq!(row.flags, "ignition");
        assert_eq!(row.position, "52.52001, 13.40495 @ 12 kn");
    }

    #[test]
    fn row_without_fix_is_sparse() {
        let options = ViewOptions::default();
        let ctx = RowContext {
            options: &options,
            now: Utc::now(),
            color: false,
            icons: None,
        };
        let row = ctx.row(&DeviceEntry {
            device: Arc::new(device()),
            position: None,
        });
        assert_eq!(row.info, "");
        assert_eq!(row.battery, "");
        assert_eq!(row.position, "");
    }
}
