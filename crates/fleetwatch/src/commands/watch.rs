//! Live watch: keep the channel open and reprint the filtered fleet.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;

use fleetwatch_core::{
    AuthEvent, ConnectionManager, ConnectionState, ConnectionStatus, DeviceId, FilteredView,
    FleetSync, HttpConnector, Position, SyncConfig,
};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::devices::{self, RowContext};

fn status_line(status: ConnectionStatus, color: bool) -> String {
    let state = output::paint_state(status.state, color);
    match status.state {
        ConnectionState::Closed | ConnectionState::Errored if status.attempt > 0 => {
            format!("connection: {state} (retry {})", status.attempt)
        }
        _ => format!("connection: {state}"),
    }
}

fn selection_line(id: DeviceId, position: Option<&Position>) -> String {
    match position {
        Some(p) => format!(
            "selected {id}: {:.5}, {:.5} speed {:.0} kn course {:.0} at {}",
            p.latitude,
            p.longitude,
            p.speed,
            p.course,
            p.device_time.to_rfc3339()
        ),
        None => format!("selected {id}: no position yet"),
    }
}

/// Select `wanted` once it shows up in the view.
fn try_select(sync: &FleetSync, wanted: &mut Option<DeviceId>, view: &FilteredView) {
    let Some(id) = *wanted else {
        return;
    };
    if view.contains(id) && sync.select(id) {
        *wanted = None;
    }
}

pub async fn handle(
    config: SyncConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (options, criteria) = super::view_settings(&config, &args.filter);
    let sync = Arc::new(FleetSync::with_criteria(options, criteria));
    let connector = HttpConnector::from_config(&config)?;
    let manager = ConnectionManager::new(connector, Arc::clone(&sync), config.reconnect.clone());

    let color = output::should_color(&global.color);
    let mut status = manager.subscribe_status();
    let mut auth = manager.auth_events();
    let mut views = sync.subscribe_view();
    let mut wanted = args.select.map(DeviceId);

    let icons = devices::icon_gate(&config);

    manager.connect();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("interrupted, logging out");
                manager.logout().await;
                return Ok(());
            }

            event = auth.recv() => match event {
                Ok(AuthEvent::AuthLost { reason }) => {
                    manager.shutdown().await;
                    return Err(CliError::AuthLost { reason });
                }
                Ok(AuthEvent::LoggedOut) | Err(RecvError::Closed) => return Ok(()),
                Err(RecvError::Lagged(_)) => {}
            },

            changed = status.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let current = *status.borrow_and_update();
                if !global.quiet {
                    eprintln!("{}", status_line(current, color));
                }
                if current.state == ConnectionState::Errored && manager.gave_up() {
                    return Err(CliError::ConnectionFailed {
                        url: config.url.to_string(),
                        reason: format!("gave up after {} attempts", current.attempt + 1),
                    });
                }
            }

            view = views.changed() => {
                let Some(view) = view else {
                    return Ok(());
                };
                try_select(&sync, &mut wanted, &view);

                if let Some(ref gate) = icons {
                    devices::prepare_icons(gate, &view).await;
                }

                let ctx = RowContext {
                    options: sync.options(),
                    now: Utc::now(),
                    color,
                    icons: icons.as_ref(),
                };
                let snapshot = sync.snapshot();
                let out = devices::render(global, &ctx, &devices::entries(&view, &snapshot))?;
                output::print_output(&out, global.quiet);

                if let Some(id) = sync.selection() {
                    let line = selection_line(id, sync.selected_position().as_deref());
                    output::print_output(&line, global.quiet);
                }
            }
        }
    }
}
