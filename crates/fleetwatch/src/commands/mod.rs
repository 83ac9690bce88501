//! Command handlers for the server-backed subcommands.

pub mod config_cmd;
pub mod devices;
pub mod stats;
pub mod watch;

use fleetwatch_core::{
    Connector, CoreError, FilterCriteria, FleetSync, HttpConnector, SyncConfig, ViewOptions,
};

use crate::cli::{Command, FilterArgs, GlobalOpts};
use crate::error::CliError;

/// Route a parsed command to its handler.
pub async fn dispatch(
    cmd: Command,
    config: SyncConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(&config, &args, global).await,
        Command::Stats => stats::handle(&config, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

/// Effective view options and criteria: profile values under flag overrides.
pub fn view_settings(config: &SyncConfig, filter: &FilterArgs) -> (ViewOptions, FilterCriteria) {
    let mut options = config.view.clone();
    if let Some(sort) = filter.sort {
        options.sort = sort;
    }
    (options, filter.criteria(&config.criteria))
}

/// One-shot load: open a session, fetch the full snapshot, apply it.
pub async fn load_fleet(
    config: &SyncConfig,
    options: ViewOptions,
    criteria: FilterCriteria,
) -> Result<FleetSync, CliError> {
    let connector = HttpConnector::from_config(config)?;
    connector
        .ensure_session()
        .await
        .map_err(CoreError::from)?;
    let (devices, positions) = connector.snapshot().await.map_err(CoreError::from)?;

    let sync = FleetSync::with_criteria(options, criteria);
    let change = sync.replace_all(devices, positions);
    tracing::debug!(
        devices = sync.store().device_count(),
        rejected = change.rejected,
        "snapshot loaded"
    );

    // Snapshot commands are done with the session.
    if let Err(e) = connector.close_session().await {
        tracing::debug!(error = %e, "failed to close session");
    }
    Ok(sync)
}
