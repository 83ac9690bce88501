//! Fleet counters.

use fleetwatch_core::{FleetStats, SyncConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

fn detail(stats: &FleetStats) -> String {
    [
        format!("Total:    {}", stats.total),
        format!("Online:   {}", stats.online),
        format!("Offline:  {}", stats.offline),
        format!("Unknown:  {}", stats.total - stats.online - stats.offline),
        format!("Moving:   {}", stats.moving),
    ]
    .join("\n")
}

pub async fn handle(config: &SyncConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let sync = super::load_fleet(config, config.view.clone(), config.criteria.clone()).await?;
    let stats = sync.stats();

    let out = output::render_single(&global.output, &stats, detail, |s| {
        format!("{} {} {} {}", s.total, s.online, s.offline, s.moving)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
