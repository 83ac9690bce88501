//! Clap derive structures for the `fleetwatch` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use fleetwatch_core::{DeviceStatus, FilterCriteria, SortKey};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fleetwatch -- live fleet monitoring from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "fleetwatch",
    version,
    about = "Monitor a GPS tracking fleet from the command line",
    long_about = "Lists, filters and live-watches the devices of a GPS tracking server.\n\n\
        Snapshots come from the REST API; `watch` keeps a WebSocket open and\n\
        reprints the filtered fleet whenever it changes.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "FLEETWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', env = "FLEETWATCH_SERVER", global = true)]
    pub server: Option<String>,

    /// Session token
    #[arg(long, env = "FLEETWATCH_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FLEETWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates (REST only)
    #[arg(long, short = 'k', env = "FLEETWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "FLEETWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List devices from a one-off snapshot
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Fleet counters (total, online, offline, moving)
    Stats,

    /// Follow the fleet live and reprint it on every change
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Filtering ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Case-insensitive match on name, unique id or the secondary attribute
    #[arg(long, short = 'S', value_name = "KEYWORD")]
    pub search: Option<String>,

    /// Only show devices with this status (repeatable: online, offline, unknown)
    #[arg(long = "status", value_name = "STATUS")]
    pub statuses: Vec<DeviceStatus>,

    /// Only show devices in this group (repeatable)
    #[arg(long = "group", value_name = "GROUP_ID")]
    pub groups: Vec<i64>,

    /// Hide offline devices
    #[arg(long)]
    pub hide_offline: bool,

    /// Sort order: name, unique-id, last-update, status
    #[arg(long, value_name = "KEY")]
    pub sort: Option<SortKey>,
}

impl FilterArgs {
    /// Layer these flags over the profile's starting criteria.
    pub fn criteria(&self, base: &FilterCriteria) -> FilterCriteria {
        let mut criteria = base.clone();
        if let Some(ref keyword) = self.search {
            criteria.keyword.clone_from(keyword);
        }
        if !self.statuses.is_empty() {
            criteria.statuses = self.statuses.iter().copied().collect();
        }
        if !self.groups.is_empty() {
            criteria.groups = self.groups.iter().copied().collect();
        }
        if self.hide_offline {
            criteria.show_offline = false;
        }
        criteria
    }
}

// ── Devices / Watch ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Follow this device: print its latest position after each update
    #[arg(long, value_name = "DEVICE_ID")]
    pub select: Option<i64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Show the current configuration (secrets redacted)
    Show,

    /// Write a profile for a server
    Init {
        /// Server base URL
        #[arg(long)]
        server: String,

        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Store this token in the system keyring
        #[arg(long)]
        token: Option<String>,

        /// Environment variable to read the token from instead
        #[arg(long, conflicts_with = "token")]
        token_env: Option<String>,

        /// Overwrite an existing profile of the same name
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn filter_flags_parse() {
        let cli = Cli::try_parse_from([
            "fleetwatch",
            "devices",
            "--search",
            "truck",
            "--status",
            "Online",
            "--status",
            "unknown",
            "--group",
            "7",
            "--hide-offline",
            "--sort",
            "last-update",
        ])
        .unwrap();
        let Command::Devices(args) = cli.command else {
            panic!("expected devices");
        };
        let criteria = args.filter.criteria(&FilterCriteria::default());
        assert_eq!(criteria.keyword, "truck");
        assert_eq!(
            criteria.statuses.into_iter().collect::<Vec<_>>(),
            vec![DeviceStatus::Online, DeviceStatus::Unknown]
        );
        assert!(criteria.groups.contains(&7));
        assert!(!criteria.show_offline);
        assert_eq!(args.filter.sort, Some(SortKey::LastUpdate));
    }

    #[test]
    fn unset_flags_keep_profile_criteria() {
        let base = FilterCriteria::default().hide_offline().with_keyword("van");
        let criteria = FilterArgs::default().criteria(&base);
        assert_eq!(criteria, base);
    }

    #[test]
    fn bad_status_is_rejected() {
        let err = Cli::try_parse_from(["fleetwatch", "devices", "--status", "asleep"]);
        assert!(err.is_err());
    }
}
