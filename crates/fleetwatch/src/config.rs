//! Flag layering on top of `fleetwatch-config` profiles.
//!
//! This is the single boundary where CLI flags cross into
//! `fleetwatch_core::SyncConfig`.

use std::time::Duration;

use secrecy::SecretString;

use fleetwatch_config::{Config, Profile};
use fleetwatch_core::{SyncConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use fleetwatch_config::{config_path, load_config_or_default};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `SyncConfig` from the config file, profile, and CLI overrides.
pub fn build_sync_config(global: &GlobalOpts) -> Result<SyncConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(&cfg, profile, &profile_name, global);
    }

    // An explicitly requested profile must exist.
    if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(&cfg),
        });
    }

    // No profile -- build from flags / env alone
    let url_str = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let mut config = SyncConfig::new(parse_server(url_str)?);
    config.timeout = Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout));
    if global.insecure || cfg.defaults.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    let token = global
        .token
        .clone()
        .ok_or(CliError::NoCredentials {
            profile: profile_name,
        })?;
    Ok(config.with_token(SecretString::from(token)))
}

/// Translate a profile + global flags into a `SyncConfig`.
fn resolve_profile(
    cfg: &Config,
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<SyncConfig, CliError> {
    let mut config = fleetwatch_config::profile_to_sync_config(profile, &cfg.defaults)?;

    // 1. Server URL (flag > env > profile)
    if let Some(ref url_str) = global.server {
        config.url = parse_server(url_str)?;
    }

    // 2. TLS and timeout overrides
    if global.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }

    // 3. Token (flag > profile chain)
    let token = match global.token {
        Some(ref token) => SecretString::from(token.clone()),
        None => fleetwatch_config::resolve_token(profile, profile_name)?,
    };
    Ok(config.with_token(token))
}

fn parse_server(url_str: &str) -> Result<url::Url, CliError> {
    url_str.parse().map_err(|_| CliError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {url_str}"),
    })
}

pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}
