//! Config subcommand handlers.

use fleetwatch_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "****";

/// Copy of `cfg` with plaintext tokens masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(REDACTED.into());
        }
    }
    cfg
}

fn to_toml(cfg: &Config) -> Result<String, CliError> {
    toml::to_string_pretty(cfg).map_err(|e| CliError::Render {
        format: "toml",
        reason: e.to_string(),
    })
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(&fleetwatch_config::load_config()?);
            let out = match global.output {
                // TOML reads best for a config file
                OutputFormat::Table | OutputFormat::Plain => to_toml(&cfg)?,
                _ => output::render_single(&global.output, &cfg, |_| String::new(), |_| {
                    String::new()
                })?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            server,
            name,
            token,
            token_env,
            force,
        } => {
            let mut cfg = fleetwatch_config::load_config()?;
            if cfg.profiles.contains_key(&name) && !force {
                return Err(CliError::Validation {
                    field: "name".into(),
                    reason: format!("profile '{name}' already exists (use --force to replace it)"),
                });
            }

            let mut profile = Profile::new(server);
            fleetwatch_config::server_url(&profile)?;
            profile.token_env = token_env;

            if let Some(token) = token {
                match fleetwatch_config::store_token(&name, &token) {
                    Ok(()) => eprintln!("✓ Token stored in system keyring"),
                    Err(e) => {
                        tracing::warn!(error = %e, "keyring unavailable, saving token in config");
                        eprintln!("! Keyring unavailable, token saved in plaintext");
                        profile.token = Some(token);
                    }
                }
            }

            if cfg.profiles.is_empty() || !cfg.profiles.contains_key(default_name(&cfg)) {
                cfg.default_profile = Some(name.clone());
            }
            cfg.profiles.insert(name.clone(), profile);

            let path = config::config_path();
            fleetwatch_config::save_config_to(&cfg, &path)?;
            eprintln!("✓ Profile '{name}' written to {}", path.display());
            Ok(())
        }
    }
}

fn default_name(cfg: &Config) -> &str {
    cfg.default_profile.as_deref().unwrap_or("default")
}
