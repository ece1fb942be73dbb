//! Config subcommand handlers.

use pondlink_config::{self as config, Config, Profile};
use pondlink_core::{DEFAULT_TELEMETRY_PATH, StorePath};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, InitArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string());
            Ok(())
        }

        // Uses load_config_or_default() so it succeeds without a file.
        ConfigCommand::Show => {
            let mut cfg = config::load_config_or_default();
            for profile in cfg.profiles.values_mut() {
                if profile.api_key.is_some() {
                    profile.api_key = Some(REDACTED.into());
                }
            }
            let rendered = match global.output {
                OutputFormat::Text => toml::to_string_pretty(&cfg).map_err(|e| CliError::Validation {
                    field: "config".into(),
                    reason: format!("failed to serialize config: {e}"),
                })?,
                OutputFormat::Json => serde_json::to_string_pretty(&cfg)?,
                OutputFormat::JsonCompact => serde_json::to_string(&cfg)?,
            };
            output::print_output(&rendered);
            Ok(())
        }

        ConfigCommand::Init(ref init) => init_profile(init, global),
    }
}

fn init_profile(args: &InitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let database_url = global.database_url.clone().ok_or_else(|| CliError::Validation {
        field: "database-url".into(),
        reason: "pass --database-url (or PONDLINK_DATABASE_URL) for the new profile".into(),
    })?;
    database_url.parse::<url::Url>().map_err(|e| CliError::Validation {
        field: "database-url".into(),
        reason: format!("invalid URL '{database_url}': {e}"),
    })?;

    let telemetry_path = match args.telemetry_path.as_deref() {
        Some(raw) => StorePath::new(raw)?.to_string(),
        None => DEFAULT_TELEMETRY_PATH.into(),
    };

    // A key stored by name in the environment is never written to disk.
    let api_key = if args.api_key_env.is_some() {
        None
    } else {
        global.api_key.clone()
    };
    if api_key.is_none() && args.api_key_env.is_none() {
        return Err(CliError::NoCredentials {
            profile: args.name.clone(),
        });
    }

    let path = config::config_path();
    let mut cfg = if path.exists() {
        config::load_config()?
    } else {
        Config::default()
    };

    if cfg.profiles.contains_key(&args.name) && !args.force {
        return Err(CliError::ProfileExists {
            name: args.name.clone(),
        });
    }

    cfg.profiles.insert(
        args.name.clone(),
        Profile {
            database_url,
            api_key,
            api_key_env: args.api_key_env.clone(),
            identity_url: global.identity_url.clone(),
            telemetry_path,
            timeout: global.timeout,
        },
    );
    if cfg.profiles.len() == 1 {
        cfg.default_profile = Some(args.name.clone());
    }

    let written = config::save_config(&cfg)?;
    tracing::info!(profile = %args.name, path = %written.display(), "profile saved");
    eprintln!("Profile '{}' written to {}", args.name, written.display());
    Ok(())
}
