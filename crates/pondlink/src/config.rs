//! CLI overlay on `pondlink-config`: profile selection and flag overrides.
//!
//! This is the single boundary where CLI inputs cross into a core
//! `DashboardConfig`.

use std::time::Duration;

use pondlink_config::{Config, Profile};
use pondlink_core::{DashboardConfig, StorePath};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `DashboardConfig` from the config file, profile, and CLI overrides.
///
/// Precedence per field: flag (or its env var) > profile > built-in default.
/// The API key has no flag-level env var: `PONDLINK_API_KEY` is read during
/// key resolution, after the profile's `api_key_env`.
pub fn build_dashboard_config(global: &GlobalOpts, path_override: Option<&str>) -> Result<DashboardConfig, CliError> {
    let cfg = pondlink_config::load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => with_overrides(profile.clone(), global),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        // No profile -- build from flags / env alone
        None => flags_only_profile(global)?,
    };

    let mut config = pondlink_config::profile_to_dashboard_config(&profile, &profile_name)?;

    // The flag outranks `PONDLINK_API_KEY`, which key resolution would
    // otherwise prefer over a plaintext profile value.
    if let Some(ref key) = global.api_key {
        config.api_key = key.clone().into();
    }

    let seconds = global
        .timeout
        .or(profile.timeout)
        .unwrap_or(cfg.defaults.timeout);
    config.timeout = Duration::from_secs(seconds);

    if let Some(raw) = path_override {
        config.telemetry_path = StorePath::new(raw)?;
    }

    tracing::debug!(
        profile = %profile_name,
        database = %config.database_url,
        telemetry = %config.telemetry_path,
        "resolved dashboard config"
    );
    Ok(config)
}

fn with_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref url) = global.database_url {
        profile.database_url.clone_from(url);
    }
    if let Some(ref key) = global.api_key {
        profile.api_key = Some(key.clone());
        profile.api_key_env = None;
    }
    if let Some(ref url) = global.identity_url {
        profile.identity_url = Some(url.clone());
    }
    profile
}

fn flags_only_profile(global: &GlobalOpts) -> Result<Profile, CliError> {
    let database_url = global.database_url.clone().ok_or_else(|| CliError::NoConfig {
        path: pondlink_config::config_path().display().to_string(),
    })?;

    Ok(Profile {
        database_url,
        api_key: global.api_key.clone(),
        api_key_env: None,
        identity_url: global.identity_url.clone(),
        telemetry_path: pondlink_core::DEFAULT_TELEMETRY_PATH.into(),
        timeout: None,
    })
}

fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}
