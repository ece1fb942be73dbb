//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable help.

use miette::Diagnostic;
use thiserror::Error;

use pondlink_config::ConfigError;
use pondlink_core::{CommandError, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const PERMISSION: i32 = 5;
    pub const UNCONFIRMED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(pondlink::connection_failed),
        help(
            "Check the database URL and your network connection.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Telemetry is offline: {message}")]
    #[diagnostic(
        code(pondlink::offline),
        help("The sensor node may be down, or the path may hold no data yet.")
    )]
    Offline { message: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(pondlink::timeout),
        help("Increase timeout with --timeout or check the database's responsiveness.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(pondlink::auth_failed),
        help(
            "Anonymous sign-in must be enabled for the project and the web API key\n\
             must belong to it. Check --api-key or the profile's api_key_env."
        )
    )]
    AuthFailed { message: String },

    #[error("No API key configured for profile '{profile}'")]
    #[diagnostic(
        code(pondlink::no_credentials),
        help(
            "Pass --api-key, set PONDLINK_API_KEY, or run:\n\
             pondlink config init --database-url <URL> --api-key <KEY>"
        )
    )]
    NoCredentials { profile: String },

    #[error("Permission denied at '{path}'")]
    #[diagnostic(
        code(pondlink::permission_denied),
        help("The database's security rules refused this request.")
    )]
    PermissionDenied { path: String },

    // ── Relays ───────────────────────────────────────────────────────
    #[error("Relay {channel} not confirmed: {reason}")]
    #[diagnostic(
        code(pondlink::unconfirmed),
        help("The relay state is unknown. Re-run the command or check the device.")
    )]
    Unconfirmed { channel: u32, reason: String },

    // ── Database ─────────────────────────────────────────────────────
    #[error("Database error: {message}")]
    #[diagnostic(code(pondlink::database))]
    Database { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pondlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(pondlink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: pondlink config init --name {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No database configured")]
    #[diagnostic(
        code(pondlink::no_config),
        help(
            "Pass --database-url, or create a profile with: pondlink config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Profile '{name}' already exists")]
    #[diagnostic(code(pondlink::profile_exists), help("Use --force to overwrite it."))]
    ProfileExists { name: String },

    #[error(transparent)]
    #[diagnostic(code(pondlink::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Offline { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::PermissionDenied { .. } => exit_code::PERMISSION,
            Self::Unconfirmed { .. } => exit_code::UNCONFIRMED,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Map a failed relay command.
    pub fn from_command(channel: u32, err: &CommandError) -> Self {
        match err {
            CommandError::Unauthenticated(auth) => CliError::AuthFailed {
                message: auth.message.clone(),
            },
            other => CliError::Unconfirmed {
                channel,
                reason: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::Timeout => CliError::Timeout,
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::PermissionDenied { path } => CliError::PermissionDenied { path },
            CoreError::InvalidPath { path, reason } => CliError::Validation {
                field: format!("path '{path}'"),
                reason,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },
            other @ (CoreError::AlreadySubscribed | CoreError::Api { .. } | CoreError::Internal(_)) => {
                CliError::Database {
                    message: other.to_string(),
                }
            }
        }
    }
}
