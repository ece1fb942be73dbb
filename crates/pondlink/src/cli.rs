//! Clap derive structures for the `pondlink` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pondlink -- live pond telemetry and relay control
#[derive(Debug, Parser)]
#[command(
    name = "pondlink",
    version,
    about = "Watch pond telemetry and switch relays from the command line",
    long_about = "Mirrors water-quality telemetry from a realtime database and\n\
        switches relay channels, confirming every write by reading it back.",
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
    /// Profile to use
    #[arg(long, short = 'p', env = "PONDLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Database URL (overrides profile)
    #[arg(long, short = 'd', env = "PONDLINK_DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Web API key for anonymous sign-in (beats every configured source)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Identity endpoint (e.g. a local auth emulator)
    #[arg(long, env = "PONDLINK_IDENTITY_URL", global = true, hide = true)]
    pub identity_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PONDLINK_OUTPUT",
        default_value = "text",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Request timeout in seconds [default: profile, then 30]
    #[arg(long, env = "PONDLINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output Enums ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines (default)
    Text,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON (one object per line)
    JsonCompact,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream live telemetry until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Switch a relay and confirm it by read-back
    #[command(alias = "r")]
    Relay(RelayArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Print the first reading and exit (non-zero when offline)
    #[arg(long)]
    pub once: bool,

    /// Telemetry node to watch (overrides profile)
    #[arg(long)]
    pub path: Option<String>,
}

// ── Relay ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RelayArgs {
    /// Relay channel, 0-based (channel 0 is relay1)
    pub channel: u32,

    /// Desired state
    pub state: RelayState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RelayState {
    On,
    Off,
}

impl RelayState {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
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

    /// Display current resolved configuration (keys redacted)
    Show,

    /// Write a profile from --database-url / --api-key
    Init(InitArgs),
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Profile name to create
    #[arg(long, default_value = "default")]
    pub name: String,

    /// Read the API key from this environment variable instead of storing it
    #[arg(long)]
    pub api_key_env: Option<String>,

    /// Telemetry node
    #[arg(long)]
    pub telemetry_path: Option<String>,

    /// Overwrite an existing profile with the same name
    #[arg(long)]
    pub force: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
