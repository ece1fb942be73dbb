//! Command dispatch: bridges CLI args -> core Dashboard -> output formatting.

pub mod config_cmd;
pub mod relay;
pub mod watch;

use pondlink_core::Dashboard;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a database-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, dashboard: &Dashboard, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(dashboard, &args, global).await,
        Command::Relay(args) => relay::handle(dashboard, &args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
