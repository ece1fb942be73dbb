//! `pondlink relay <CHANNEL> <on|off>`

use pondlink_core::{ActuatorCommand, Dashboard};

use crate::cli::{GlobalOpts, RelayArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(dashboard: &Dashboard, args: &RelayArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cmd = ActuatorCommand::new(args.channel, args.state.is_on());
    tracing::debug!(channel = args.channel, desired = cmd.desired, "sending relay command");

    let result = dashboard.send_command(cmd).await;

    let color = output::should_color(global.color);
    output::print_output(&output::render_relay(global.output, args.channel, &result, color)?);

    match result.error {
        None if result.confirmed => Ok(()),
        None => Err(CliError::Unconfirmed {
            channel: args.channel,
            reason: "read-back did not match".into(),
        }),
        Some(ref err) => Err(CliError::from_command(args.channel, err)),
    }
}
