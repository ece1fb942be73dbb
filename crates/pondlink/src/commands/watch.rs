//! `pondlink watch [--once]`

use pondlink_core::{ConnectionPhase, Dashboard, TelemetryView};
use tokio::sync::mpsc;

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(dashboard: &Dashboard, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<TelemetryView>();
    dashboard.start_telemetry(move |view| {
        let _ = tx.send(view.clone());
    })?;

    let color = output::should_color(global.color);
    let outcome = loop {
        let view = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("interrupted");
                break Ok(());
            }
            view = rx.recv() => match view {
                Some(view) => view,
                None => break Ok(()),
            },
        };

        output::print_output(&output::render_view(global.output, &view, color)?);

        if args.once {
            break match view.connection.phase() {
                ConnectionPhase::Online | ConnectionPhase::Loading => Ok(()),
                ConnectionPhase::Offline => Err(CliError::Offline {
                    message: view.connection.error.unwrap_or_default(),
                }),
            };
        }
    };

    dashboard.shutdown();
    outcome
}
