//! Output formatting: human-readable text or JSON.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;

use pondlink_core::{ActuatorWriteResult, ConnectionPhase, RelayMessage, TelemetryView, TimeSource};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn paint(text: &str, color: bool, style: fn(&str) -> String) -> String {
    if color { style(text) } else { text.to_owned() }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render one telemetry view.
pub fn render_view(format: OutputFormat, view: &TelemetryView, color: bool) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(view_line(view, color)),
        OutputFormat::Json => serde_json::to_string_pretty(view),
        OutputFormat::JsonCompact => serde_json::to_string(view),
    }
}

/// Render the outcome of a relay command.
pub fn render_relay(
    format: OutputFormat,
    channel: u32,
    result: &ActuatorWriteResult,
    color: bool,
) -> Result<String, serde_json::Error> {
    let report = RelayReport {
        channel,
        confirmed: result.confirmed,
        observed: result.observed_value.map(RelayMessage::as_str),
        error: result.error.as_ref().map(ToString::to_string),
    };
    match format {
        OutputFormat::Text => Ok(relay_line(&report, color)),
        OutputFormat::Json => serde_json::to_string_pretty(&report),
        OutputFormat::JsonCompact => serde_json::to_string(&report),
    }
}

/// Print the rendered output to stdout.
pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
    let _ = stdout.flush();
}

// ── Text renderers ───────────────────────────────────────────────────

#[derive(Serialize)]
struct RelayReport {
    channel: u32,
    confirmed: bool,
    observed: Option<&'static str>,
    error: Option<String>,
}

fn view_line(view: &TelemetryView, color: bool) -> String {
    let conn = &view.connection;
    let status = match conn.phase() {
        ConnectionPhase::Loading => paint("… loading", color, |s| s.yellow().to_string()),
        ConnectionPhase::Online => paint("● online ", color, |s| s.green().to_string()),
        ConnectionPhase::Offline => paint("○ offline", color, |s| s.red().to_string()),
    };

    let readings = view.data.map_or_else(
        || "no readings".to_owned(),
        |snap| {
            format!(
                "temp {:.1} °C  pH {:.2}  TDS {:.0} ppm",
                snap.water.temperature, snap.water.ph, snap.water.tds
            )
        },
    );

    let stamp = conn.last_update.map_or_else(String::new, |at| {
        let source = match conn.last_update_source {
            Some(TimeSource::Device) => "device",
            Some(TimeSource::Received) | None => "received",
        };
        format!("  @ {} ({source})", at.format("%Y-%m-%d %H:%M:%S UTC"))
    });

    let error = conn
        .error
        .as_deref()
        .map(|e| format!("  [{}]", paint(e, color, |s| s.red().to_string())))
        .unwrap_or_default();

    format!("{status}  {readings}{stamp}{error}")
}

fn relay_line(report: &RelayReport, color: bool) -> String {
    let relay = format!("relay{}", u64::from(report.channel) + 1);
    if report.confirmed {
        let state = report.observed.unwrap_or("?");
        format!(
            "{} {relay} (channel {}) is {state}",
            paint("✓", color, |s| s.green().to_string()),
            report.channel
        )
    } else {
        format!(
            "{} {relay} (channel {}) not confirmed: {}",
            paint("✗", color, |s| s.red().to_string()),
            report.channel,
            report.error.as_deref().unwrap_or("unknown error")
        )
    }
}
