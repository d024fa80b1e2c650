//! Dashboard command handler.
//!
//! Resolves capabilities once, then loops: collect, evaluate, render, sleep.

use anyhow::{Context, Result};
use colored::*;
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{self, Clear, ClearType},
};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::watch;

use crate::core::config::Settings;
use crate::core::system_monitor::{evaluate, Collector, Snapshot, Warning};
use crate::platform::CapabilityProfile;
use crate::ui::{render, RenderOptions};

/// How the command prints each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorOptions {
    /// Stop after the first snapshot
    pub once: bool,
    /// Print `{snapshot, warnings}` as JSON instead of tables
    pub json: bool,
    /// Disable ANSI colors
    pub no_color: bool,
}

#[derive(Serialize)]
struct JsonTick<'a> {
    snapshot: &'a Snapshot,
    warnings: &'a [Warning],
}

/// Run the dashboard until Ctrl+C, or for one tick with `--once`.
pub async fn run(settings: Arc<Settings>, options: MonitorOptions) -> Result<()> {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    let caps = CapabilityProfile::resolve();

    let collector = Collector::for_platform(&caps, &settings).context("Failed to set up collectors")?;
    let interactive = !options.json && !options.once;

    if interactive {
        println!(
            "{}",
            format!(
                "Rainbow system monitor (refreshes every {} seconds, press Ctrl+C to exit)",
                settings.refresh_interval_secs
            )
            .cyan()
            .bold()
        );
        if !caps.is_elevated {
            println!(
                "{}",
                "Not running elevated: disk temperatures and port owners will be unavailable".dimmed()
            );
        }
    }

    loop {
        // A stop during collection drops the tick, which kills running tools
        let snapshot = tokio::select! {
            snapshot = collector.collect(&caps) => snapshot,
            _ = stop_rx.changed() => break,
        };
        let warnings = evaluate(&snapshot);

        if options.json {
            let tick = JsonTick {
                snapshot: &snapshot,
                warnings: &warnings,
            };
            println!("{}", serde_json::to_string(&tick).context("Failed to serialize snapshot")?);
        } else {
            draw(&snapshot, &warnings, options, interactive)?;
        }

        if options.once {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(settings.refresh_interval()) => {}
            _ = stop_rx.changed() => break,
        }
    }

    if interactive {
        clear_screen()?;
        println!("{}", "\nMonitoring stopped. Goodbye! 🌈\n".blue().bold());
    }
    Ok(())
}

fn draw(snapshot: &Snapshot, warnings: &[Warning], options: MonitorOptions, clear: bool) -> Result<()> {
    let width = terminal::size().map(|(cols, _)| cols as usize).unwrap_or(80);
    let render_options = RenderOptions {
        width,
        color: !options.no_color,
    };
    let text = render(snapshot, warnings, &render_options);

    if clear {
        clear_screen()?;
    }
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", text)?;
    stdout.flush()?;
    Ok(())
}

fn clear_screen() -> Result<()> {
    execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0)).context("Failed to clear the terminal")
}
