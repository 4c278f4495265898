use anyhow::Result;
use clap::Parser;
use daycycle::prelude::*;
use daycycle::schedule;
use daycycle::sinks::TerminalScheduleDisplay;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Runs the Work/Break cycle in the foreground.
#[derive(Debug, Parser)]
#[command(name = "daycycled", version, about)]
struct Args {
    /// TOML configuration file. Defaults and DAYCYCLE_* variables apply without one.
    #[arg(short, long, env = "DAYCYCLE_CONFIG")]
    config: Option<PathBuf>,

    /// Print today's schedule and exit.
    #[arg(long)]
    print_schedule: bool,

    /// Do not print the schedule whenever the current interval changes.
    #[arg(long)]
    no_display: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // 2. Load the configuration. Failures fall back to the defaults.
    let mut provider = ConfigProvider::new(args.config);
    let config = provider.load();

    if args.print_schedule {
        print!("{}", schedule::render_text(&schedule::build(&config.cycle())));
        return Ok(());
    }

    // 3. Create the engine with desktop sinks.
    let mut sinks = Sinks::desktop(&config);
    if !args.no_display {
        sinks = sinks.with_display(Arc::new(TerminalScheduleDisplay::new()));
    }
    let engine = DaycycleEngine::new(config, sinks);

    // 4. Log transitions and failures, and reload on SIGHUP.
    spawn_event_listeners(&engine);
    #[cfg(unix)]
    engine.reload_on_hangup(provider)?;
    #[cfg(not(unix))]
    drop(provider);

    // 5. Run the engine.
    engine.run().await?;

    Ok(())
}

/// Spawns tasks that log the interesting parts of the engine's event streams.
fn spawn_event_listeners(engine: &DaycycleEngine) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            match event {
                SystemEvent::SinkFailed { .. } | SystemEvent::ClockJumped { .. } => {
                    // Already logged by the engine.
                }
                other => info!("[SYSTEM] => {:?}", other),
            }
        }
    });

    let mut phase_rx = engine.subscribe_phase_events();
    tokio::spawn(async move {
        let mut last_phase = None;
        loop {
            match phase_rx.recv().await {
                Ok(event) => {
                    if last_phase != Some(event.state.phase) {
                        info!("{}", event.state.status_line());
                        last_phase = Some(event.state.phase);
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Phase log skipped {} events.", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
