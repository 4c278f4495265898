use anyhow::Result;
use colored::Colorize;
use daycycle::prelude::*;
use daycycle::sinks::paint;
use daycycle::{ENGINE_NAME, VERSION as LIB_VERSION};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct ShellHighlighter;

impl Highlighter for ShellHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

/// Prints the logo, versions and license blurb unless `QUIET_MODE` is set.
fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    const LOGO_TEXT: &str = include_str!("../logo.log");
    let rule = "-".repeat(72);

    println!("{}", LOGO_TEXT.cyan());
    println!("{}", rule.dimmed());
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    let license_blurb = "
    This software is provided 'as is', without warranty of any kind.
    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.
    ";
    println!("{}", license_blurb.dimmed());
    println!("{}", rule.dimmed());
}

/// Spawns tasks printing the engine's system, effect and (when watching) phase events.
fn spawn_event_listeners(engine: &DaycycleEngine, watching: Arc<AtomicBool>) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            match event {
                SystemEvent::SinkFailed { effect, reason } => {
                    println!("\n<-- {} {:?}: {}", "[SINK FAILED]".red().bold(), effect, reason);
                }
                SystemEvent::ConfigReloaded { summary } => {
                    println!("\n<-- [RELOADED] {}", summary.green());
                }
                other => println!("\n<-- [SYSTEM EVENT] {:?}", other),
            }
        }
    });

    let mut effect_rx = engine.subscribe_effect_events();
    tokio::spawn(async move {
        while let Ok(event) = effect_rx.recv().await {
            match event.effect {
                SideEffect::PlaySound(cue) => println!("\n<-- [SOUND] {}", cue.to_string().magenta()),
                SideEffect::ShowNotification { title, message } => {
                    println!("\n<-- [NOTIFY] {}: {}", title.bold(), message)
                }
            }
        }
    });

    let mut phase_rx = engine.subscribe_phase_events();
    tokio::spawn(async move {
        loop {
            match phase_rx.recv().await {
                Ok(event) => {
                    if watching.load(Ordering::Relaxed) {
                        println!("<-- [{}] {}", event.tick.now, event.state.status_line());
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn parse_filter(args: &[&str]) -> Option<EffectFilter> {
    match args {
        [] | ["all"] => Some(EffectFilter::All),
        ["sounds"] => Some(EffectFilter::Sounds),
        ["notifications"] => Some(EffectFilter::Notifications),
        ["cue", name] => name.parse::<Cue>().ok().map(EffectFilter::Cue),
        _ => None,
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  status                - Shows the current phase and the time left.");
    println!("  schedule              - Prints today's schedule, the current entry highlighted.");
    println!("  reload                - Reloads the configuration file.");
    println!("  play <cue>            - Plays a cue now (dev_mode only).");
    println!("  watch on|off          - Starts or stops printing every processed tick.");
    println!("  listen [FILTER]       - Adds an effect listener (all, sounds, notifications, cue <cue>).");
    println!("  listeners             - Shows active listeners and their handles.");
    println!("  unlisten <H>          - Removes a listener by its handle.");
    println!("  exit                  - Quits the shell.");
    println!("Cues: {}", Cue::ALL.map(|cue| cue.as_str()).join(", "));
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("DAYCYCLE_CONFIG").ok())
        .map(PathBuf::from);
    let mut provider = ConfigProvider::new(config_path);
    let config = provider.load();

    let engine = DaycycleEngine::new(config.clone(), Sinks::desktop(&config));
    let engine_handle = engine.clone();

    let watching = Arc::new(AtomicBool::new(false));
    spawn_event_listeners(&engine_handle, watching.clone());

    info!("Spawning {} in the background...", ENGINE_NAME.cyan());
    tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            eprintln!("\nEngine stopped with an error: {}", e);
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    // Shell-side handles for the engine's listener ids.
    let mut active_listeners: BTreeMap<usize, (ListenerId, EffectFilter)> = BTreeMap::new();
    let mut next_handle: usize = 0;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(ShellHighlighter));

    println!(
        "{} is running. Type 'help' for commands or 'exit' to quit.",
        ENGINE_NAME.cyan()
    );

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(_) => {
                println!("Exiting dayshell...");
                break;
            }
        };
        rl.add_history_entry(line.as_str())?;
        let args = line.split_whitespace().collect::<Vec<_>>();
        let Some((command, rest)) = args.split_first() else {
            continue;
        };

        match *command {
            "status" => println!("{}", engine_handle.status().await.status_line().bold()),
            "schedule" => println!("{}", paint(&engine_handle.schedule_spans().await)),
            "reload" => {
                if let Err(e) = engine_handle.reload_from(&mut provider).await {
                    println!("{} {:#}. Keeping the current configuration.", "Reload failed:".red(), e);
                }
            }
            "play" => match rest {
                [name] => match name.parse::<Cue>() {
                    Ok(cue) => {
                        if let Err(e) = engine_handle.play_cue(cue).await {
                            println!("Error: {}", e);
                        }
                    }
                    Err(e) => println!("Error: {}", e),
                },
                _ => println!("Usage: play <CUE>"),
            },
            "watch" => match rest {
                ["on"] => {
                    watching.store(true, Ordering::Relaxed);
                    println!("--> Started printing processed ticks.");
                }
                ["off"] => {
                    watching.store(false, Ordering::Relaxed);
                    println!("--> Stopped printing processed ticks.");
                }
                _ => println!("Usage: watch on|off"),
            },
            "listen" => match parse_filter(rest) {
                Some(filter) => {
                    let handle = next_handle;
                    let listener_id = engine_handle
                        .on_effect(filter, move |effect| {
                            println!("<-- [LISTENER #{}] {:?}", handle, effect)
                        })
                        .await;
                    active_listeners.insert(handle, (listener_id, filter));
                    next_handle += 1;
                    println!("--> Added {:?} listener with handle: #{}", filter, handle);
                }
                None => println!("Usage: listen [all|sounds|notifications|cue <CUE>]"),
            },
            "listeners" => {
                println!("Active Listeners:");
                for (handle, (id, filter)) in &active_listeners {
                    println!("  Handle #{}: {:?} ({:?})", handle, filter, id);
                }
            }
            "unlisten" => match rest.first().map(|h| h.trim_start_matches('#').parse::<usize>()) {
                Some(Ok(handle)) => match active_listeners.remove(&handle) {
                    Some((id, _)) => {
                        if engine_handle.remove_listener(id).await {
                            println!("--> Listener successfully removed.");
                        } else {
                            println!("--> Error: Listener not found in engine.");
                        }
                    }
                    None => println!(
                        "Error: Invalid handle #{}. Use 'listeners' to see active listeners.",
                        handle
                    ),
                },
                Some(Err(_)) => println!("Error: Handle must be a number (e.g., '0', '1')."),
                None => println!("Usage: unlisten <HANDLE>"),
            },
            "help" => print_help(),
            "exit" => break,
            _ => println!("Unknown command: '{}'. Type 'help'.", line.trim()),
        }
    }

    Ok(())
}
