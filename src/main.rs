// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use stepseq::config::{SessionEvent, SessionWatcher};
use stepseq::{Command, Scheduler, SessionFile, TriggerCommand};
use tracing::{info, warn, Level};

fn print_usage() {
    println!("STEPSEQ - Step sequencer trigger scheduler");
    println!();
    println!("Usage: stepseq [-v] [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --render <FILE> [STEPS] [PATTERN]  Print the triggers for the first STEPS steps");
    println!("  --watch <FILE> [STEPS]             Re-render whenever FILE changes");
    println!("  -v                                 Verbose logging");
    println!("  --help                             Show this help message");
}

/// Triggers produced by one transport step
#[derive(Serialize)]
struct RenderedStep {
    step: u64,
    triggers: Vec<TriggerCommand>,
}

fn render(session: &SessionFile, steps: u64, pattern: u32) -> Result<String> {
    let mut scheduler = Scheduler::new();
    scheduler
        .apply_all(session.to_commands())
        .context("Failed to apply session")?;
    scheduler.apply(Command::Start)?;

    let mut rendered = Vec::new();
    for step in 0..steps {
        let triggers = scheduler.apply(Command::ScheduleTrackTriggers { step, pattern })?;
        if !triggers.is_empty() {
            rendered.push(RenderedStep { step, triggers });
        }
    }
    info!(steps, pattern, active = rendered.len(), "rendered session");

    serde_yaml::to_string(&rendered).context("Failed to serialize triggers")
}

fn render_file(path: &Path, steps: Option<u64>, pattern: Option<u32>) -> Result<()> {
    let session = SessionFile::load(path)?;
    let steps = steps.unwrap_or(session.transport.steps);
    let pattern = pattern.unwrap_or(session.transport.pattern);
    print!("{}", render(&session, steps, pattern)?);
    Ok(())
}

fn watch_file(path: &Path, steps: Option<u64>) -> Result<()> {
    render_file(path, steps, None)?;

    let watcher = SessionWatcher::new(path, None)?;
    info!(path = ?watcher.watched_path(), "watching session file (press Ctrl+C to stop)");

    while let Some(event) = watcher.recv() {
        match event {
            SessionEvent::Reloaded(session) => {
                let steps = steps.unwrap_or(session.transport.steps);
                match render(&session, steps, session.transport.pattern) {
                    Ok(yaml) => {
                        println!("---");
                        print!("{}", yaml);
                    }
                    Err(e) => warn!(error = %format!("{:#}", e), "render failed"),
                }
            }
            SessionEvent::Error(message) => warn!(%message, "session reload failed"),
        }
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], index: usize, what: &str) -> Result<Option<T>> {
    args.get(index)
        .map(|arg| {
            arg.parse()
                .map_err(|_| anyhow!("Invalid {}: {}", what, arg))
        })
        .transpose()
}

fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().collect();
    let verbose = args.iter().any(|arg| arg == "-v");
    args.retain(|arg| arg != "-v");

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if args.len() < 2 {
        println!("STEPSEQ - Step sequencer trigger scheduler");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "--render" => {
            let Some(file) = args.get(2) else {
                eprintln!("Error: --render requires a session file");
                std::process::exit(1);
            };
            let steps = parse_arg(&args, 3, "step count")?;
            let pattern = parse_arg(&args, 4, "pattern number")?;
            render_file(Path::new(file), steps, pattern)?;
        }
        "--watch" => {
            let Some(file) = args.get(2) else {
                eprintln!("Error: --watch requires a session file");
                std::process::exit(1);
            };
            let steps = parse_arg(&args, 3, "step count")?;
            watch_file(Path::new(file), steps)?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
