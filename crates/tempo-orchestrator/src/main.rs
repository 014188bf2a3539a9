//! tempo terminal client
//!
//! Plays a timed game against a remote engine service. Moves and commands
//! are read from stdin one per line; the board is redrawn whenever the
//! position or turn changes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tempo_core::config::{self, ClientConfig};
use tempo_core::types::{format_clock, Color};
use tempo_orchestrator::command::{parse_line, Command, LineRequest};
use tempo_orchestrator::engine::HttpEngine;
use tempo_orchestrator::render::{print_error, print_notification, render};
use tempo_orchestrator::view::{GameView, Notification, Phase};
use tempo_orchestrator::{Coordinator, StandardRules};

const HELP: &str = "\
Commands:
  e2e4 | move e2e4   play a move (pawns reaching the last rank become queens)
  new                start over, playing the colour at the bottom of the board
  white | black      start over playing that colour (or: play <colour>)
  flip               flip the board
  resign             concede the game
  load <fen>         start over from a FEN position
  time <minutes>     base time for the next game
  inc <seconds>      increment for the next game
  clock              show both clocks
  quit               leave";

#[derive(Parser)]
#[command(name = "tempo")]
#[command(about = "Play timed chess against a remote engine")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engine service URL (overrides config)
    #[arg(short, long, env = "TEMPO_SERVER")]
    server: Option<String>,

    /// Base time per side in minutes (overrides config)
    #[arg(short, long)]
    minutes: Option<f64>,

    /// Increment per move in seconds (overrides config)
    #[arg(short, long)]
    increment: Option<f64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they don't interleave with the board
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = load_client_config(args.config.as_ref())?;
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(minutes) = args.minutes {
        config.minutes = minutes;
    }
    if let Some(increment) = args.increment {
        config.increment_secs = increment;
    }

    tracing::info!("Using engine service at {}", config.server_url);

    let engine = Arc::new(
        HttpEngine::new(&config.server_url, config.request_timeout)
            .context("Failed to create engine client")?,
    );
    let (coordinator, handle) = Coordinator::from_config(StandardRules::new(), engine, &config)
        .context("Invalid configuration")?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let display = tokio::spawn(run_display(
        handle.view(),
        handle.notifications(),
        cancel.clone(),
    ));
    let orchestrator = tokio::spawn(coordinator.run(cancel.clone()));

    println!("{}\n", HELP);
    handle.send(Command::NewGame).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = cancel.cancelled() => break,
        };
        // EOF
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(&line) {
            Ok(LineRequest::Command(command)) => handle.send(command).await?,
            Ok(LineRequest::Help) => println!("{}", HELP),
            Ok(LineRequest::ShowClock) => println!("{}", clock_line(&handle.current_view())),
            Ok(LineRequest::Quit) => break,
            Err(e) => print_error(&e.to_string()),
        }
    }

    cancel.cancel();
    drop(handle);
    orchestrator.await.context("Coordinator task failed")?;
    display.await.context("Display task failed")?;
    Ok(())
}

fn load_client_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    if let Some(path) = path {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        Ok(config::load_config(&default_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
            ClientConfig::default()
        }))
    } else {
        tracing::debug!("Using default configuration");
        Ok(ClientConfig::default())
    }
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
            _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
        }

        cancel.cancel();
    });
}

fn clock_line(view: &GameView) -> String {
    format!(
        "White {}  Black {}",
        format_clock(view.remaining(Color::White)),
        format_clock(view.remaining(Color::Black))
    )
}

/// Redraw on position, phase or orientation changes; print notifications
/// as they arrive
async fn run_display(
    mut view: watch::Receiver<GameView>,
    mut notifications: broadcast::Receiver<Notification>,
    cancel: CancellationToken,
) {
    let mut drawn: Option<(String, Phase, Color)> = None;

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                let key = (current.fen.clone(), current.phase, current.orientation);
                if drawn.as_ref() != Some(&key) {
                    println!("\n{}", render(&current));
                    drawn = Some(key);
                }
            }
            received = notifications.recv() => match received {
                Ok(notification) => print_notification(&notification),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Display missed {} notifications", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = cancel.cancelled() => break,
        }
    }
}
