//! Zombie Arena Server - headless runner for the authoritative simulation
//!
//! Loads configuration, starts the match scheduler and launches a number of
//! bot-only matches, logging their lifecycle until Ctrl+C / SIGTERM.

use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zombie_arena::config::Config;
use zombie_arena::game::MatchLoop;
use zombie_arena::net::gateway::COMMAND_BUFFER;
use zombie_arena::net::{Outbound, ServerMsg};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    info!("Starting Zombie Arena Server");
    info!(
        tick_rate = config.tick_rate,
        rows = config.map_rows,
        cols = config.map_cols,
        obstacles = config.map_obstacles,
        max_players = config.max_players,
        "Arena configuration"
    );

    let scheduler = MatchLoop::new(
        config.match_settings(),
        config.spawn_interval,
        config.arena_seed,
    );
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let arena = scheduler.handle(command_tx);

    // Lifecycle logger
    let events = arena.subscribe();
    tokio::spawn(log_events(events));

    let scheduler_task = tokio::spawn(scheduler.run(command_rx, shutdown_signal()));

    for _ in 0..config.headless_matches {
        let match_id = arena.launch(Vec::new()).await?;
        info!(match_id = %match_id, "Headless match running");
    }

    scheduler_task.await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Log round and match-end announcements from every match
async fn log_events(mut events: broadcast::Receiver<Outbound>) {
    loop {
        match events.recv().await {
            Ok(Outbound {
                match_id,
                msg: ServerMsg::WaveStarted { round, label },
                ..
            }) => {
                info!(match_id = %match_id, round, label = %label, "Wave started");
            }
            Ok(Outbound {
                match_id,
                msg: ServerMsg::MatchEnded { round, stats },
                ..
            }) => {
                let kills: u32 = stats.player_stats.iter().map(|p| p.kills).sum();
                info!(
                    match_id = %match_id,
                    round,
                    kills,
                    duration_secs = stats.duration_secs,
                    "Match finished"
                );
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(lagged = n, "Event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
