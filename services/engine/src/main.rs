//! Rota engine (headless)
//!
//! Runs the consistency engine against an in-memory store:
//!
//! - Seeds members from `ROTA_SEED_FILE` (JSON array), if set
//! - Loads the configured shift and keeps it live-synced
//! - Logs the queue whenever it changes, until Ctrl-C

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rota_engine::backend::NewMember;
use rota_engine::config::Config;
use rota_engine::{
    DedupNotifier, InMemoryBackend, MutationCoordinator, RealtimeSync, RosterBackend,
    RosterStore, TracingNotifier,
};
use rota_events::Shift;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Prefer RUST_LOG, fall back to ROTA_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting rota engine");
    info!(
        shift = %config.shift,
        seed_file = ?config.seed_file,
        sync_max_attempts = config.sync_max_attempts,
        "Configuration loaded"
    );

    let backend = Arc::new(InMemoryBackend::new());
    if let Some(path) = &config.seed_file {
        let seeded = seed(backend.as_ref(), path).await?;
        info!(members = seeded, path = %path.display(), "Store seeded");
    }

    let store = Arc::new(RosterStore::new());
    let notifier = Arc::new(DedupNotifier::with_window(
        TracingNotifier,
        config.notify_debounce,
    ));
    let coordinator = Arc::new(MutationCoordinator::new(
        Arc::clone(&store),
        backend.clone(),
        notifier.clone(),
    ));

    coordinator
        .load(config.shift)
        .await
        .context("Initial roster load failed")?;
    log_queue(&coordinator, config.shift).await;

    let sync = RealtimeSync::new(config.shift, backend.clone(), coordinator.clone(), notifier)
        .with_policy(config.reconnect_policy())
        .spawn();

    let mut changes = store.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    warn!("Roster store closed");
                    break;
                }
                log_queue(&coordinator, config.shift).await;
            }
        }
    }

    sync.teardown().await;
    coordinator.activity().flush().await;

    info!("Rota engine shutdown complete");
    Ok(())
}

/// Insert seed members, numbering each shift's queue in file order.
async fn seed(backend: &InMemoryBackend, path: &Path) -> Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let rows: Vec<NewMember> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid seed file {}", path.display()))?;

    let mut next = [0u32; 3];
    let count = rows.len();
    for mut row in rows {
        let slot = Shift::ALL
            .iter()
            .position(|s| *s == row.shift)
            .unwrap_or_default();
        row.position = next[slot];
        next[slot] += 1;
        backend
            .insert_member(row)
            .await
            .context("Failed to seed member")?;
    }
    Ok(count)
}

async fn log_queue(coordinator: &MutationCoordinator, shift: Shift) {
    let active = coordinator.store().active(shift).await;
    let queue: Vec<&str> = active.iter().map(|m| m.name.as_str()).collect();
    let next_up = coordinator.next_up(shift).await.map(|m| m.name);
    info!(
        shift = %shift,
        queue = ?queue,
        next_up = ?next_up,
        version = coordinator.store().version(),
        "Roster"
    );
}
