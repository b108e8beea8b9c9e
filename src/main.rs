//! modifier-beeper: beeps whenever a modifier key goes down
//!
//! Runs in the background and provides:
//! - Global modifier detection via CGEventTap
//! - Rising-edge detection over Shift, Command, Option and Control
//! - A tone played through a fallback chain (output device, external
//!   player, system alert)
//! - IPC server for a menu bar front end (toggle, volume, test, quit)

mod beeper;
mod config;
mod events;
mod hotkey;
mod ipc;
mod lifecycle;
mod prefs;
mod sound;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::beeper::Beeper;
use crate::config::Config;
use crate::events::BeeperEvent;
use crate::hotkey::HotkeyListener;
use crate::ipc::{BeeperStatus, Server};
use crate::lifecycle::ShutdownSignal;
use crate::prefs::PreferenceStore;
use crate::sound::SoundPlayer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "modifier-beeper starting");

    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, ?config.tone_path, "configuration loaded");

    let shutdown = ShutdownSignal::new();

    // Listener -> beeper
    let (hotkey_tx, hotkey_rx) = mpsc::channel(32);
    // IPC server -> beeper
    let (control_tx, control_rx) = mpsc::channel(32);
    // Beeper -> IPC server (status and notifications)
    let (event_tx, _event_rx) = broadcast::channel::<BeeperEvent>(64);

    let player = SoundPlayer::from_config(&config);
    info!(device_tone = player.has_primary(), "sound player ready");
    let mut beeper = Beeper::new(
        player,
        PreferenceStore::new(&config.preferences_path),
        event_tx.clone(),
    );

    let initial = BeeperStatus {
        active: beeper.is_active(),
        volume: beeper.volume(),
        ..Default::default()
    };
    let server = Server::new(&config.socket_path, initial, control_tx, event_tx.clone())?;
    let mut status_rx = event_tx.subscribe();

    let hotkey_listener = HotkeyListener::new(hotkey_tx);
    match hotkey_listener.start() {
        Ok(()) => {
            info!("modifier listener started");
            let _ = event_tx.send(BeeperEvent::ListenerStarted);
        }
        Err(e) => {
            error!(%e, "failed to start modifier listener");
            warn!("continuing without global modifier detection - test sounds still work over IPC");
        }
    }

    info!("initialized, entering main loop");

    tokio::select! {
        _ = beeper.run(hotkey_rx, control_rx) => {
            info!("beeper exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Keep the server's status view in step with the beeper
        _ = async {
            loop {
                match status_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "beeper event");
                        server.apply_event(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "status receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("status relay exited");
        }

        result = shutdown.wait() => match result {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(?e, "failed to register signal handlers, shutting down"),
        },
    }

    info!("shutting down...");

    if hotkey_listener.is_running() {
        hotkey_listener.stop();
    }
    server.shutdown().await;

    info!("modifier-beeper stopped");

    Ok(())
}
