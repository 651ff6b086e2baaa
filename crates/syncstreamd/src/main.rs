//! syncstreamd - The syncstream background service
//!
//! This is the main entry point for the syncstream service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization and catalog seeding
//! - Playback provider (Spotify or mock)
//! - Playback engine loop
//! - Proactive token refresh
//! - IPC server

mod handlers;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use syncstream_api::{Event, EventPayload};
use syncstream_config::{ProviderMode, Settings, load_config};
use syncstream_core::{CoreEvent, PlaybackEngine, StrategyCatalog, StrategyFactory};
use syncstream_ipc::{IpcServer, ServerMessage};
use syncstream_provider::{MockProvider, PlaybackProvider, SpotifyClient};
use syncstream_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use syncstream_util::default_config_path;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// syncstreamd - skips tracks that break the active listening policy
#[derive(Parser, Debug)]
#[command(name = "syncstreamd")]
#[command(about = "Watches remote playback and skips tracks that break the active policy", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/syncstream/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set SYNCSTREAM_SOCKET env var)
    #[arg(short, long, env = "SYNCSTREAM_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set SYNCSTREAM_DATA_DIR env var)
    #[arg(short, long, env = "SYNCSTREAM_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    settings: Settings,
    engine: PlaybackEngine,
    provider: Arc<dyn PlaybackProvider>,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let settings = if args.config.exists() {
            load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?
        } else {
            warn!(
                config_path = %args.config.display(),
                "Config file not found, using defaults"
            );
            Settings::default()
        };

        info!(
            config_path = %args.config.display(),
            provider = ?settings.provider.mode,
            poll_interval_secs = settings.engine.poll_interval.as_secs(),
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| settings.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("syncstream.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        // Seed the catalog without overwriting edits from earlier runs
        let catalog = StrategyCatalog::new(store.clone());
        catalog
            .seed(&settings.catalog.strategies)
            .context("Failed to seed strategy catalog")?;
        if let Some(default_active) = &settings.catalog.default_active {
            catalog
                .ensure_default_active(default_active)
                .context("Failed to apply default active strategy")?;
        }

        let provider: Arc<dyn PlaybackProvider> = match settings.provider.mode {
            ProviderMode::Mock => {
                info!("Using mock playback provider");
                Arc::new(MockProvider::new())
            }
            ProviderMode::Spotify => Arc::new(
                SpotifyClient::from_settings(&settings.provider, store.clone())
                    .context("Failed to build Spotify client")?,
            ),
        };

        let engine = PlaybackEngine::new(
            provider.clone(),
            catalog,
            StrategyFactory::builtin(),
            store.clone(),
            settings.engine.poll_interval,
        );

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        Ok(Self {
            settings,
            engine,
            provider,
            ipc: Arc::new(ipc),
            store,
        })
    }

    async fn run(self) -> Result<()> {
        let shutdown = CancellationToken::new();

        let ipc = self.ipc.clone();
        let mut ipc_messages = ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        if let Some(interval) = self.settings.provider.token_refresh_interval {
            tokio::spawn(refresh_token_task(
                self.provider.clone(),
                interval,
                shutdown.child_token(),
            ));
        }

        let mut engine_events = self.engine.subscribe();
        let engine_handle = self.engine.start()?;

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                event = engine_events.recv() => match event {
                    Ok(event) => forward_core_event(&ipc, event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Dropped engine events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Engine event channel closed");
                        break;
                    }
                },

                Some(msg) = ipc_messages.recv() => {
                    self.handle_ipc_message(msg).await;
                }
            }
        }

        info!("Shutting down syncstreamd");

        shutdown.cancel();
        engine_handle.stop().await;
        ipc.broadcast_event(Event::new(EventPayload::Shutdown));

        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                handlers::dispatch(&self.engine, &self.store, &self.ipc, client_id, request).await;
            }

            ServerMessage::ClientConnected { client_id, info } => {
                debug!(client_id = %client_id, role = ?info.role, uid = ?info.uid, "Client registered");
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");
            }
        }
    }
}

fn forward_core_event(ipc: &IpcServer, event: CoreEvent) {
    let payload = match event {
        CoreEvent::Evaluated(record) => EventPayload::Evaluated(record),
        CoreEvent::LifecycleChanged(lifecycle) => EventPayload::LifecycleChanged { lifecycle },
    };
    ipc.broadcast_event(Event::new(payload));
}

/// Refresh the provider token on a fixed cadence until cancelled.
///
/// Failures are logged; the next attempt happens on the next tick.
async fn refresh_token_task(
    provider: Arc<dyn PlaybackProvider>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        match provider.refresh_access_token().await {
            Ok(()) => info!(provider = provider.name(), "Access token refreshed successfully"),
            Err(e) => error!(error = %e, "Error refreshing access token"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!("Token refresh task stopped");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "syncstreamd starting");

    let service = Service::new(&args).await?;
    service.run().await
}
