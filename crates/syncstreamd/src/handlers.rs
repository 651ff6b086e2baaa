//! Command dispatch for IPC requests

use std::sync::Arc;
use syncstream_api::{
    ClientInfo, ClientRole, Command, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus,
    Request, Response, ResponsePayload,
};
use syncstream_core::{CoreError, PlaybackEngine};
use syncstream_ipc::IpcServer;
use syncstream_store::Store;
use syncstream_util::ClientId;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Result of handling one command
pub struct Handled {
    pub response: Response,
    /// Event to broadcast after the response is sent
    pub event: Option<EventPayload>,
}

impl Handled {
    fn reply(response: Response) -> Self {
        Self {
            response,
            event: None,
        }
    }
}

fn core_error(request_id: u64, error: CoreError) -> Response {
    let code = match &error {
        CoreError::NotFound(_) => ErrorCode::NotFound,
        CoreError::InvalidArgument(_) => ErrorCode::InvalidArgument,
        CoreError::Provider(_) => ErrorCode::ProviderError,
        CoreError::Store(_) => ErrorCode::InternalError,
    };
    Response::error(request_id, ErrorInfo::new(code, error.to_string()))
}

/// Answer one client request.
///
/// `Evaluate` queues behind any in-flight engine cycle, so it is answered
/// from its own task and the returned handle tracks it. Everything else is
/// answered before this returns.
pub async fn dispatch(
    engine: &PlaybackEngine,
    store: &Arc<dyn Store>,
    ipc: &Arc<IpcServer>,
    client_id: ClientId,
    request: Request,
) -> Option<JoinHandle<()>> {
    let client = ipc
        .get_client_info(&client_id)
        .await
        .unwrap_or_else(|| ClientInfo::new(ClientRole::Observer));

    if matches!(request.command, Command::Evaluate) {
        let engine = engine.clone();
        let store = store.clone();
        let ipc = ipc.clone();
        return Some(tokio::spawn(async move {
            let handled =
                handle_command(&engine, &store, &client, request.request_id, request.command).await;
            deliver(&ipc, &client_id, handled).await;
        }));
    }

    let handled = handle_command(engine, store, &client, request.request_id, request.command).await;
    deliver(ipc, &client_id, handled).await;
    None
}

async fn deliver(ipc: &IpcServer, client_id: &ClientId, handled: Handled) {
    if let Err(e) = ipc.send_response(client_id, handled.response).await {
        debug!(client_id = %client_id, error = %e, "Failed to send response");
    }
    if let Some(payload) = handled.event {
        ipc.broadcast_event(Event::new(payload));
    }
}

pub async fn handle_command(
    engine: &PlaybackEngine,
    store: &Arc<dyn Store>,
    client: &ClientInfo,
    request_id: u64,
    command: Command,
) -> Handled {
    debug!(client_id = %client.client_id, command = ?command, "Handling command");

    if command.is_mutating() && !client.role.can_mutate() {
        warn!(client_id = %client.client_id, role = ?client.role, "Mutating command denied");
        return Handled::reply(Response::error(
            request_id,
            ErrorInfo::new(
                ErrorCode::PermissionDenied,
                "Only the service user or root may change strategies",
            ),
        ));
    }

    match command {
        Command::GetStatus => Handled::reply(match engine.status() {
            Ok(status) => Response::success(request_id, ResponsePayload::Status(status)),
            Err(e) => core_error(request_id, e),
        }),

        Command::Evaluate => Handled::reply(match engine.apply_strategy().await {
            Ok(outcome) => Response::success(request_id, ResponsePayload::Evaluated { outcome }),
            Err(e) => core_error(request_id, e),
        }),

        Command::ListStrategies { only_active } => {
            Handled::reply(match engine.catalog().list(only_active) {
                Ok(strategies) => {
                    Response::success(request_id, ResponsePayload::Strategies { strategies })
                }
                Err(e) => core_error(request_id, e),
            })
        }

        Command::GetActiveStrategy => Handled::reply(match engine.catalog().get_active() {
            Ok(config) => Response::success(request_id, ResponsePayload::Strategy(config)),
            Err(e) => core_error(request_id, e),
        }),

        Command::SetActiveStrategy { id } => {
            let catalog = engine.catalog();
            match catalog.set_active(&id).and_then(|_| catalog.get_active()) {
                Ok(config) => Handled {
                    response: Response::success(request_id, ResponsePayload::Strategy(config)),
                    event: Some(EventPayload::StrategyActivated { id }),
                },
                Err(e) => Handled::reply(core_error(request_id, e)),
            }
        }

        Command::UpsertStrategy { config } => match engine.catalog().upsert(&config) {
            Ok(()) => {
                if !engine.factory().supports(&config.id) {
                    warn!(strategy = %config.id, "Stored strategy has no implementation");
                }
                let id = config.id.clone();
                Handled {
                    response: Response::success(request_id, ResponsePayload::Strategy(config)),
                    event: Some(EventPayload::StrategyUpserted { id }),
                }
            }
            Err(e) => Handled::reply(core_error(request_id, e)),
        },

        Command::SubscribeEvents => Handled::reply(Response::success(
            request_id,
            ResponsePayload::Subscribed {
                client_id: client.client_id.clone(),
            },
        )),

        Command::GetHealth => Handled::reply(Response::success(
            request_id,
            ResponsePayload::Health(HealthStatus {
                live: true,
                store_ok: store.is_healthy(),
                engine: engine.lifecycle(),
                provider: engine.provider_name().to_string(),
            }),
        )),

        Command::Ping => Handled::reply(Response::success(request_id, ResponsePayload::Pong)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use syncstream_api::{
        AudioFeatures, EvaluationOutcome, PlaybackState, ResponseResult, StrategyConfig,
    };
    use syncstream_core::{StrategyCatalog, StrategyFactory};
    use syncstream_ipc::{IpcClient, ServerMessage};
    use syncstream_provider::{MockProvider, PlaybackProvider, ProviderResult};
    use syncstream_store::SqliteStore;
    use syncstream_util::StrategyId;

    fn setup() -> (PlaybackEngine, Arc<dyn Store>, Arc<MockProvider>) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let catalog = StrategyCatalog::new(store.clone());
        catalog
            .seed(&syncstream_config::builtin_seeds())
            .unwrap();
        catalog.set_active(&StrategyId::new("focus")).unwrap();

        let provider = Arc::new(MockProvider::new());
        let engine = PlaybackEngine::new(
            provider.clone(),
            catalog,
            StrategyFactory::builtin(),
            store.clone(),
            Duration::from_secs(10),
        );
        (engine, store, provider)
    }

    fn admin() -> ClientInfo {
        ClientInfo::new(ClientRole::Admin)
    }

    fn error_code(handled: &Handled) -> Option<ErrorCode> {
        match &handled.response.result {
            ResponseResult::Err(e) => Some(e.code),
            ResponseResult::Ok(_) => None,
        }
    }

    #[tokio::test]
    async fn observers_cannot_mutate() {
        let (engine, store, _) = setup();
        let observer = ClientInfo::new(ClientRole::Observer);

        let handled = handle_command(
            &engine,
            &store,
            &observer,
            1,
            Command::SetActiveStrategy {
                id: StrategyId::new("energy"),
            },
        )
        .await;
        assert_eq!(error_code(&handled), Some(ErrorCode::PermissionDenied));

        let handled = handle_command(&engine, &store, &observer, 2, Command::GetStatus).await;
        assert_eq!(error_code(&handled), None);
    }

    #[tokio::test]
    async fn set_active_errors_map_to_invalid_argument() {
        let (engine, store, _) = setup();

        let handled = handle_command(
            &engine,
            &store,
            &admin(),
            1,
            Command::SetActiveStrategy {
                id: StrategyId::new("vibe"),
            },
        )
        .await;
        assert_eq!(error_code(&handled), Some(ErrorCode::InvalidArgument));
        assert!(handled.event.is_none());
    }

    #[tokio::test]
    async fn set_active_broadcasts() {
        let (engine, store, _) = setup();

        let handled = handle_command(
            &engine,
            &store,
            &admin(),
            1,
            Command::SetActiveStrategy {
                id: StrategyId::new("energy"),
            },
        )
        .await;
        assert!(matches!(
            handled.response.result,
            ResponseResult::Ok(ResponsePayload::Strategy(ref c)) if c.id.as_str() == "energy"
        ));
        assert!(matches!(handled.event, Some(EventPayload::StrategyActivated { .. })));
    }

    #[tokio::test]
    async fn upsert_then_list() {
        let (engine, store, _) = setup();
        let config = StrategyConfig::new("calm", "Calm", "quiet").with_parameter("max_valence", 0.4);

        let handled = handle_command(
            &engine,
            &store,
            &admin(),
            1,
            Command::UpsertStrategy {
                config: config.clone(),
            },
        )
        .await;
        assert!(matches!(handled.event, Some(EventPayload::StrategyUpserted { .. })));

        let handled = handle_command(
            &engine,
            &store,
            &admin(),
            2,
            Command::ListStrategies { only_active: true },
        )
        .await;
        match handled.response.result {
            ResponseResult::Ok(ResponsePayload::Strategies { strategies }) => {
                assert!(strategies.contains(&config));
                assert!(strategies.iter().all(|s| s.is_active));
            }
            other => panic!("Expected strategies, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn evaluate_and_provider_failure() {
        let (engine, store, provider) = setup();
        provider.set_playback(None);

        let handled = handle_command(&engine, &store, &admin(), 1, Command::Evaluate).await;
        assert!(matches!(
            handled.response.result,
            ResponseResult::Ok(ResponsePayload::Evaluated {
                outcome: EvaluationOutcome::NothingPlaying
            })
        ));

        provider.fail_playback(Some("offline"));
        let handled = handle_command(&engine, &store, &admin(), 2, Command::Evaluate).await;
        assert_eq!(error_code(&handled), Some(ErrorCode::ProviderError));
    }

    #[tokio::test]
    async fn health_reports_provider() {
        let (engine, store, _) = setup();

        let handled = handle_command(&engine, &store, &admin(), 1, Command::GetHealth).await;
        match handled.response.result {
            ResponseResult::Ok(ResponsePayload::Health(health)) => {
                assert!(health.live);
                assert!(health.store_ok);
                assert_eq!(health.provider, "mock");
            }
            other => panic!("Expected health, got {other:?}"),
        }
    }

    /// Playback fetch that never completes, pinning the engine mid-cycle
    struct StalledProvider;

    #[async_trait]
    impl PlaybackProvider for StalledProvider {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn current_playback(&self) -> ProviderResult<Option<PlaybackState>> {
            std::future::pending().await
        }

        async fn audio_features(&self, _track_id: &str) -> ProviderResult<Option<AudioFeatures>> {
            Ok(None)
        }

        async fn skip_next(&self) -> ProviderResult<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn pending_evaluate_does_not_block_other_requests() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("syncstream.sock");

        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = PlaybackEngine::new(
            Arc::new(StalledProvider),
            StrategyCatalog::new(store.clone()),
            StrategyFactory::builtin(),
            store.clone(),
            Duration::from_secs(3600),
        );
        // The loop's first cycle holds the engine until the test ends
        let _loop = engine.start().unwrap();

        let mut server = IpcServer::new(&socket_path);
        server.start().await.unwrap();
        let server = Arc::new(server);
        let mut messages = server.take_message_receiver().await.unwrap();

        let accept = server.clone();
        tokio::spawn(async move {
            let _ = accept.run().await;
        });

        let dispatcher = server.clone();
        tokio::spawn(async move {
            while let Some(msg) = messages.recv().await {
                if let ServerMessage::Request { client_id, request } = msg {
                    let _ = dispatch(&engine, &store, &dispatcher, client_id, request).await;
                }
            }
        });

        let mut evaluator = IpcClient::connect(&socket_path).await.unwrap();
        let pending = tokio::spawn(async move { evaluator.send(Command::Evaluate).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut pinger = IpcClient::connect(&socket_path).await.unwrap();
        let reply = tokio::time::timeout(Duration::from_secs(2), pinger.call(Command::Ping))
            .await
            .expect("ping should be answered while an evaluation waits")
            .unwrap();
        assert!(matches!(reply, ResponsePayload::Pong));
        assert!(!pending.is_finished());
    }
}
