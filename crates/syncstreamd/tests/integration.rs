//! Integration tests for syncstreamd
//!
//! These tests wire the library crates together the way the daemon does
//! and verify the end-to-end behavior.

use std::sync::Arc;
use std::time::Duration;
use syncstream_api::{
    EngineLifecycle, EvaluationOutcome, Event, EventPayload, Response, ResponsePayload,
    ResponseResult,
};
use syncstream_config::parse_config;
use syncstream_core::{CoreEvent, PlaybackEngine, StrategyCatalog, StrategyFactory};
use syncstream_ipc::{IpcClient, IpcServer, ServerMessage};
use syncstream_provider::{MOCK_FOCUS_TRACK_ID, MOCK_NOISE_TRACK_ID, MockProvider};
use syncstream_store::{AuditEventType, SqliteStore, Store};
use syncstream_util::StrategyId;

const MOCK_CONFIG: &str = r#"
    config_version = 1

    [engine]
    poll_interval_secs = 1

    [provider]
    mode = "mock"
    token_refresh_interval_secs = 0
"#;

fn build_engine(store: Arc<dyn Store>, provider: Arc<MockProvider>, poll: Duration) -> PlaybackEngine {
    let settings = parse_config(MOCK_CONFIG).unwrap();

    let catalog = StrategyCatalog::new(store.clone());
    catalog.seed(&settings.catalog.strategies).unwrap();
    if let Some(id) = &settings.catalog.default_active {
        catalog.ensure_default_active(id).unwrap();
    }

    PlaybackEngine::new(provider, catalog, StrategyFactory::builtin(), store, poll)
}

#[test]
fn test_default_catalog_seeding() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let engine = build_engine(store, Arc::new(MockProvider::new()), Duration::from_secs(1));

    let all = engine.catalog().list(false).unwrap();
    let enabled = engine.catalog().list(true).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(enabled.len(), 2);
    assert_eq!(engine.catalog().get_active().unwrap().id.as_str(), "focus");
}

#[test]
fn test_seeding_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("syncstream.db");

    {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
        let engine = build_engine(store, Arc::new(MockProvider::new()), Duration::from_secs(1));
        engine.catalog().set_active(&StrategyId::new("energy")).unwrap();
    }

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
    let engine = build_engine(store, Arc::new(MockProvider::new()), Duration::from_secs(1));
    assert_eq!(engine.catalog().get_active().unwrap().id.as_str(), "energy");
}

#[tokio::test]
async fn test_mock_session_alternates_keep_and_skip() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let provider = Arc::new(MockProvider::new());
    let engine = build_engine(store.clone(), provider.clone(), Duration::from_secs(1));

    let first = engine.apply_strategy().await.unwrap();
    let second = engine.apply_strategy().await.unwrap();

    assert!(matches!(
        first,
        EvaluationOutcome::Kept { ref track, .. } if track.id == MOCK_FOCUS_TRACK_ID
    ));
    assert!(matches!(
        second,
        EvaluationOutcome::Skipped { ref track, .. } if track.id == MOCK_NOISE_TRACK_ID
    ));
    assert_eq!(provider.skip_count(), 1);

    let skips: Vec<_> = store
        .get_recent_audits(20)
        .unwrap()
        .into_iter()
        .filter(|a| matches!(a.event, AuditEventType::TrackSkipped { .. }))
        .collect();
    assert_eq!(skips.len(), 1);
}

#[tokio::test]
async fn test_switching_strategy_changes_decision() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let provider = Arc::new(MockProvider::new());
    let engine = build_engine(store, provider.clone(), Duration::from_secs(1));

    // Loud vocal track: Focus skips it, EnergyFloor keeps it
    provider.set_playback(Some(MockProvider::playing(MockProvider::track(
        MOCK_NOISE_TRACK_ID,
        "High Energy Vocal Mix",
    ))));

    assert!(matches!(
        engine.apply_strategy().await.unwrap(),
        EvaluationOutcome::Skipped { .. }
    ));

    engine.catalog().set_active(&StrategyId::new("energy")).unwrap();
    assert!(matches!(
        engine.apply_strategy().await.unwrap(),
        EvaluationOutcome::Kept { .. }
    ));
}

#[tokio::test]
async fn test_engine_lifecycle_events() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let provider = Arc::new(MockProvider::new());
    provider.set_playback(None);
    let engine = build_engine(store, provider, Duration::from_millis(10));

    let mut events = engine.subscribe();
    let handle = engine.start().unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.stop().await;

    let mut lifecycles = Vec::new();
    let mut evaluations = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            CoreEvent::LifecycleChanged(l) => lifecycles.push(l),
            CoreEvent::Evaluated(_) => evaluations += 1,
        }
    }

    assert_eq!(
        lifecycles,
        vec![
            EngineLifecycle::Running,
            EngineLifecycle::Stopping,
            EngineLifecycle::Stopped
        ]
    );
    assert!(evaluations >= 1);
}

#[tokio::test]
async fn test_ipc_events_reach_subscribers() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("syncstream.sock");

    let mut server = IpcServer::new(&socket_path);
    server.start().await.unwrap();
    let server = Arc::new(server);
    let mut messages = server.take_message_receiver().await.unwrap();

    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });

    let responder = server.clone();
    tokio::spawn(async move {
        while let Some(msg) = messages.recv().await {
            if let ServerMessage::Request { client_id, request } = msg {
                let payload = ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                };
                let _ = responder
                    .send_response(&client_id, Response::success(request.request_id, payload))
                    .await;
            }
        }
    });

    let client = IpcClient::connect(&socket_path).await.unwrap();
    let mut stream = client.subscribe().await.unwrap();

    server.broadcast_event(Event::new(EventPayload::StrategyActivated {
        id: StrategyId::new("vibe"),
    }));

    let event = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        event.payload,
        EventPayload::StrategyActivated { ref id } if id.as_str() == "vibe"
    ));
}

#[tokio::test]
async fn test_invalid_request_gets_error_reply() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("bad.sock");

    let mut server = IpcServer::new(&socket_path);
    server.start().await.unwrap();
    let server = Arc::new(server);
    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });

    let stream = tokio::net::UnixStream::connect(&socket_path).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    write_half.write_all(b"{\"not\": \"a request\"}\n").await.unwrap();

    let mut line = String::new();
    BufReader::new(read_half).read_line(&mut line).await.unwrap();
    let response: Response = serde_json::from_str(line.trim()).unwrap();
    assert!(matches!(response.result, ResponseResult::Err(_)));
}
