//! Tests for the Spotify client against a scripted HTTP server.

use std::sync::Arc;
use std::time::{Duration, Instant};
use syncstream_config::{ProviderCredentials, Settings};
use syncstream_provider::{
    ACCESS_TOKEN_KEY, PlaybackProvider, ProviderError, RetryPolicy, SpotifyClient,
};
use syncstream_store::{SqliteStore, Store};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn playback_json(track_id: &str) -> serde_json::Value {
    serde_json::json!({
        "timestamp": 1736240427000i64,
        "is_playing": true,
        "progress_ms": 45000,
        "currently_playing_type": "track",
        "item": {
            "id": track_id,
            "name": "Deep Work Focus",
            "uri": format!("spotify:track:{}", track_id),
            "duration_ms": 210000,
            "explicit": false,
            "popularity": 85,
            "artists": [{"id": "a1", "name": "Someone"}],
            "album": {"id": "al1", "name": "Album", "images": []}
        }
    })
}

fn token_json(token: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": token,
        "token_type": "Bearer",
        "expires_in": 3600
    })
}

fn client(server: &MockServer, store: Arc<SqliteStore>) -> SpotifyClient {
    let mut settings = Settings::default().provider;
    settings.api_base_url = server.uri();
    settings.token_url = format!("{}/api/token", server.uri());

    let credentials = ProviderCredentials {
        client_id: "client".into(),
        client_secret: "secret".into(),
        refresh_token: "refresh".into(),
    };

    SpotifyClient::new(&settings, credentials, store)
        .unwrap()
        .with_retry_policy(RetryPolicy {
            max_rate_limit_retries: 3,
            default_retry_after: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            retry_after_unit: Duration::from_millis(20),
        })
}

fn store_with_token(token: &str) -> Arc<SqliteStore> {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.set(ACCESS_TOKEN_KEY, token).unwrap();
    store
}

mod authentication {
    use super::*;

    #[tokio::test]
    async fn empty_cache_refreshes_before_first_call() {
        let server = MockServer::start().await;
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_json("fresh")))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/me/player/next"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, store.clone());
        assert!(client.skip_next().await.unwrap());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn single_401_triggers_one_refresh_and_retry() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/me/player"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/me/player"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(playback_json("t1")))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_json("fresh")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, store_with_token("stale"));
        let state = client.current_playback().await.unwrap().unwrap();
        assert_eq!(state.item.unwrap().id, "t1");
    }

    #[tokio::test]
    async fn persistent_401_surfaces_auth_error_without_third_attempt() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/me/player"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_json("fresh")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, store_with_token("stale"));
        let err = client.current_playback().await.unwrap_err();
        assert!(err.is_auth(), "expected auth error, got {err:?}");
    }

    #[tokio::test]
    async fn refresh_failure_is_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, Arc::new(SqliteStore::in_memory().unwrap()));
        match client.current_playback().await {
            Err(ProviderError::Auth(message)) => assert!(message.contains("400")),
            other => panic!("Expected Auth error, got {other:?}"),
        }
    }
}

mod rate_limiting {
    use super::*;

    #[tokio::test]
    async fn retry_after_is_waited_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/audio-features/t1"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/audio-features/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "t1",
                "energy": 0.4,
                "instrumentalness": 0.8,
                "valence": 0.5,
                "tempo": 120.0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, store_with_token("token"));
        let started = Instant::now();
        let features = client.audio_features("t1").await.unwrap().unwrap();

        // Three units of 20ms each
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(features.instrumentalness, 0.8);
    }

    #[tokio::test]
    async fn sustained_rate_limit_gives_up_after_budget() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/me/player/next"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .expect(4)
            .mount(&server)
            .await;

        let client = client(&server, store_with_token("token"));
        match client.skip_next().await {
            Err(ProviderError::RateLimited { retry_after_secs }) => assert_eq!(retry_after_secs, 0),
            other => panic!("Expected RateLimited, got {other:?}"),
        }
    }
}

mod responses {
    use super::*;

    #[tokio::test]
    async fn no_content_means_nothing_playing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/me/player"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client(&server, store_with_token("token"));
        assert!(client.current_playback().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn server_error_is_transport_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/me/player"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, store_with_token("token"));
        match client.current_playback().await {
            Err(ProviderError::Transport {
                method,
                endpoint,
                status,
                body,
            }) => {
                assert_eq!(method, "GET");
                assert_eq!(endpoint, "/me/player");
                assert_eq!(status, 503);
                assert_eq!(body, "unavailable");
            }
            other => panic!("Expected Transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_decode_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/audio-features/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let client = client(&server, store_with_token("token"));
        assert!(matches!(
            client.audio_features("t1").await,
            Err(ProviderError::Decode(_))
        ));
    }
}
