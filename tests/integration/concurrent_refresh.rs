//! Concurrent requests failing with 401 share a single refresh exchange.

use super::*;
use async_trait::async_trait;
use futures::future::join_all;
use quiz_admin_client::{
    client_config, AdminApiClient, ApiRequest, ClientError, HttpRequest, HttpResponse,
    HttpTransport, InMemoryStore, KeyValueStore, MockStore, RecordingSessionListener,
    SessionError, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const CONCURRENCY: usize = 8;

/// Backend stand-in that rejects `stale` and holds the refresh response until
/// every concurrent request has been rejected once.
struct ScriptedBackend {
    stale: String,
    fresh: String,
    refresh_succeeds: bool,
    expected_rejections: usize,
    rejections: AtomicUsize,
    refreshes: AtomicUsize,
}

impl ScriptedBackend {
    fn new(refresh_succeeds: bool) -> Self {
        Self {
            stale: valid_token("stale"),
            fresh: valid_token("fresh"),
            refresh_succeeds,
            expected_rejections: CONCURRENCY,
            rejections: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        if request.url.ends_with("/api/v1/refresh") {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            while self.rejections.load(Ordering::SeqCst) < self.expected_rejections {
                tokio::task::yield_now().await;
            }
            return Ok(if self.refresh_succeeds {
                HttpResponse::json(
                    200,
                    &json!({
                        "success": true,
                        "accessToken": self.fresh,
                        "refreshToken": "refresh-2"
                    }),
                )
            } else {
                HttpResponse::json(401, &json!({"success": false, "message": "expired"}))
            });
        }

        match request.bearer_token() {
            Some(token) if token == self.fresh => {
                Ok(HttpResponse::json(200, &json!({"url": request.url})))
            }
            _ => {
                self.rejections.fetch_add(1, Ordering::SeqCst);
                Ok(HttpResponse::new(401, Vec::<u8>::new()))
            }
        }
    }
}

fn client_for(
    backend: &Arc<ScriptedBackend>,
) -> (
    AdminApiClient<ScriptedBackend, MockStore>,
    Arc<MockStore>,
    Arc<RecordingSessionListener>,
) {
    let store = Arc::new(MockStore::new());
    store.add_entry(ACCESS_TOKEN_KEY, &backend.stale);
    store.add_entry(REFRESH_TOKEN_KEY, "refresh-1");
    let listener = Arc::new(RecordingSessionListener::new());

    let config = client_config()
        .base_url("http://localhost:4000")
        .build()
        .unwrap();
    let client = AdminApiClient::with_components(config, backend.clone(), store.clone())
        .with_listener(listener.clone());
    (client, store, listener)
}

#[tokio::test]
async fn test_concurrent_401s_trigger_one_refresh() {
    let backend = Arc::new(ScriptedBackend::new(true));
    let (client, store, listener) = client_for(&backend);

    let requests = (0..CONCURRENCY)
        .map(|i| client.send(ApiRequest::get(format!("/api/v1/quizzes/{}", i))));
    let results = tokio::time::timeout(Duration::from_secs(10), join_all(requests))
        .await
        .expect("requests settled");

    for (i, result) in results.into_iter().enumerate() {
        let response = result.unwrap();
        assert_eq!(response.status, 200);
        let body: serde_json::Value = response.parse_json().unwrap();
        assert!(body["url"]
            .as_str()
            .unwrap()
            .ends_with(&format!("/api/v1/quizzes/{}", i)));
    }

    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(store.writes_to(ACCESS_TOKEN_KEY), 1);
    assert_eq!(
        client.tokens().get_access_token().unwrap().as_deref(),
        Some(backend.fresh.as_str())
    );
    assert_eq!(
        client.tokens().get_refresh_token().unwrap().as_deref(),
        Some("refresh-2")
    );
    assert_eq!(listener.refresh_count(), 1);
    assert!(listener.sign_outs().is_empty());
    assert!(!client.is_refreshing());
}

#[tokio::test]
async fn test_failed_refresh_rejects_every_waiting_request() {
    let backend = Arc::new(ScriptedBackend::new(false));
    let (client, store, listener) = client_for(&backend);

    let requests = (0..CONCURRENCY).map(|_| client.send(ApiRequest::get("/api/v1/essays")));
    let results = tokio::time::timeout(Duration::from_secs(10), join_all(requests))
        .await
        .expect("requests settled");

    for result in results {
        match result {
            Err(ClientError::Session(SessionError::RefreshFailed { .. })) => {}
            other => panic!("expected refresh failure, got {:?}", other),
        }
    }

    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(store.writes_to(ACCESS_TOKEN_KEY), 0);
    assert_eq!(client.tokens().get_access_token().unwrap(), None);
    assert_eq!(client.tokens().get_refresh_token().unwrap(), None);
    assert_eq!(listener.refresh_count(), 0);
    assert_eq!(listener.sign_outs(), vec!["/".to_string()]);
    assert!(!client.is_refreshing());
}

#[tokio::test]
async fn test_new_cycle_after_settled_refresh() {
    let backend = Arc::new(ScriptedBackend {
        expected_rejections: 1,
        ..ScriptedBackend::new(true)
    });
    let (client, store, _listener) = client_for(&backend);

    client.send(ApiRequest::get("/api/v1/quizzes")).await.unwrap();
    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);

    // The session is stale again; a fresh cycle starts.
    store.add_entry(ACCESS_TOKEN_KEY, &backend.stale);
    backend.rejections.store(0, Ordering::SeqCst);
    client.send(ApiRequest::get("/api/v1/quizzes")).await.unwrap();

    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 2);
    assert_eq!(store.writes_to(ACCESS_TOKEN_KEY), 2);
}

/// Storage whose access token reads stall after the value is taken.
struct SlowReadStore {
    inner: InMemoryStore,
    delay: Duration,
}

impl KeyValueStore for SlowReadStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let value = self.inner.get(key)?;
        if key == ACCESS_TOKEN_KEY {
            std::thread::sleep(self.delay);
        }
        Ok(value)
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), ClientError> {
        self.inner.set_many(entries)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), ClientError> {
        self.inner.remove_many(keys)
    }
}

/// Rejects `/a` at once and `/b` shortly before the refresh exchange returns.
struct OverlappingBackend {
    stale: String,
    fresh: String,
    refreshes: AtomicUsize,
}

#[async_trait]
impl HttpTransport for OverlappingBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        if request.url.ends_with("/api/v1/refresh") {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            return Ok(HttpResponse::json(
                200,
                &json!({"success": true, "accessToken": self.fresh}),
            ));
        }

        if request.bearer_token() == Some(self.fresh.as_str()) {
            return Ok(HttpResponse::json(200, &json!({"url": request.url})));
        }

        if request.url.ends_with("/b") {
            while self.refreshes.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        Ok(HttpResponse::new(401, Vec::<u8>::new()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_401_during_refresh_on_other_thread_shares_the_exchange() {
    let backend = Arc::new(OverlappingBackend {
        stale: valid_token("stale"),
        fresh: valid_token("fresh"),
        refreshes: AtomicUsize::new(0),
    });
    let storage = Arc::new(SlowReadStore {
        inner: InMemoryStore::new(),
        delay: Duration::from_millis(80),
    });
    storage
        .set_many(&[(ACCESS_TOKEN_KEY, backend.stale.as_str()), (REFRESH_TOKEN_KEY, "refresh-1")])
        .unwrap();

    let config = client_config()
        .base_url("http://localhost:4000")
        .build()
        .unwrap();
    let client = Arc::new(AdminApiClient::with_components(config, backend.clone(), storage));

    let tasks: Vec<_> = ["/a", "/b"]
        .into_iter()
        .map(|path| {
            let client = client.clone();
            tokio::spawn(async move { client.send(ApiRequest::get(path)).await })
        })
        .collect();

    for task in tasks {
        let response = tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .expect("request settled")
            .unwrap()
            .unwrap();
        assert_eq!(response.status, 200);
    }

    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(
        client.tokens().get_access_token().unwrap().as_deref(),
        Some(backend.fresh.as_str())
    );
}
