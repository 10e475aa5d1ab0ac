//! Integration tests against a WireMock backend.

use super::*;
use quiz_admin_client::{
    client_config, AdminApiClient, ApiRequest, ClientConfig, ClientError, Credentials,
    InMemoryStore, KeyValueStore, RecordingSessionListener, SessionError, ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn config_for(server: &MockServer) -> ClientConfig {
    client_config().base_url(server.uri()).build().unwrap()
}

fn signed_in_storage(access: &str) -> Arc<InMemoryStore> {
    let storage = Arc::new(InMemoryStore::new());
    storage
        .set_many(&[(ACCESS_TOKEN_KEY, access), (REFRESH_TOKEN_KEY, "refresh-1")])
        .unwrap();
    storage
}

#[tokio::test]
async fn test_bearer_and_query_reach_the_backend() {
    let server = setup_mock_server().await;
    let access = valid_token("admin");

    Mock::given(method("GET"))
        .and(path("/api/v1/results"))
        .and(query_param("essay", "7"))
        .and(header("authorization", format!("Bearer {}", access).as_str()))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"score": 9}])))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        AdminApiClient::with_storage(config_for(&server), signed_in_storage(&access)).unwrap();

    let response = client
        .send(ApiRequest::get("/api/v1/results").query("essay", "7"))
        .await
        .unwrap();
    let results: serde_json::Value = response.parse_json().unwrap();
    assert_eq!(results[0]["score"], 9);
}

#[tokio::test]
async fn test_refresh_exchange_over_http() {
    let server = setup_mock_server().await;
    let stale = valid_token("stale");
    let fresh = valid_token("fresh");

    Mock::given(method("PUT"))
        .and(path("/api/v1/quizzes/5"))
        .and(header("authorization", format!("Bearer {}", stale).as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/refresh"))
        .and(header("cookie", "refreshToken=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "accessToken": fresh,
            "refreshToken": "refresh-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/quizzes/5"))
        .and(header("authorization", format!("Bearer {}", fresh).as_str()))
        .and(body_json(json!({"title": "Week 5"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5, "title": "Week 5"})))
        .expect(1)
        .mount(&server)
        .await;

    let listener = Arc::new(RecordingSessionListener::new());
    let client = AdminApiClient::with_storage(config_for(&server), signed_in_storage(&stale))
        .unwrap()
        .with_listener(listener.clone());

    let quiz: serde_json::Value = client
        .put_json("/api/v1/quizzes/5", &json!({"title": "Week 5"}))
        .await
        .unwrap();

    assert_eq!(quiz["title"], "Week 5");
    assert_eq!(client.tokens().get_access_token().unwrap(), Some(fresh));
    assert_eq!(listener.refresh_count(), 1);
}

#[tokio::test]
async fn test_rejected_refresh_signs_out() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/violations"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/refresh"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"success": false, "message": "revoked"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let listener = Arc::new(RecordingSessionListener::new());
    let client = AdminApiClient::with_storage(
        config_for(&server),
        signed_in_storage(&valid_token("stale")),
    )
    .unwrap()
    .with_listener(listener.clone());

    let error = client
        .get_json::<serde_json::Value>("/api/v1/violations")
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        ClientError::Session(SessionError::RefreshFailed { .. })
    ));
    assert!(error.needs_reauth());
    assert!(!client.tokens().has_session().unwrap());
    assert_eq!(listener.sign_outs(), vec!["/".to_string()]);
}

#[tokio::test]
async fn test_server_errors_are_not_refreshed() {
    let server = setup_mock_server().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/essays/2"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"success": false, "message": "boom"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = AdminApiClient::with_storage(
        config_for(&server),
        signed_in_storage(&valid_token("admin")),
    )
    .unwrap();

    let error = client.delete("/api/v1/essays/2").await.unwrap_err();
    assert_eq!(error.status(), Some(500));
    assert!(error.is_retryable());
    assert_eq!(quiz_admin_client::get_user_message(&error), "boom");
}

#[tokio::test]
async fn test_sign_in_and_logout() {
    let server = setup_mock_server().await;
    let access = valid_token("admin");

    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .and(body_json(json!({"email": "ada@example.edu", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "accessToken": access,
            "refreshToken": "refresh-1",
            "user": {"name": "Ada"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/logout"))
        .and(header("authorization", format!("Bearer {}", access).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let listener = Arc::new(RecordingSessionListener::new());
    let client = AdminApiClient::new(config_for(&server))
        .unwrap()
        .with_listener(listener.clone());

    let profile = client
        .sign_in(&Credentials::new("ada@example.edu", "hunter2"))
        .await
        .unwrap();
    assert_eq!(profile.unwrap()["name"], "Ada");
    assert!(client.tokens().has_session().unwrap());

    client.logout().await.unwrap();

    assert!(!client.tokens().has_session().unwrap());
    assert_eq!(client.profile().unwrap(), None);
    assert_eq!(listener.sign_outs(), vec!["/".to_string()]);
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_error() {
    // Bind then release an ephemeral port so nothing is listening on it.
    let address = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let config = client_config()
        .base_url(format!("http://{}", address))
        .build()
        .unwrap();

    let client = AdminApiClient::new(config).unwrap();
    let error = client
        .get_json::<serde_json::Value>("/api/v1/quizzes")
        .await
        .unwrap_err();

    assert!(matches!(error, ClientError::Network(_)));
}
