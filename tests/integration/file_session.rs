//! Sessions persisted through the file store survive a client restart.

use super::*;
use quiz_admin_client::{
    client_config, AdminApiClient, ClientConfig, Credentials, FileStore, KeyValueStore,
    ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn config_for(server: &MockServer) -> ClientConfig {
    client_config().base_url(server.uri()).build().unwrap()
}

#[tokio::test]
async fn test_session_survives_restart() {
    let server = setup_mock_server().await;
    let dir = TempDir::new().unwrap();
    let session_file = dir.path().join("admin").join("session.json");
    let access = valid_token("admin");

    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "accessToken": access,
            "refreshToken": "refresh-1",
            "user": {"name": "Ada"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/quizzes"))
        .and(header("authorization", format!("Bearer {}", access).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    {
        let storage = Arc::new(FileStore::open(&session_file).unwrap());
        let client = AdminApiClient::with_storage(config_for(&server), storage).unwrap();
        client
            .sign_in(&Credentials::new("ada@example.edu", "hunter2"))
            .await
            .unwrap();
    }

    let storage = Arc::new(FileStore::open(&session_file).unwrap());
    let client = AdminApiClient::with_storage(config_for(&server), storage).unwrap();

    assert_eq!(client.profile().unwrap().unwrap()["name"], "Ada");
    let quizzes: serde_json::Value = client.get_json("/api/v1/quizzes").await.unwrap();
    assert_eq!(quizzes, json!([]));
}

#[tokio::test]
async fn test_refreshed_tokens_are_persisted() {
    let server = setup_mock_server().await;
    let dir = TempDir::new().unwrap();
    let session_file = dir.path().join("session.json");
    let stale = token_with_exp("admin", chrono::Utc::now().timestamp() - 5);
    let fresh = valid_token("admin");

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

    Mock::given(method("GET"))
        .and(path("/api/v1/essays"))
        .and(header("authorization", format!("Bearer {}", fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(FileStore::open(&session_file).unwrap());
    storage
        .set_many(&[(ACCESS_TOKEN_KEY, stale.as_str()), (REFRESH_TOKEN_KEY, "refresh-1")])
        .unwrap();
    let client = AdminApiClient::with_storage(config_for(&server), storage).unwrap();

    // The expired token is exchanged before the request goes out.
    let _: serde_json::Value = client.get_json("/api/v1/essays").await.unwrap();

    let reopened = FileStore::open(&session_file).unwrap();
    assert_eq!(reopened.get(ACCESS_TOKEN_KEY).unwrap(), Some(fresh));
    assert_eq!(
        reopened.get(REFRESH_TOKEN_KEY).unwrap().as_deref(),
        Some("refresh-2")
    );
}
