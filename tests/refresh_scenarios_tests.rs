mod support;

use std::sync::Arc;
use std::time::Duration;

use portal_client::auth::{AuthError, KeyValueStore, MemoryKeyValueStore, TeardownReason};
use portal_client::client::{ApiRequest, RefreshState};
use portal_client::error::ClientError;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{client_for, seeded_store, session_keys_absent, RecordingSignal};

fn token_not_valid() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "detail": "Given token not valid for any token type",
        "code": "token_not_valid"
    }))
}

async fn mount_resource(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "route": route })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", "Bearer A1"))
        .respond_with(token_not_valid())
        .mount(server)
        .await;
}

#[tokio::test]
async fn empty_store_sends_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/colleges/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let kv = Arc::new(MemoryKeyValueStore::new());
    let client = client_for(&server, kv, Arc::new(RecordingSignal::new()));
    let colleges: serde_json::Value = client.get_json("/colleges/").await.unwrap();

    assert_eq!(colleges, json!([]));
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn expired_access_is_renewed_and_request_replayed() {
    let server = MockServer::start().await;
    mount_resource(&server, "/api/syllabi/").await;
    Mock::given(method("POST"))
        .and(path("/api/refresh/"))
        .and(body_json(json!({ "refresh": "R1-refresh" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1)
        .mount(&server)
        .await;

    let kv = seeded_store("A1", "R1-refresh");
    let signal = Arc::new(RecordingSignal::new());
    let client = client_for(&server, kv.clone(), signal.clone());

    let body: serde_json::Value = client.get_json("/syllabi/").await.unwrap();

    assert_eq!(body, json!({ "route": "/api/syllabi/" }));
    assert_eq!(kv.get("access").unwrap().as_deref(), Some("A2"));
    assert_eq!(kv.get("refresh").unwrap().as_deref(), Some("R1-refresh"));
    assert_eq!(client.refresh_state(), RefreshState::Idle);
    assert!(signal.reasons().is_empty());
}

#[tokio::test]
async fn concurrent_failures_share_a_single_renewal() {
    let server = MockServer::start().await;
    mount_resource(&server, "/api/x/").await;
    mount_resource(&server, "/api/y/").await;
    Mock::given(method("POST"))
        .and(path("/api/refresh/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "A2" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let kv = seeded_store("A1", "R1");
    let client = client_for(&server, kv.clone(), Arc::new(RecordingSignal::new()));

    let (x, y) = tokio::join!(
        client.send(ApiRequest::get("/x/")),
        client.send(ApiRequest::get("/y/")),
    );

    assert_eq!(x.unwrap().text(), r#"{"route":"/api/x/"}"#);
    assert_eq!(y.unwrap().text(), r#"{"route":"/api/y/"}"#);
    assert_eq!(kv.get("access").unwrap().as_deref(), Some("A2"));
    assert_eq!(client.pending_callers(), 0);
}

#[tokio::test]
async fn rejected_renewal_fails_every_caller_and_clears_the_session() {
    let server = MockServer::start().await;
    mount_resource(&server, "/api/x/").await;
    mount_resource(&server, "/api/y/").await;
    Mock::given(method("POST"))
        .and(path("/api/refresh/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "detail": "Token is blacklisted", "code": "token_not_valid" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/logout/"))
        .respond_with(ResponseTemplate::new(205))
        .expect(0)
        .mount(&server)
        .await;

    let kv = seeded_store("A1", "R1");
    let signal = Arc::new(RecordingSignal::new());
    let client = client_for(&server, kv.clone(), signal.clone());

    let (x, y) = tokio::join!(
        client.send(ApiRequest::get("/x/")),
        client.send(ApiRequest::get("/y/")),
    );

    for result in [x, y] {
        match result {
            Err(ClientError::RenewalFailed(AuthError::RenewalRejected { status, .. })) => {
                assert_eq!(status, 400)
            }
            other => panic!("expected RenewalFailed, got {other:?}"),
        }
    }
    assert!(session_keys_absent(kv.as_ref()));
    assert_eq!(signal.reasons(), vec![TeardownReason::RenewalFailed]);
    assert_eq!(client.refresh_state(), RefreshState::Idle);
}

#[tokio::test]
async fn request_rejected_after_replay_is_returned_as_still_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tos/"))
        .respond_with(token_not_valid())
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1)
        .mount(&server)
        .await;

    let kv = seeded_store("A1", "R1");
    let signal = Arc::new(RecordingSignal::new());
    let client = client_for(&server, kv.clone(), signal.clone());

    let err = client.send(ApiRequest::get("/tos/")).await.unwrap_err();

    assert!(matches!(err, ClientError::StillUnauthorized(_)));
    assert_eq!(err.status(), Some(401));
    assert!(signal.reasons().is_empty());
    assert_eq!(kv.get("access").unwrap().as_deref(), Some("A2"));
}

#[tokio::test]
async fn rotated_refresh_credential_is_persisted() {
    let server = MockServer::start().await;
    mount_resource(&server, "/api/memos/").await;
    Mock::given(method("POST"))
        .and(path("/api/refresh/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access": "A2", "refresh": "R2" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let kv = seeded_store("A1", "R1");
    let client = client_for(&server, kv.clone(), Arc::new(RecordingSignal::new()));

    client.send(ApiRequest::get("/memos/")).await.unwrap();

    assert_eq!(kv.get("refresh").unwrap().as_deref(), Some("R2"));
}

#[tokio::test]
async fn other_error_statuses_pass_through_without_renewal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/syllabi/9/approve/"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({ "detail": "You do not have permission to perform this action." })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(0)
        .mount(&server)
        .await;

    let kv = seeded_store("A1", "R1");
    let client = client_for(&server, kv, Arc::new(RecordingSignal::new()));

    let err = client
        .post_json::<_, serde_json::Value>("/syllabi/9/approve/", &json!({}))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert!(!err.is_session_fatal());
}

#[tokio::test]
async fn missing_refresh_credential_ends_the_session() {
    let server = MockServer::start().await;
    mount_resource(&server, "/api/x/").await;
    Mock::given(method("POST"))
        .and(path("/api/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(0)
        .mount(&server)
        .await;

    let kv = seeded_store("A1", "R1");
    kv.remove("refresh").unwrap();
    let signal = Arc::new(RecordingSignal::new());
    let client = client_for(&server, kv.clone(), signal.clone());

    let err = client.send(ApiRequest::get("/x/")).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::RenewalFailed(AuthError::MissingRefreshCredential)
    ));
    assert!(err.is_session_fatal());
    assert!(session_keys_absent(kv.as_ref()));
    assert_eq!(signal.reasons(), vec![TeardownReason::RenewalFailed]);
}
