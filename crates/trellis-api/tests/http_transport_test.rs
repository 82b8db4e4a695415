#![allow(clippy::unwrap_used)]
// Integration tests for `RequestEngine` over `HttpTransport` using wiremock.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, json};
use url::Url;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use trellis_api::{
    Error, HandlerSet, HttpTransport, RequestEngine, RequestOptions, ResourceDef, RouteCall,
    TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn document_def() -> ResourceDef {
    ResourceDef::builder("document")
        .root_uri("/api/")
        .route("CRUD document", "Document")
        .route("GET document/:id/history", "requestHistory")
        .parser("GET document/:id/history", "data")
        .build(&HandlerSet::with_builtins())
        .unwrap()
}

async fn setup_with(def: ResourceDef, config: &TransportConfig) -> (MockServer, RequestEngine) {
    let server = MockServer::start().await;
    let origin = Url::parse(&server.uri()).unwrap();
    let transport = HttpTransport::new(origin, config).unwrap();
    (server, RequestEngine::new(def, Arc::new(transport)))
}

async fn setup() -> (MockServer, RequestEngine) {
    setup_with(document_def(), &TransportConfig::default()).await
}

// ── Route methods ───────────────────────────────────────────────────

#[tokio::test]
async fn test_request_one_without_parser_passes_body_through() {
    let (server, engine) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/document/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "x" })))
        .expect(1)
        .mount(&server)
        .await;

    let value = engine
        .call("requestOneDocument", RouteCall::with_args([1]))
        .await
        .unwrap();

    assert_eq!(value, json!({ "name": "x" }));
}

#[tokio::test]
async fn test_get_sends_remaining_params_as_query() {
    let (server, engine) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/document/7/history"))
        .and(query_param("limit", "5"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "rev": 1 }] })),
        )
        .mount(&server)
        .await;

    let value = engine
        .call(
            "requestHistory",
            RouteCall::new().param("id", 7).param("limit", 5),
        )
        .await
        .unwrap();

    assert_eq!(value, json!([{ "rev": 1 }]));
}

#[tokio::test]
async fn test_update_sends_json_body() {
    let (server, engine) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/document/3"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"title":"Hello"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 3 })))
        .expect(1)
        .mount(&server)
        .await;

    let value = engine
        .call(
            "requestUpdateDocument",
            RouteCall::new().param("id", 3).param("title", "Hello"),
        )
        .await
        .unwrap();

    assert_eq!(value, json!({ "id": 3 }));
}

#[tokio::test]
async fn test_create_sends_form_body() {
    let (server, engine) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/document"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("title=Hello"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 10 })))
        .expect(1)
        .mount(&server)
        .await;

    let value = engine
        .call("requestCreateDocument", RouteCall::new().param("title", "Hello"))
        .await
        .unwrap();

    assert_eq!(value, json!({ "id": 10 }));
}

#[tokio::test]
async fn test_delete_uses_delete_method() {
    let (server, engine) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/document/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "deleted": true })))
        .expect(1)
        .mount(&server)
        .await;

    engine
        .call("requestDeleteDocument", RouteCall::new().param("id", 4))
        .await
        .unwrap();
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_error_status_is_a_transport_failure() {
    let (server, engine) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/document/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .mount(&server)
        .await;

    let err = engine
        .call("requestOneDocument", RouteCall::with_args([404]))
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::HttpStatus { status: 404, ref body } if body == "missing"),
        "expected HttpStatus error, got: {err:?}"
    );
    assert!(err.fail_payload().is_none());
}

#[tokio::test]
async fn test_empty_body_is_a_request_failure() {
    let (server, engine) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/document/2"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = engine
        .call("requestOneDocument", RouteCall::with_args([2]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RequestFailed { status: 200, .. }));
}

#[tokio::test]
async fn test_invalid_json_is_a_deserialization_error() {
    let (server, engine) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/document/5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = engine
        .call("requestOneDocument", RouteCall::with_args([5]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Deserialization { ref body, .. } if body == "<html>"));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let def = ResourceDef::builder("slow")
        .root_uri("/api/")
        .timeout_ms(50)
        .build(&HandlerSet::new())
        .unwrap();
    let (server, engine) = setup_with(def, &TransportConfig::default()).await;

    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = engine
        .get("slow", Map::new(), RequestOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { timeout_ms: 50 }), "got: {err:?}");
    assert!(err.is_transient());
}

// ── Auth ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_token_is_sent_as_bearer_auth() {
    let config = TransportConfig {
        token: Some("s3cret".to_string().into()),
        ..TransportConfig::default()
    };
    let (server, engine) = setup_with(document_def(), &config).await;

    Mock::given(method("GET"))
        .and(path("/api/document/1"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    engine
        .call("requestOneDocument", RouteCall::with_args([1]))
        .await
        .unwrap();
}
