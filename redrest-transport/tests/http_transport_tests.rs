#![cfg(feature = "http")]

// HTTP transport tests against a local mock server
// Cover paths, headers, response decoding and error mapping

use indexmap::IndexMap;
use mockito::{Matcher, Server};
use redrest_core::{Batch, Command};
use redrest_transport::{
    HttpConfig, HttpTransport, Requester, ResponseEncoding, RestRequest, TransportError,
};
use serde_json::json;

fn config(url: String) -> HttpConfig {
    HttpConfig {
        base_url: url,
        headers: IndexMap::from([("Authorization".to_string(), "Bearer secret".to_string())]),
        ..Default::default()
    }
}

fn pipeline_request(commands: Vec<Command>) -> RestRequest {
    RestRequest::new(vec!["pipeline".to_string()], Batch::from(commands))
}

// ============================================================================
// REQUEST SHAPE
// ============================================================================

#[tokio::test]
async fn test_posts_batch_with_auth_and_encoding_headers() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/pipeline")
        .match_header("authorization", "Bearer secret")
        .match_header("content-type", "application/json")
        .match_header("upstash-encoding", "base64")
        .match_body(Matcher::Json(json!([["SET", "greeting", "hello"], ["GET", "greeting"]])))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"result":"OK"},{"result":"aGVsbG8="}]"#)
        .create_async()
        .await;

    let transport = HttpTransport::new(config(server.url())).unwrap();
    let response = transport
        .send(pipeline_request(vec![
            Command::new("SET").arg("greeting").arg("hello"),
            Command::new("GET").arg("greeting"),
        ]))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!([{"result": "OK"}, {"result": "hello"}]));
}

#[tokio::test]
async fn test_plain_encoding_leaves_results_untouched() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/multi-exec")
        .match_header("upstash-encoding", Matcher::Missing)
        .with_status(200)
        .with_body(r#"[{"result":"aGVsbG8="}]"#)
        .create_async()
        .await;

    let transport = HttpTransport::new(HttpConfig {
        response_encoding: ResponseEncoding::None,
        ..config(server.url())
    })
    .unwrap();
    let request = RestRequest::new(
        vec!["multi-exec".to_string()],
        Batch::from(vec![Command::new("GET").arg("k")]),
    );
    let response = transport.send(request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.body, json!([{"result": "aGVsbG8="}]));
}

// ============================================================================
// READ-YOUR-WRITES
// ============================================================================

#[tokio::test]
async fn test_sync_token_is_carried_to_next_request() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", "/pipeline")
        .match_header("upstash-sync-token", Matcher::Missing)
        .with_status(200)
        .with_header("upstash-sync-token", "abc")
        .with_body(r#"[{"result":"OK"}]"#)
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/pipeline")
        .match_header("upstash-sync-token", "abc")
        .with_status(200)
        .with_body(r#"[{"result":"T0s="}]"#)
        .expect(1)
        .create_async()
        .await;

    let transport = HttpTransport::new(config(server.url())).unwrap();
    transport
        .send(pipeline_request(vec![Command::new("SET").arg("k").arg("v")]))
        .await
        .unwrap();
    assert_eq!(transport.sync_token().as_deref(), Some("abc"));

    transport
        .send(pipeline_request(vec![Command::new("GET").arg("k")]))
        .await
        .unwrap();

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_sync_token_ignored_when_disabled() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/pipeline")
        .match_header("upstash-sync-token", Matcher::Missing)
        .with_status(200)
        .with_header("upstash-sync-token", "abc")
        .with_body(r#"[{"result":"OK"}]"#)
        .expect(2)
        .create_async()
        .await;

    let transport = HttpTransport::new(HttpConfig {
        read_your_writes: false,
        ..config(server.url())
    })
    .unwrap();
    for _ in 0..2 {
        transport
            .send(pipeline_request(vec![Command::new("PING")]))
            .await
            .unwrap();
    }

    mock.assert_async().await;
    assert_eq!(transport.sync_token(), None);
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

#[tokio::test]
async fn test_server_error_body_becomes_http_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/pipeline")
        .with_status(500)
        .with_body(r#"{"error":"internal failure"}"#)
        .create_async()
        .await;

    let transport = HttpTransport::new(config(server.url())).unwrap();
    let err = transport
        .send(pipeline_request(vec![Command::new("PING")]))
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::http(500, "internal failure"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unauthorized_is_not_retryable() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/pipeline")
        .with_status(401)
        .with_body(r#"{"error":"Unauthorized"}"#)
        .create_async()
        .await;

    let transport = HttpTransport::new(config(server.url())).unwrap();
    let err = transport
        .send(pipeline_request(vec![Command::new("PING")]))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_plain_text_error_body_is_kept() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/pipeline")
        .with_status(502)
        .with_body("Bad Gateway")
        .create_async()
        .await;

    let transport = HttpTransport::new(config(server.url())).unwrap();
    let err = transport
        .send(pipeline_request(vec![Command::new("PING")]))
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::http(502, "Bad Gateway"));
}

#[tokio::test]
async fn test_invalid_json_on_success_is_protocol_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/pipeline")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let transport = HttpTransport::new(config(server.url())).unwrap();
    let err = transport
        .send(pipeline_request(vec![Command::new("PING")]))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Protocol(_)));
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let transport = HttpTransport::new(config("http://127.0.0.1:1".to_string())).unwrap();
    let err = transport
        .send(pipeline_request(vec![Command::new("PING")]))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Network(_)));
    assert!(err.is_retryable());
}
