// tests/watch_tests.rs
use futures::TryStreamExt;
use runwatch::config::ClientConfig;
use runwatch::{ExecutionTask, Reason, WatchClient, WatchError, WatchEvent};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, token: Option<&str>) -> WatchClient {
    WatchClient::new(ClientConfig {
        api_base: format!("{}/_api", server.uri()),
        token: token.map(str::to_string),
        ..ClientConfig::default()
    })
    .unwrap()
}

fn task() -> ExecutionTask {
    ExecutionTask::new("u1", 0, vec!["int main() { return 0; }".to_string()])
}

#[tokio::test]
async fn test_streams_events() {
    let server = MockServer::start().await;
    let body = concat!(
        "{\"id\":9,\"pos\":1}\n",
        "{\"id\":9,\"pos\":0}\n",
        "{\"id\":9,\"pos\":-1}\n",
        "[{\"code\":0,\"data\":{\"execTime\":0.01,\"execMemory\":2048,\"syscall\":0,\"termsig\":0}},",
        "{\"code\":2,\"execTime\":1.0,\"execMemory\":2048,\"syscall\":0,\"termsig\":9}]\n",
    );
    Mock::given(method("POST"))
        .and(path("/_api/run/watched/u1"))
        .and(body_json(json!({ "index": 0, "code": ["int main() { return 0; }"] })))
        .and(header("cookie", "zdotoj-token=secret"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/plain; charset=utf-8"))
        .expect(1)
        .mount(&server)
        .await;

    let events: Vec<WatchEvent> = client_for(&server, Some("secret"))
        .watch(&task())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(events.len(), 3);
    assert_eq!(events[1].position(), Some(0));
    match &events[2] {
        WatchEvent::Result(result) => {
            assert_eq!(result.task_id, Some(9));
            assert_eq!(result.passed(), 1);
            assert_eq!(result.results[1].label(), "TLE");
        }
        other => panic!("expected a result event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejection_precedes_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_api/run/watched/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "reason": { "code": 1, "category": "objective", "id": "notReady", "message": "not ready" }
        })))
        .mount(&server)
        .await;

    let err = match client_for(&server, None).watch(&task()).await {
        Ok(_) => panic!("a rejected run must not produce a stream"),
        Err(e) => e,
    };
    assert_eq!(
        err.reason(),
        Some(&Reason {
            code: 1,
            category: "objective".to_string(),
            id: "notReady".to_string(),
            message: "not ready".to_string(),
        })
    );
    assert_eq!(err.to_string(), "Error prior to running: not ready");
}

#[tokio::test]
async fn test_non_200_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client_for(&server, None).watch(&task()).await.err().unwrap();
    assert!(err.is_transport());
    assert!(matches!(err, WatchError::Status { status: 500 }));
}

#[tokio::test]
async fn test_other_success_status_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202).set_body_raw("{\"id\":1,\"pos\":0}\n", "text/plain"))
        .mount(&server)
        .await;

    let err = client_for(&server, None).watch(&task()).await.err().unwrap();
    assert!(matches!(err, WatchError::Status { status: 202 }));
}

#[tokio::test]
async fn test_document_without_reason_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "data": 1 })))
        .mount(&server)
        .await;

    let err = client_for(&server, None).watch(&task()).await.err().unwrap();
    assert!(err.is_decode());
}

#[tokio::test]
async fn test_unreachable_server() {
    let client = WatchClient::new(ClientConfig {
        api_base: "http://127.0.0.1:9/_api".to_string(),
        connect_timeout_secs: 1,
        ..ClientConfig::default()
    })
    .unwrap();
    let err = client.watch(&task()).await.err().unwrap();
    assert!(err.is_transport());
}
