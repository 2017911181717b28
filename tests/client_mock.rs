//! Job client against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use kie_veo::telemetry::InMemoryEventSink;
use kie_veo::transport::RetryPolicy;
use kie_veo::{
    ApiFlavor, CancelHandle, Error, GenerationRequest, JobClient, JobEvent, PollOptions,
    StatusSignal, TaskPhase,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

const API_KEY: &str = "test-key";

fn client_for(server: &ServerGuard, flavor: ApiFlavor, retry: RetryPolicy) -> JobClient {
    JobClient::builder()
        .flavor(flavor)
        .api_key(API_KEY)
        .base_url_override(server.url())
        .call_timeout(Duration::from_secs(5))
        .retry_policy(retry)
        .build()
        .unwrap()
}

fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_millis(5))
}

fn cat_request() -> GenerationRequest {
    GenerationRequest::builder("A cat walks.")
        .image_url("https://x/img.jpg")
        .model("veo3")
        .aspect_ratio("9:16")
        .build()
        .unwrap()
}

#[tokio::test]
async fn submit_returns_task_id_from_envelope() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/generate")
        .match_header("authorization", "Bearer test-key")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "prompt": "A cat walks.",
            "imageUrls": ["https://x/img.jpg"],
            "model": "veo3",
            "aspectRatio": "9:16"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code":200,"msg":"success","data":{"taskId":"abc123"}}"#)
        .expect(1)
        .create_async()
        .await;

    let events = Arc::new(InMemoryEventSink::default());
    let client = JobClient::builder()
        .api_key(API_KEY)
        .base_url_override(server.url())
        .event_sink(events.clone())
        .build()
        .unwrap();

    let submission = assert_ok!(client.submit(&cat_request()).await);
    assert_eq!(submission.task_id, "abc123");
    mock.assert_async().await;

    let submitted = events.named("submitted");
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].task_id(), Some("abc123"));
}

#[tokio::test]
async fn envelope_rejection_is_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/generate")
        .with_status(200)
        .with_body(r#"{"code":402,"msg":"insufficient credits","data":null}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, ApiFlavor::Enveloped, fast_retry(3));
    let err = assert_err!(client.submit(&cat_request()).await);
    match err {
        Error::SubmissionRejected { code, message } => {
            assert_eq!(code, Some(402));
            assert_eq!(message.as_deref(), Some("insufficient credits"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn missing_task_id_is_a_rejection() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/generate")
        .with_status(200)
        .with_body(r#"{"code":200,"msg":"ok","data":{}}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, ApiFlavor::Enveloped, fast_retry(3));
    let err = client.submit(&cat_request()).await.unwrap_err();
    assert!(matches!(err, Error::SubmissionRejected { code: Some(200), .. }));
}

#[tokio::test]
async fn server_errors_exhaust_the_retry_budget() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/generate")
        .with_status(503)
        .with_body("upstream busy")
        .expect(3)
        .create_async()
        .await;

    let events = Arc::new(InMemoryEventSink::default());
    let client = JobClient::builder()
        .api_key(API_KEY)
        .base_url_override(server.url())
        .retry_policy(fast_retry(3))
        .event_sink(events.clone())
        .build()
        .unwrap();

    let err = client.submit(&cat_request()).await.unwrap_err();
    match &err {
        Error::TransportExhausted {
            method,
            attempts,
            source,
            ..
        } => {
            assert_eq!(method, "POST");
            assert_eq!(*attempts, 3);
            assert_eq!(source.status(), Some(503));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(err.exit_code(), 3);
    mock.assert_async().await;
    assert_eq!(events.named("retry_scheduled").len(), 2);
    assert_eq!(events.named("transport_gave_up").len(), 1);
}

#[tokio::test]
async fn non_json_body_is_transient() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/record-info")
        .match_query(Matcher::UrlEncoded("taskId".into(), "abc123".into()))
        .with_status(200)
        .with_body("<html>gateway</html>")
        .expect(2)
        .create_async()
        .await;

    let client = client_for(&server, ApiFlavor::Enveloped, fast_retry(2));
    let err = client.get_status("abc123").await.unwrap_err();
    assert!(matches!(err, Error::TransportExhausted { attempts: 2, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn client_errors_fail_fast_when_hardened() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/generate")
        .with_status(401)
        .with_body(r#"{"msg":"bad key"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(
        &server,
        ApiFlavor::Enveloped,
        fast_retry(3).retry_client_errors(false),
    );
    let err = client.submit(&cat_request()).await.unwrap_err();
    assert!(matches!(err, Error::TransportExhausted { attempts: 1, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn enveloped_status_is_normalized() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/record-info")
        .match_query(Matcher::UrlEncoded("taskId".into(), "abc123".into()))
        .with_status(200)
        .with_body(
            json!({
                "code": 200,
                "msg": "success",
                "data": {
                    "taskId": "abc123",
                    "successFlag": 1,
                    "response": {
                        "resultUrls": ["https://cdn/x.mp4"],
                        "originUrls": ["https://cdn/x-origin.mp4"]
                    },
                    "errorCode": null,
                    "errorMessage": ""
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server, ApiFlavor::Enveloped, fast_retry(1));
    let status = assert_ok!(client.get_status("abc123").await);
    assert_eq!(status.signal, StatusSignal::Flag(1));
    assert_eq!(status.phase, TaskPhase::Succeeded);
    assert!(status.is_terminal_success());
    assert_eq!(status.asset_url(), Some("https://cdn/x.mp4"));
    assert_eq!(status.origin_urls, vec!["https://cdn/x-origin.mp4"]);
    assert_eq!(status.error_code, None);
    assert_eq!(status.error_message, None);
}

#[tokio::test]
async fn enveloped_status_rejection_names_the_task() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/record-info")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"code":404,"msg":"task not found"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, ApiFlavor::Enveloped, fast_retry(3));
    let err = client.get_status("missing").await.unwrap_err();
    match err {
        Error::StatusRejected {
            task_id,
            code,
            message,
        } => {
            assert_eq!(task_id, "missing");
            assert_eq!(code, Some(404));
            assert_eq!(message.as_deref(), Some("task not found"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn flat_flavor_uses_path_segment_and_snake_case() {
    let mut server = Server::new_async().await;
    let submit = server
        .mock("POST", "/generate")
        .match_body(Matcher::PartialJson(json!({
            "reference_image_url": "https://x/img.jpg",
            "aspect_ratio": "9:16"
        })))
        .with_status(200)
        .with_body(r#"{"task_id":"t-9","status":"queued"}"#)
        .create_async()
        .await;
    let status = server
        .mock("GET", "/tasks/t-9")
        .with_status(200)
        .with_body(r#"{"task_id":"t-9","status":"completed","asset_url":"https://cdn/t9.mp4"}"#)
        .create_async()
        .await;

    let client = client_for(&server, ApiFlavor::Flat, fast_retry(1));
    let submission = client.submit(&cat_request()).await.unwrap();
    assert_eq!(submission.task_id, "t-9");

    let done = client
        .poll_until_complete_with(
            &submission.task_id,
            &PollOptions::new(Duration::from_millis(10), Duration::from_secs(5)),
            &CancelHandle::new(),
        )
        .await
        .unwrap();
    assert_eq!(done.signal, StatusSignal::Label("completed".into()));
    assert_eq!(done.asset_url(), Some("https://cdn/t9.mp4"));

    submit.assert_async().await;
    status.assert_async().await;
}

#[tokio::test]
async fn flat_failure_surfaces_remote_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/tasks/t-1")
        .with_status(200)
        .with_body(
            json!({
                "task_id": "t-1",
                "status": "failed",
                "error": "content policy violation",
                "error_code": "422"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let events = Arc::new(InMemoryEventSink::default());
    let client = JobClient::builder()
        .flavor(ApiFlavor::Flat)
        .api_key(API_KEY)
        .base_url_override(server.url())
        .event_sink(events.clone())
        .build()
        .unwrap();

    let err = client.poll_until_complete("t-1").await.unwrap_err();
    match &err {
        Error::JobFailed {
            task_id,
            error_code,
            error_message,
        } => {
            assert_eq!(task_id, "t-1");
            assert_eq!(error_code.as_deref(), Some("422"));
            assert_eq!(error_message.as_deref(), Some("content policy violation"));
        }
        other => panic!("unexpected: {other:?}"),
    }

    let failed = events.named("failed");
    assert_eq!(failed.len(), 1);
    assert!(matches!(failed[0], JobEvent::Failed { .. }));
}
