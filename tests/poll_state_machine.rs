//! Polling state machine driven by a scripted in-process transport.
//!
//! Tests run on a paused tokio clock, so interval and budget arithmetic is
//! deterministic and no test actually waits.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kie_veo::protocol::{EndpointConfig, Method};
use kie_veo::telemetry::InMemoryEventSink;
use kie_veo::transport::{Transport, TransportError};
use kie_veo::{
    CancelHandle, Error, GenerationRequest, JobClient, JobEvent, PollOptions, StatusSignal,
};
use serde_json::{json, Value};

enum Step {
    Reply(Value),
    Exhausted,
    Hang,
}

/// Replays `steps` in order; the last step repeats once the script runs out.
struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<(Method, String)>>,
}

impl ScriptedTransport {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn replies(values: Vec<Value>) -> Arc<Self> {
        Self::new(values.into_iter().map(Step::Reply).collect())
    }

    fn calls(&self) -> Vec<(Method, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(
        &self,
        endpoint: &EndpointConfig,
        _body: Option<&Value>,
    ) -> kie_veo::Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.method, endpoint.path()));
        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.pop_front()
            } else {
                steps.front().map(|s| match s {
                    Step::Reply(v) => Step::Reply(v.clone()),
                    Step::Exhausted => Step::Exhausted,
                    Step::Hang => Step::Hang,
                })
            }
        };
        match step {
            Some(Step::Reply(v)) => Ok(v),
            Some(Step::Exhausted) | None => Err(Error::TransportExhausted {
                method: endpoint.method.as_str().to_string(),
                url: endpoint.path(),
                attempts: 3,
                source: TransportError::Other("connection reset".into()),
            }),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::configuration("hung call was not cancelled"))
            }
        }
    }
}

fn flag(n: i64) -> Value {
    json!({
        "code": 200,
        "msg": "success",
        "data": { "taskId": "abc123", "successFlag": n }
    })
}

fn done(url: &str) -> Value {
    json!({
        "code": 200,
        "msg": "success",
        "data": {
            "taskId": "abc123",
            "successFlag": 1,
            "response": { "resultUrls": [url] }
        }
    })
}

fn client(transport: Arc<ScriptedTransport>, events: Arc<InMemoryEventSink>) -> JobClient {
    JobClient::builder()
        .transport(transport)
        .event_sink(events)
        .build()
        .unwrap()
}

fn secs(interval: u64, timeout: u64) -> PollOptions {
    PollOptions::new(Duration::from_secs(interval), Duration::from_secs(timeout))
}

#[tokio::test(start_paused = true)]
async fn succeeds_after_three_observations() {
    let transport = ScriptedTransport::replies(vec![flag(0), flag(0), done("https://cdn/x.mp4")]);
    let events = Arc::new(InMemoryEventSink::default());
    let client = client(transport.clone(), events.clone());

    let (status, report) = client
        .poll_until_complete_with_report("abc123", &secs(1, 10), &CancelHandle::new())
        .await
        .unwrap();

    assert_eq!(status.asset_url(), Some("https://cdn/x.mp4"));
    assert_eq!(report.observations, 3);
    assert_eq!(report.transitions, 2);
    assert_eq!(transport.call_count(), 3);
    assert!(report.elapsed >= Duration::from_secs(2));
    assert_eq!(events.named("completed").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_status_logs_one_transition_per_value() {
    let transport = ScriptedTransport::replies(vec![
        flag(0),
        flag(0),
        flag(0),
        flag(0),
        done("https://cdn/x.mp4"),
    ]);
    let events = Arc::new(InMemoryEventSink::default());
    let client = client(transport, events.clone());

    client
        .poll_until_complete_with("abc123", &secs(1, 60), &CancelHandle::new())
        .await
        .unwrap();

    let transitions: Vec<(Option<StatusSignal>, StatusSignal)> = events
        .named("state_transition")
        .into_iter()
        .map(|e| match e {
            JobEvent::StateTransition { from, to, .. } => (from, to),
            other => panic!("unexpected: {other:?}"),
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (None, StatusSignal::Flag(0)),
            (Some(StatusSignal::Flag(0)), StatusSignal::Flag(1)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn times_out_once_budget_is_exceeded() {
    let transport = ScriptedTransport::replies(vec![flag(0)]);
    let events = Arc::new(InMemoryEventSink::default());
    let client = client(transport.clone(), events.clone());
    let options = PollOptions::new(Duration::from_secs(1), Duration::from_millis(10_500));

    let err = client
        .poll_until_complete_with("abc123", &options, &CancelHandle::new())
        .await
        .unwrap_err();

    match err {
        Error::PollTimeout {
            task_id,
            elapsed,
            observations,
        } => {
            assert_eq!(task_id, "abc123");
            assert!(elapsed > options.timeout);
            assert_eq!(observations, 12);
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(transport.call_count(), 12);
    assert_eq!(events.named("timed_out").len(), 1);
    assert_eq!(events.named("state_transition").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_never_fires_before_interval_ratio() {
    let transport = ScriptedTransport::replies(vec![flag(0)]);
    let client = client(transport.clone(), Arc::new(InMemoryEventSink::default()));

    let err = client
        .poll_until_complete_with("abc123", &secs(1, 10), &CancelHandle::new())
        .await
        .unwrap_err();

    match err {
        Error::PollTimeout {
            elapsed,
            observations,
            ..
        } => {
            assert!(elapsed > Duration::from_secs(10));
            assert!(observations >= 11);
            assert_eq!(observations as usize, transport.call_count());
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn explicit_failure_carries_remote_details() {
    let transport = ScriptedTransport::replies(vec![
        flag(0),
        json!({
            "code": 200,
            "msg": "success",
            "data": {
                "taskId": "abc123",
                "successFlag": 2,
                "errorCode": 500,
                "errorMessage": "render farm unavailable"
            }
        }),
    ]);
    let events = Arc::new(InMemoryEventSink::default());
    let client = client(transport.clone(), events.clone());

    let err = client
        .poll_until_complete_with("abc123", &secs(1, 10), &CancelHandle::new())
        .await
        .unwrap_err();

    match &err {
        Error::JobFailed {
            task_id,
            error_code,
            error_message,
        } => {
            assert_eq!(task_id, "abc123");
            assert_eq!(error_code.as_deref(), Some("500"));
            assert_eq!(error_message.as_deref(), Some("render farm unavailable"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(err.exit_code(), 6);
    assert_eq!(transport.call_count(), 2);
    assert_eq!(events.named("failed").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn success_without_asset_is_inconsistent() {
    let transport = ScriptedTransport::replies(vec![json!({
        "code": 200,
        "msg": "success",
        "data": {
            "taskId": "abc123",
            "successFlag": 1,
            "response": { "resultUrls": [] },
            "errorCode": 500
        }
    })]);
    let events = Arc::new(InMemoryEventSink::default());
    let client = client(transport, events.clone());

    let err = client
        .poll_until_complete_with("abc123", &secs(1, 10), &CancelHandle::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InconsistentTerminalState { .. }));
    assert_eq!(events.named("inconsistent").len(), 1);
    assert!(events.named("completed").is_empty());
}

#[tokio::test(start_paused = true)]
async fn success_with_asset_wins_over_error_code() {
    let transport = ScriptedTransport::replies(vec![json!({
        "code": 200,
        "msg": "success",
        "data": {
            "taskId": "abc123",
            "successFlag": 1,
            "response": { "resultUrls": ["https://cdn/x.mp4"] },
            "errorCode": 500
        }
    })]);
    let client = client(transport, Arc::new(InMemoryEventSink::default()));

    let status = client
        .poll_until_complete_with("abc123", &secs(1, 10), &CancelHandle::new())
        .await
        .unwrap();
    assert_eq!(status.asset_url(), Some("https://cdn/x.mp4"));
    assert_eq!(status.error_code.as_deref(), Some("500"));
}

#[tokio::test(start_paused = true)]
async fn deadline_cancels_the_pause_between_polls() {
    let transport = ScriptedTransport::replies(vec![flag(0)]);
    let events = Arc::new(InMemoryEventSink::default());
    let client = client(transport.clone(), events.clone());
    let cancel = CancelHandle::with_timeout(Duration::from_millis(3_500));

    let err = client
        .poll_until_complete_with("abc123", &secs(1, 600), &cancel)
        .await
        .unwrap_err();

    match &err {
        Error::PollCancelled {
            elapsed,
            observations,
            ..
        } => {
            assert_eq!(*observations, 4);
            assert!(*elapsed < Duration::from_secs(4));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(err.exit_code(), 130);
    assert_eq!(transport.call_count(), 4);
    assert_eq!(events.named("cancelled").len(), 1);
    assert!(events.named("timed_out").is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_an_in_flight_status_call() {
    let transport = ScriptedTransport::new(vec![Step::Hang]);
    let client = client(transport.clone(), Arc::new(InMemoryEventSink::default()));
    let cancel = CancelHandle::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = client
        .poll_until_complete_with("abc123", &secs(1, 600), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PollCancelled { observations: 0, .. }));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_handle_makes_no_calls() {
    let transport = ScriptedTransport::replies(vec![flag(0)]);
    let client = client(transport.clone(), Arc::new(InMemoryEventSink::default()));
    let cancel = CancelHandle::new();
    cancel.cancel();

    let err = client
        .poll_until_complete_with("abc123", &secs(1, 600), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PollCancelled { .. }));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn transport_exhaustion_propagates_unchanged() {
    let transport = ScriptedTransport::new(vec![Step::Reply(flag(0)), Step::Exhausted]);
    let client = client(transport.clone(), Arc::new(InMemoryEventSink::default()));

    let err = client
        .poll_until_complete_with("abc123", &secs(1, 600), &CancelHandle::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TransportExhausted { attempts: 3, .. }));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn malformed_status_is_fatal() {
    let transport = ScriptedTransport::replies(vec![json!({
        "code": 200,
        "msg": "success",
        "data": { "successFlag": 0 }
    })]);
    let client = client(transport.clone(), Arc::new(InMemoryEventSink::default()));

    let err = client
        .poll_until_complete_with("abc123", &secs(1, 600), &CancelHandle::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedResponse { .. }));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn generate_submits_then_polls() {
    let transport = ScriptedTransport::replies(vec![
        json!({ "code": 200, "msg": "success", "data": { "taskId": "abc123" } }),
        flag(0),
        done("https://cdn/x.mp4"),
    ]);
    let events = Arc::new(InMemoryEventSink::default());
    let client = JobClient::builder()
        .transport(transport.clone())
        .event_sink(events.clone())
        .poll_options(secs(1, 10))
        .build()
        .unwrap();

    let request = GenerationRequest::builder("A cat walks.")
        .image_url("https://x/img.jpg")
        .build()
        .unwrap();
    let status = client.generate(&request, &CancelHandle::new()).await.unwrap();

    assert_eq!(status.asset_url(), Some("https://cdn/x.mp4"));
    let calls = transport.calls();
    assert_eq!(calls[0], (Method::Post, "/generate".to_string()));
    assert_eq!(calls[1], (Method::Get, "/record-info".to_string()));
    assert_eq!(calls.len(), 3);

    let names: Vec<&str> = events.events().iter().map(JobEvent::name).collect();
    assert_eq!(
        names,
        vec!["submitted", "state_transition", "state_transition", "completed"]
    );
}
