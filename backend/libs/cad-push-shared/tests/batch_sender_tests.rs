/// Integration tests for the batched push sender
///
/// Covers:
/// - Batch partitioning and ordering against a mock gateway
/// - Partial failure isolation (one failed batch does not stop the rest)
/// - Timeouts and transport failures reported per batch
use cad_push_shared::{BatchOutcome, PushBatchSender, PushConfig, PushMessage};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn sender_for(server: &MockServer) -> PushBatchSender {
    PushBatchSender::new(PushConfig {
        endpoint: format!("{}/push", server.uri()),
        ..PushConfig::default()
    })
}

fn tokens(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("ExponentPushToken[{i}]")).collect()
}

fn decode_batch(request: &Request) -> Vec<PushMessage> {
    serde_json::from_slice(&request.body).unwrap()
}

/// Fails exactly one request (by arrival order) with a 500
struct FailNth {
    seen: AtomicUsize,
    fail_at: usize,
}

impl Respond for FailNth {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.seen.fetch_add(1, Ordering::SeqCst);
        if n == self.fail_at {
            ResponseTemplate::new(500)
        } else {
            ResponseTemplate::new(200).set_body_json(json!({"data": []}))
        }
    }
}

#[tokio::test]
async fn test_250_tokens_sent_as_three_ordered_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let input = tokens(250);
    let report = sender_for(&server)
        .send_batched_push(&input, "Panic", "Officer needs assistance", json!({"type": "panic"}))
        .await;

    assert_eq!(report.batch_count(), 3);
    assert!(report.all_delivered());
    assert_eq!(report.delivered_messages(), 250);

    let requests = server.received_requests().await.unwrap();
    let batches: Vec<Vec<PushMessage>> = requests.iter().map(decode_batch).collect();
    assert_eq!(
        batches.iter().map(|b| b.len()).collect::<Vec<_>>(),
        vec![100, 100, 50]
    );

    let sent: Vec<String> = batches
        .into_iter()
        .flatten()
        .map(|m| m.recipient_token)
        .collect();
    assert_eq!(sent, input);
}

#[tokio::test]
async fn test_messages_carry_payload_and_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let data = json!({"communityId": "c1", "callId": "42"});
    sender_for(&server)
        .send_batched_push(&tokens(2), "New call", "Call 42 assigned", data.clone())
        .await;

    let requests = server.received_requests().await.unwrap();
    let batch = decode_batch(&requests[0]);
    assert_eq!(batch.len(), 2);
    for message in batch {
        assert_eq!(message.title, "New call");
        assert_eq!(message.body, "Call 42 assigned");
        assert_eq!(message.data, data);
        assert_eq!(message.sound, "default");
        assert_eq!(message.priority, "high");
        assert_eq!(message.channel, "default");
    }
}

#[tokio::test]
async fn test_failed_middle_batch_does_not_stop_remaining_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push"))
        .respond_with(FailNth {
            seen: AtomicUsize::new(0),
            fail_at: 1,
        })
        .expect(3)
        .mount(&server)
        .await;

    let report = sender_for(&server)
        .send_batched_push(&tokens(250), "t", "b", json!({}))
        .await;

    assert_eq!(report.batch_count(), 3);
    assert!(report.batches[0].is_delivered());
    assert!(matches!(
        &report.batches[1],
        BatchOutcome::Failed { index: 1, size: 100, .. }
    ));
    assert!(report.batches[2].is_delivered());
    assert_eq!(report.delivered_messages(), 150);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    let third = decode_batch(&requests[2]);
    assert_eq!(third[0].recipient_token, "ExponentPushToken[200]");
}

#[tokio::test]
async fn test_non_200_success_status_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let report = sender_for(&server)
        .send_batched_push(&tokens(1), "t", "b", json!({}))
        .await;

    assert_eq!(report.failed_batches(), 1);
}

#[tokio::test]
async fn test_empty_tokens_issue_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = sender_for(&server)
        .send_batched_push(&[], "t", "b", json!({}))
        .await;

    assert_eq!(report.batch_count(), 0);
}

#[tokio::test]
async fn test_slow_gateway_times_out_per_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let sender = PushBatchSender::new(PushConfig {
        endpoint: format!("{}/push", server.uri()),
        batch_size: 100,
        timeout: Duration::from_millis(50),
    });

    let report = sender
        .send_batched_push(&tokens(150), "t", "b", json!({}))
        .await;

    assert_eq!(report.batch_count(), 2);
    assert_eq!(report.failed_batches(), 2);
    match &report.batches[0] {
        BatchOutcome::Failed { error, .. } => assert!(error.contains("timed out")),
        other => panic!("expected timeout failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_gateway_is_reported_not_raised() {
    let sender = PushBatchSender::new(PushConfig {
        endpoint: "http://127.0.0.1:9/push".to_string(),
        batch_size: 100,
        timeout: Duration::from_secs(2),
    });

    let report = sender
        .send_batched_push(&tokens(3), "t", "b", json!({}))
        .await;

    assert_eq!(report.batch_count(), 1);
    assert_eq!(report.failed_batches(), 1);
}
