/// Integration tests for the realtime-service HTTP API
///
/// This test module covers:
/// - Publish endpoints over the live registry
/// - Room emit endpoint
/// - Batched push endpoint against a mocked gateway
/// - Error envelopes for invalid bodies
/// - Live channel upgrade without a user id
use actix_web::{http::StatusCode, test, web, App};
use realtime_service::handlers::{self, register_publish, register_websocket};
use realtime_service::websocket::{ChannelPeer, Connection, SessionCommand};
use realtime_service::{AppState, Config};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app_state(vars: &[(&str, &str)]) -> web::Data<AppState> {
    let config = Config::from_iter(
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    )
    .unwrap();
    web::Data::new(AppState::from_config(&config))
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .app_data(handlers::json_config())
                .route("/health", web::get().to(|| async { "OK" }))
                .configure(|cfg| {
                    register_websocket(cfg);
                    register_publish(cfg);
                }),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health() {
    let state = app_state(&[]);
    let app = test_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn test_status_and_stats() {
    let state = app_state(&[]);
    let (peer, _rx) = ChannelPeer::channel(8);
    state
        .registry
        .register(Connection::new("u1", Some("c1".to_string()), Arc::new(peer)))
        .await;
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/api/v1/ws/status/u1")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["connected"], true);
    assert_eq!(body["data"]["community_id"], "c1");

    let req = test::TestRequest::get()
        .uri("/api/v1/ws/status/ghost")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["connected"], false);
    assert!(body["data"]["community_id"].is_null());

    let req = test::TestRequest::get().uri("/api/v1/ws/stats").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["connected_users"], 1);
    assert_eq!(body["data"]["communities"], 1);
    assert_eq!(body["data"]["room_sessions"], 0);
}

#[actix_web::test]
async fn test_send_to_user_delivers_frame() {
    let state = app_state(&[]);
    let (peer, mut rx) = ChannelPeer::channel(8);
    state
        .registry
        .register(Connection::new("u1", None, Arc::new(peer)))
        .await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/ws/users/u1")
        .set_json(json!({"event": "call_assigned", "data": {"callId": 7}}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["delivered"], 1);
    match rx.try_recv() {
        Some(SessionCommand::Frame(text)) => {
            let frame: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(frame, json!({"event": "call_assigned", "data": {"callId": 7}}));
        }
        _ => panic!("expected a frame"),
    }
}

#[actix_web::test]
async fn test_broadcast_scoped_to_community() {
    let state = app_state(&[]);
    let (in_peer, mut in_rx) = ChannelPeer::channel(8);
    let (out_peer, mut out_rx) = ChannelPeer::channel(8);
    state
        .registry
        .register(Connection::new("u1", Some("c1".to_string()), Arc::new(in_peer)))
        .await;
    state
        .registry
        .register(Connection::new("u2", Some("c2".to_string()), Arc::new(out_peer)))
        .await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/ws/broadcast")
        .set_json(json!({"communityId": "c1", "event": "bolo_created", "data": {}}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["attempted"], 1);
    assert!(in_rx.try_recv().is_some());
    assert!(out_rx.try_recv().is_none());
}

#[actix_web::test]
async fn test_publish_to_unknown_community_is_empty_report() {
    let state = app_state(&[]);
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/ws/communities/nowhere")
        .set_json(json!({"event": "x"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["attempted"], 0);
}

#[actix_web::test]
async fn test_invalid_bodies_are_bad_requests() {
    let state = app_state(&[]);
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/ws/users/u1")
        .set_json(json!({"event": "  "}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    let req = test::TestRequest::post()
        .uri("/api/v1/rooms/c1/emit")
        .set_json(json!({"event": "not_an_event", "data": {}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_room_emit_reaches_joined_sessions() {
    let state = app_state(&[]);
    let session = Uuid::new_v4();
    let (peer, mut rx) = ChannelPeer::channel(8);
    state.rooms.connect(session, Arc::new(peer)).await;
    state.rooms.join_room(session, "c1").await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/rooms/c1/emit")
        .set_json(json!({"event": "panic_alerts_updated", "data": {"count": 2}}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["delivered"], 1);
    match rx.try_recv() {
        Some(SessionCommand::Frame(text)) => assert!(text.contains("panic_alerts_updated")),
        _ => panic!("expected a frame"),
    }
}

#[actix_web::test]
async fn test_push_endpoint_reports_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let gateway = format!("{}/push", server.uri());
    let state = app_state(&[
        ("PUSH_GATEWAY_URL", gateway.as_str()),
        ("PUSH_BATCH_SIZE", "2"),
    ]);
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/push")
        .set_json(json!({
            "tokens": ["t1", "t2", "t3"],
            "title": "Panic",
            "body": "Unit 12 pressed panic"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let batches = body["data"]["batches"].as_array().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0]["status"], "delivered");
    assert_eq!(batches[0]["size"], 2);
    assert_eq!(batches[1]["size"], 1);
}

#[actix_web::test]
async fn test_live_upgrade_without_user_id_keeps_no_state() {
    let state = app_state(&[]);
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/ws?communityId=c1")
        .insert_header(("upgrade", "websocket"))
        .insert_header(("connection", "upgrade"))
        .insert_header(("sec-websocket-version", "13"))
        .insert_header(("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ=="))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SWITCHING_PROTOCOLS);
    assert_eq!(state.registry.connected_users_count().await, 0);
    assert!(!state.registry.has_community("c1").await);
}
