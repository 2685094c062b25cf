use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ApiResponse;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::state::AppState;
use crate::websocket::{EventFrame, RoomOutbound};

/// Event publish request
#[derive(Debug, Clone, Deserialize)]
pub struct PublishPayload {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl PublishPayload {
    fn into_frame(self) -> Result<EventFrame> {
        if self.event.trim().is_empty() {
            return Err(AppError::BadRequest("event name must not be empty".into()));
        }
        Ok(EventFrame::new(self.event, self.data))
    }
}

/// Broadcast request; without `communityId` the event goes to every live user
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastPayload {
    #[serde(rename = "communityId", alias = "community_id", default)]
    pub community_id: Option<String>,
    #[serde(flatten)]
    pub event: PublishPayload,
}

/// Batched push request
#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    pub tokens: Vec<String>,
    pub title: String,
    pub body: String,
    #[serde(default = "empty_object")]
    pub data: Value,
}

fn empty_object() -> Value {
    json!({})
}

#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub user_id: String,
    pub connected: bool,
    pub community_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChannelStats {
    pub connected_users: usize,
    pub communities: usize,
    pub room_sessions: usize,
}

/// GET /api/v1/ws/status/{user_id}
pub async fn connection_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let community_id = state.registry.community_of(&user_id).await;
    let connected = state.registry.is_connected(&user_id).await;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(ConnectionStatus {
        user_id,
        connected,
        community_id,
    })))
}

/// GET /api/v1/ws/stats
pub async fn channel_stats(state: web::Data<AppState>) -> Result<HttpResponse> {
    let stats = ChannelStats {
        connected_users: state.registry.connected_users_count().await,
        communities: state.registry.community_count().await,
        room_sessions: state.rooms.session_count().await,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::ok(stats)))
}

/// POST /api/v1/ws/users/{user_id}
pub async fn send_to_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<PublishPayload>,
) -> Result<HttpResponse> {
    let frame = req.into_inner().into_frame()?;
    let report = state.dispatcher.send_to_user(&path, &frame).await;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(report)))
}

/// POST /api/v1/ws/communities/{community_id}
pub async fn send_to_community(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<PublishPayload>,
) -> Result<HttpResponse> {
    let frame = req.into_inner().into_frame()?;
    let report = state.dispatcher.send_to_community(&path, &frame).await;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(report)))
}

/// POST /api/v1/ws/broadcast
pub async fn broadcast(
    state: web::Data<AppState>,
    req: web::Json<BroadcastPayload>,
) -> Result<HttpResponse> {
    let BroadcastPayload {
        community_id,
        event,
    } = req.into_inner();
    let frame = event.into_frame()?;
    let report = state
        .dispatcher
        .publish(community_id.as_deref(), &frame)
        .await;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(report)))
}

/// POST /api/v1/rooms/{community_id}/emit
pub async fn emit_to_room(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<RoomOutbound>,
) -> Result<HttpResponse> {
    let report = state.rooms.broadcast_to_room(&path, &req).await;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(report)))
}

/// POST /api/v1/push
pub async fn send_push(
    state: web::Data<AppState>,
    req: web::Json<PushPayload>,
) -> Result<HttpResponse> {
    let PushPayload {
        tokens,
        title,
        body,
        data,
    } = req.into_inner();

    let report = state
        .push
        .send_batched_push(&tokens, &title, &body, data)
        .await;
    metrics::record_push_batches(
        report.batch_count() - report.failed_batches(),
        report.failed_batches(),
    );

    Ok(HttpResponse::Ok().json(ApiResponse::ok(report)))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/ws")
            .route("/status/{user_id}", web::get().to(connection_status))
            .route("/stats", web::get().to(channel_stats))
            .route("/users/{user_id}", web::post().to(send_to_user))
            .route("/communities/{community_id}", web::post().to(send_to_community))
            .route("/broadcast", web::post().to(broadcast)),
    )
    .route("/api/v1/rooms/{community_id}/emit", web::post().to(emit_to_room))
    .route("/api/v1/push", web::post().to(send_push));
}
