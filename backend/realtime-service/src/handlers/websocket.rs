/// WebSocket upgrade endpoints
///
/// - GET /ws?userId=...&communityId=...  live channel (one connection per user)
/// - GET /rooms/ws                         room channel
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::state::AppState;
use crate::websocket::session::{spawn_relay, LiveSession, RejectedSession, RoomSocket};
use crate::websocket::{ChannelPeer, Connection, ConnectionRegistry};

#[derive(Debug, Deserialize)]
pub struct LiveChannelQuery {
    #[serde(rename = "userId", alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(rename = "communityId", alias = "community_id")]
    pub community_id: Option<String>,
}

/// GET /ws
///
/// Without a `userId` the socket is upgraded and closed straight away;
/// no registry state is created.
pub async fn live_channel(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<LiveChannelQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let LiveChannelQuery {
        user_id,
        community_id,
    } = query.into_inner();

    let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
        tracing::warn!("Live channel upgrade without userId, closing");
        return ws::start(RejectedSession::new("userId is required"), &req, stream);
    };

    let (peer, rx) = ChannelPeer::channel(state.peer_buffer);
    let connection = Connection::new(user_id.clone(), community_id, Arc::new(peer));
    let session = LiveSession::new(
        user_id,
        connection.connection_id,
        state.registry.clone(),
        state.heartbeat,
    );

    let (addr, response) = ws::WsResponseBuilder::new(session, &req, stream).start_with_addr()?;
    spawn_relay(addr.clone().recipient(), rx);
    register_live(&state.registry, connection, || addr.connected()).await;

    Ok(response)
}

/// Register a live connection and close the one it replaces.
///
/// A session that stopped before registration already ran its cleanup, so
/// its entry is removed again here.
pub(crate) async fn register_live<F>(
    registry: &ConnectionRegistry,
    connection: Connection,
    session_alive: F,
) where
    F: Fn() -> bool,
{
    let user_id = connection.user_id.clone();
    let connection_id = connection.connection_id;

    if let Some(previous) = registry.register(connection).await {
        tracing::info!(
            user_id = %previous.user_id,
            connection_id = %previous.connection_id,
            "Closing replaced live connection"
        );
        previous.handle.close();
    }

    if !session_alive() {
        tracing::debug!(user_id = %user_id, "Live session stopped before registration");
        registry.unregister_connection(&user_id, connection_id).await;
    }
}

/// GET /rooms/ws
pub async fn room_channel(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = Uuid::new_v4();
    let (peer, rx) = ChannelPeer::channel(state.peer_buffer);
    let socket = RoomSocket::new(session_id, state.rooms.clone(), state.heartbeat);

    let (addr, response) = ws::WsResponseBuilder::new(socket, &req, stream).start_with_addr()?;
    spawn_relay(addr.clone().recipient(), rx);
    state.rooms.connect(session_id, Arc::new(peer)).await;
    if !addr.connected() {
        state.rooms.disconnect(session_id).await;
    }

    Ok(response)
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(live_channel))
        .route("/rooms/ws", web::get().to(room_channel));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::{PeerHandle, SessionCommand};

    #[tokio::test]
    async fn test_register_live_closes_backed_up_replaced_connection() {
        let registry = ConnectionRegistry::new();
        let (old_peer, mut old_rx) = ChannelPeer::channel(1);
        old_peer.send_frame("backlog").await.unwrap();
        register_live(&registry, Connection::new("u1", None, Arc::new(old_peer)), || true).await;

        let (new_peer, _new_rx) = ChannelPeer::channel(1);
        let replacement = Connection::new("u1", None, Arc::new(new_peer));
        let replacement_id = replacement.connection_id;
        register_live(&registry, replacement, || true).await;

        assert_eq!(old_rx.try_recv(), Some(SessionCommand::Close));
        assert_eq!(
            registry.lookup("u1").await.map(|c| c.connection_id),
            Some(replacement_id)
        );
    }

    #[tokio::test]
    async fn test_register_live_drops_entry_of_stopped_session() {
        let registry = ConnectionRegistry::new();
        let (peer, _rx) = ChannelPeer::channel(1);
        let connection = Connection::new("u1", Some("c1".to_string()), Arc::new(peer));
        register_live(&registry, connection, || false).await;

        assert!(!registry.is_connected("u1").await);
        assert!(!registry.has_community("c1").await);
    }
}
