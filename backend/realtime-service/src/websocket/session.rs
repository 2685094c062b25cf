/// WebSocket session actors
///
/// One actor per upgraded socket. Outbound frames reach an actor through the
/// bounded queue of its `ChannelPeer`; a relay task forwards queued
/// commands into the actor mailbox, a pending close ahead of any backlog. Both channels run the same heartbeat:
/// a ping every `interval`, and the session is stopped if the client has
/// been silent for longer than `client_timeout`.
use actix::{Actor, ActorContext, AsyncContext, Handler, Recipient, StreamHandler};
use actix_web_actors::ws;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::messages::RoomInbound;
use super::peer::{PeerReceiver, SessionCommand};
use super::registry::ConnectionRegistry;
use super::rooms::{RoomChannel, SessionId};

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub client_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            client_timeout: Duration::from_secs(30),
        }
    }
}

/// Forward queued commands into a session actor until either side goes away
pub fn spawn_relay(recipient: Recipient<SessionCommand>, mut rx: PeerReceiver) {
    actix::spawn(async move {
        while let Some(command) = rx.recv().await {
            if recipient.send(command).await.is_err() {
                break;
            }
        }
    });
}

// =========================================================================
// Live channel session (one per user)
// =========================================================================

pub struct LiveSession {
    user_id: String,
    connection_id: Uuid,
    registry: ConnectionRegistry,
    heartbeat: HeartbeatConfig,
    hb: Instant,
}

impl LiveSession {
    pub fn new(
        user_id: String,
        connection_id: Uuid,
        registry: ConnectionRegistry,
        heartbeat: HeartbeatConfig,
    ) -> Self {
        Self {
            user_id,
            connection_id,
            registry,
            heartbeat,
            hb: Instant::now(),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat.interval, |act, ctx| {
            if Instant::now().duration_since(act.hb) > act.heartbeat.client_timeout {
                tracing::warn!(user_id = %act.user_id, "Live channel heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for LiveSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_heartbeat(ctx);
        tracing::info!(
            user_id = %self.user_id,
            connection_id = %self.connection_id,
            "Live channel session started"
        );
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        let registry = self.registry.clone();
        let user_id = self.user_id.clone();
        let connection_id = self.connection_id;
        actix::spawn(async move {
            registry.unregister_connection(&user_id, connection_id).await;
        });

        tracing::info!(
            user_id = %self.user_id,
            connection_id = %self.connection_id,
            "Live channel session stopped"
        );
    }
}

impl Handler<SessionCommand> for LiveSession {
    type Result = ();

    fn handle(&mut self, command: SessionCommand, ctx: &mut Self::Context) {
        match command {
            SessionCommand::Frame(text) => ctx.text(text),
            SessionCommand::Close => {
                ctx.close(Some(ws::CloseCode::Normal.into()));
                ctx.stop();
            }
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for LiveSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(bytes)) => {
                self.hb = Instant::now();
                ctx.pong(&bytes);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(_)) | Ok(ws::Message::Binary(_)) => {
                // Publish-only channel
                self.hb = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!(user_id = %self.user_id, reason = ?reason, "Client initiated close");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, error = %e, "Live channel protocol error");
                ctx.stop();
            }
        }
    }
}

// =========================================================================
// Room channel session
// =========================================================================

pub struct RoomSocket {
    session_id: SessionId,
    rooms: RoomChannel,
    heartbeat: HeartbeatConfig,
    hb: Instant,
}

impl RoomSocket {
    pub fn new(session_id: SessionId, rooms: RoomChannel, heartbeat: HeartbeatConfig) -> Self {
        Self {
            session_id,
            rooms,
            heartbeat,
            hb: Instant::now(),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat.interval, |act, ctx| {
            if Instant::now().duration_since(act.hb) > act.heartbeat.client_timeout {
                act.rooms.on_error(act.session_id, "heartbeat timeout");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_text(&self, text: &str) {
        match RoomInbound::from_json(text) {
            Ok(event) => {
                let rooms = self.rooms.clone();
                let session_id = self.session_id;
                actix::spawn(async move {
                    rooms.handle_inbound(session_id, event).await;
                });
            }
            Err(e) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    error = %e,
                    "Dropping unrecognised room frame"
                );
            }
        }
    }
}

impl Actor for RoomSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_heartbeat(ctx);
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        let rooms = self.rooms.clone();
        let session_id = self.session_id;
        actix::spawn(async move {
            rooms.disconnect(session_id).await;
        });
    }
}

impl Handler<SessionCommand> for RoomSocket {
    type Result = ();

    fn handle(&mut self, command: SessionCommand, ctx: &mut Self::Context) {
        match command {
            SessionCommand::Frame(text) => ctx.text(text),
            SessionCommand::Close => {
                ctx.close(Some(ws::CloseCode::Normal.into()));
                ctx.stop();
            }
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RoomSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                self.handle_text(&text);
            }
            Ok(ws::Message::Ping(bytes)) => {
                self.hb = Instant::now();
                ctx.pong(&bytes);
            }
            Ok(ws::Message::Pong(_)) | Ok(ws::Message::Binary(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                self.rooms.on_error(self.session_id, &e.to_string());
                ctx.stop();
            }
        }
    }
}

// =========================================================================
// Rejected upgrade
// =========================================================================

/// Upgraded socket that is closed immediately with a policy-violation code
pub struct RejectedSession {
    reason: String,
}

impl RejectedSession {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Actor for RejectedSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Policy,
            description: Some(self.reason.clone()),
        }));
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RejectedSession {
    fn handle(&mut self, _: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        ctx.stop();
    }
}
