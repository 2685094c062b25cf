use cad_push_shared::PushBatchSender;

use crate::config::Config;
use crate::websocket::{BroadcastDispatcher, ConnectionRegistry, HeartbeatConfig, RoomChannel};

/// Shared application state passed to every handler via `web::Data`
///
/// Built once by the composition root; the live registry, the room channel
/// and the push sender are independent of each other.
#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub dispatcher: BroadcastDispatcher,
    pub rooms: RoomChannel,
    pub push: PushBatchSender,
    pub heartbeat: HeartbeatConfig,
    pub peer_buffer: usize,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let registry = ConnectionRegistry::new();
        let dispatcher =
            BroadcastDispatcher::new(registry.clone()).with_send_timeout(config.peer_send_timeout());

        Self {
            registry,
            dispatcher,
            rooms: RoomChannel::new(),
            push: PushBatchSender::new(config.push()),
            heartbeat: config.heartbeat(),
            peer_buffer: config.peer_buffer,
        }
    }
}
