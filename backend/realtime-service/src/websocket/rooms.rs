/// Room channel
///
/// Second live channel, maintained independently of the per-user
/// `ConnectionRegistry`. Sessions join and leave community rooms; room names
/// are community ids. The channel has its own lock and never touches the
/// live-connection registry.
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::messages::{RoomInbound, RoomOutbound};
use super::peer::{DeliveryReport, PeerHandle};
use crate::metrics::{self, Channel};

pub type SessionId = Uuid;

struct RoomSession {
    handle: Arc<dyn PeerHandle>,
    rooms: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct RoomChannel {
    sessions: Arc<RwLock<HashMap<SessionId, RoomSession>>>,
}

impl RoomChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// `connect` hook: start the session with no rooms
    pub async fn connect(&self, session_id: SessionId, handle: Arc<dyn PeerHandle>) {
        let total = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(
                session_id,
                RoomSession {
                    handle,
                    rooms: HashSet::new(),
                },
            );
            sessions.len()
        };
        metrics::set_room_sessions(total);
        info!(session_id = %session_id, sessions = total, "Room session connected");
    }

    /// `disconnect` hook: drop the session and every membership it held
    pub async fn disconnect(&self, session_id: SessionId) -> Option<HashSet<String>> {
        let (removed, total) = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.remove(&session_id).map(|s| s.rooms);
            (removed, sessions.len())
        };
        metrics::set_room_sessions(total);

        if let Some(rooms) = &removed {
            info!(
                session_id = %session_id,
                rooms = rooms.len(),
                "Room session disconnected"
            );
        }
        removed
    }

    /// `error` hook
    pub fn on_error(&self, session_id: SessionId, error: &str) {
        warn!(session_id = %session_id, error = %error, "Room session error");
    }

    /// Returns true if the membership was added
    pub async fn join_room(&self, session_id: SessionId, community_id: &str) -> bool {
        if community_id.is_empty() {
            debug!(session_id = %session_id, "Ignoring join with empty community id");
            return false;
        }

        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session_id) {
            Some(session) => {
                let added = session.rooms.insert(community_id.to_string());
                debug!(session_id = %session_id, community_id = %community_id, "Joined room");
                added
            }
            None => {
                debug!(session_id = %session_id, "Join from unknown session ignored");
                false
            }
        }
    }

    /// Returns true if the membership was removed
    pub async fn leave_room(&self, session_id: SessionId, community_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions
            .get_mut(&session_id)
            .map(|session| session.rooms.remove(community_id))
            .unwrap_or(false);

        if removed {
            debug!(session_id = %session_id, community_id = %community_id, "Left room");
        }
        removed
    }

    /// Dispatch one inbound client event
    pub async fn handle_inbound(&self, session_id: SessionId, event: RoomInbound) {
        match event {
            RoomInbound::JoinCommunity(target) => {
                self.join_room(session_id, target.community_id()).await;
            }
            RoomInbound::LeaveCommunity(target) => {
                self.leave_room(session_id, target.community_id()).await;
            }
            RoomInbound::PanicButtonPressed(body) => {
                // Re-broadcast to every session, not only the sender's rooms
                info!(session_id = %session_id, "Panic button pressed, broadcasting to all sessions");
                self.broadcast_all(&RoomOutbound::PanicButtonPressed(body))
                    .await;
            }
        }
    }

    /// Deliver an event to every session in `community_id`'s room
    pub async fn broadcast_to_room(&self, community_id: &str, event: &RoomOutbound) -> DeliveryReport {
        let targets = self
            .snapshot(|session| session.rooms.contains(community_id))
            .await;

        if targets.is_empty() {
            debug!(community_id = %community_id, event = event.name(), "Room is empty");
            return DeliveryReport::default();
        }
        self.fan_out(targets, event).await
    }

    /// Deliver an event to every connected session
    pub async fn broadcast_all(&self, event: &RoomOutbound) -> DeliveryReport {
        let targets = self.snapshot(|_| true).await;
        self.fan_out(targets, event).await
    }

    pub async fn rooms_of(&self, session_id: SessionId) -> HashSet<String> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|s| s.rooms.clone())
            .unwrap_or_default()
    }

    pub async fn room_size(&self, community_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.rooms.contains(community_id))
            .count()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn snapshot<F>(&self, include: F) -> Vec<(SessionId, Arc<dyn PeerHandle>)>
    where
        F: Fn(&RoomSession) -> bool,
    {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|(_, session)| include(session))
            .map(|(id, session)| (*id, session.handle.clone()))
            .collect()
    }

    async fn fan_out(
        &self,
        targets: Vec<(SessionId, Arc<dyn PeerHandle>)>,
        event: &RoomOutbound,
    ) -> DeliveryReport {
        let frame = match event.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(event = event.name(), error = %e, "Failed to encode room event");
                return DeliveryReport::default();
            }
        };

        let writes = targets.iter().map(|(session_id, handle)| {
            let frame = frame.as_str();
            async move {
                match handle.send_frame(frame).await {
                    Ok(()) => {
                        metrics::record_delivery(Channel::Room, true);
                        true
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Room channel write failed, dropping session");
                        metrics::record_delivery(Channel::Room, false);
                        self.disconnect(*session_id).await;
                        handle.close();
                        false
                    }
                }
            }
        });

        let mut report = DeliveryReport::default();
        for delivered in join_all(writes).await {
            report.record(delivered);
        }
        report
    }
}
