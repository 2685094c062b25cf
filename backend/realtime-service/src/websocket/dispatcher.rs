/// Broadcast dispatcher for the live channel
///
/// Delivery is best-effort and at-most-once: every send snapshots its targets
/// under the registry lock, releases the lock, then writes to each peer once.
/// A peer whose write fails is evicted and closed; the failure is never
/// returned to the caller.
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, warn};

use super::messages::EventFrame;
use super::peer::{write_with_deadline, DeliveryReport};
use super::registry::{Connection, ConnectionRegistry};
use crate::metrics::{self, Channel};

#[derive(Clone)]
pub struct BroadcastDispatcher {
    registry: ConnectionRegistry,
    send_timeout: Option<Duration>,
}

impl BroadcastDispatcher {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self {
            registry,
            send_timeout: None,
        }
    }

    /// Bound every peer write by `timeout`; a write that exceeds it counts as failed
    pub fn with_send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Send an event to a single user. Silent no-op if the user is not connected.
    pub async fn send_to_user(&self, user_id: &str, event: &EventFrame) -> DeliveryReport {
        let Some(frame) = encode(event) else {
            return DeliveryReport::default();
        };

        match self.registry.lookup(user_id).await {
            Some(connection) => self.fan_out(vec![connection], frame).await,
            None => {
                debug!(user_id = %user_id, event = %event.event, "User not connected, dropping event");
                DeliveryReport::default()
            }
        }
    }

    /// Send an event to every connected member of a community
    pub async fn send_to_community(&self, community_id: &str, event: &EventFrame) -> DeliveryReport {
        if community_id.is_empty() {
            warn!(event = %event.event, "Community broadcast without a community id, dropping event");
            return DeliveryReport::default();
        }

        let Some(frame) = encode(event) else {
            return DeliveryReport::default();
        };

        let targets = self.registry.community_connections(community_id).await;
        if targets.is_empty() {
            warn!(
                community_id = %community_id,
                event = %event.event,
                "No connected users in community, nothing to deliver"
            );
            return DeliveryReport::default();
        }

        let report = self.fan_out(targets, frame).await;
        debug!(
            community_id = %community_id,
            event = %event.event,
            delivered = report.delivered,
            evicted = report.evicted,
            "Community broadcast complete"
        );
        report
    }

    /// Send an event to every connected user
    ///
    /// Legacy path for publishers that supply no community scope.
    pub async fn send_global(&self, event: &EventFrame) -> DeliveryReport {
        let Some(frame) = encode(event) else {
            return DeliveryReport::default();
        };

        let targets = self.registry.all_connections().await;
        if targets.is_empty() {
            debug!(event = %event.event, "No connected users for global broadcast");
            return DeliveryReport::default();
        }

        self.fan_out(targets, frame).await
    }

    /// Community-scoped when a community is supplied, global otherwise
    pub async fn publish(&self, community_id: Option<&str>, event: &EventFrame) -> DeliveryReport {
        match community_id.filter(|c| !c.is_empty()) {
            Some(community_id) => self.send_to_community(community_id, event).await,
            None => {
                debug!(event = %event.event, "Unscoped publish, falling back to global broadcast");
                self.send_global(event).await
            }
        }
    }

    /// Write `frame` to every target concurrently; each peer succeeds or fails on its own
    async fn fan_out(&self, targets: Vec<Connection>, frame: String) -> DeliveryReport {
        let writes = targets.iter().map(|connection| self.deliver(connection, &frame));
        let outcomes = join_all(writes).await;

        let mut report = DeliveryReport::default();
        for delivered in outcomes {
            report.record(delivered);
        }
        report
    }

    async fn deliver(&self, connection: &Connection, frame: &str) -> bool {
        match write_with_deadline(connection.handle.as_ref(), frame, self.send_timeout).await {
            Ok(()) => {
                metrics::record_delivery(Channel::Live, true);
                true
            }
            Err(e) => {
                warn!(
                    user_id = %connection.user_id,
                    connection_id = %connection.connection_id,
                    error = %e,
                    "Live channel write failed, evicting peer"
                );
                metrics::record_delivery(Channel::Live, false);
                self.evict(connection).await;
                false
            }
        }
    }

    async fn evict(&self, connection: &Connection) {
        self.registry
            .unregister_connection(&connection.user_id, connection.connection_id)
            .await;
        connection.handle.close();
    }
}

fn encode(event: &EventFrame) -> Option<String> {
    match event.to_json() {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(event = %event.event, error = %e, "Failed to encode event frame");
            None
        }
    }
}
