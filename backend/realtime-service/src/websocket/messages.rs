/// Frame and event types shared by both live channels
///
/// Every frame on the wire is `{ "event": <name>, "data": <payload> }`.
use serde::{Deserialize, Serialize};

/// Arbitrary JSON object supplied by the publishing collaborator
pub type EventBody = serde_json::Map<String, serde_json::Value>;

/// Generic event frame used by the per-user live channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Community reference carried by join/leave events.
/// Clients send either the bare id or `{ "communityId": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommunityTarget {
    Bare(String),
    Keyed {
        #[serde(rename = "communityId", alias = "community_id")]
        community_id: String,
    },
}

impl CommunityTarget {
    pub fn community_id(&self) -> &str {
        match self {
            CommunityTarget::Bare(id) => id,
            CommunityTarget::Keyed { community_id } => community_id,
        }
    }
}

/// Inbound room-channel events (client to server)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RoomInbound {
    JoinCommunity(CommunityTarget),
    LeaveCommunity(CommunityTarget),
    PanicButtonPressed(EventBody),
}

impl RoomInbound {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Outbound room-channel events (server to client)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RoomOutbound {
    PanicAlertCreated(EventBody),
    PanicAlertsUpdated(EventBody),
    PanicButtonCleared(EventBody),
    PanicButtonPressed(EventBody),
}

impl RoomOutbound {
    pub fn name(&self) -> &'static str {
        match self {
            RoomOutbound::PanicAlertCreated(_) => "panic_alert_created",
            RoomOutbound::PanicAlertsUpdated(_) => "panic_alerts_updated",
            RoomOutbound::PanicButtonCleared(_) => "panic_button_cleared",
            RoomOutbound::PanicButtonPressed(_) => "panic_button_pressed",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
