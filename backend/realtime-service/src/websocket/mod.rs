/// Real-time fan-out
///
/// Architecture:
/// 1. ConnectionRegistry: one live connection per user, indexed by community
/// 2. BroadcastDispatcher: user / community / global delivery over the registry
/// 3. RoomChannel: independent room-based channel with its own membership state
/// 4. Session actors: the WebSocket transports behind both channels

pub mod dispatcher;
pub mod messages;
pub mod peer;
pub mod registry;
pub mod rooms;
pub mod session;

pub use dispatcher::BroadcastDispatcher;
pub use messages::{CommunityTarget, EventBody, EventFrame, RoomInbound, RoomOutbound};
pub use peer::{ChannelPeer, DeliveryReport, PeerError, PeerHandle, PeerReceiver, SessionCommand};
pub use registry::{Connection, ConnectionRegistry};
pub use rooms::{RoomChannel, SessionId};
pub use session::HeartbeatConfig;
