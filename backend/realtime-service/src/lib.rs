pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod state;
pub mod websocket;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
pub use websocket::{BroadcastDispatcher, ConnectionRegistry, EventFrame, RoomChannel};
