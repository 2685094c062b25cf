/// CAD Push Shared Library
///
/// Store-and-forward delivery for devices that are not reachable over a live
/// channel. Messages are sent to an external push gateway in ordered,
/// size-bounded batches.
///
/// It handles:
/// - Building one push message per device token with fixed defaults
/// - Partitioning messages into batches that preserve input order
/// - One bounded-timeout POST per batch
/// - Per-batch outcome reporting (failures are logged, never returned as errors)

pub mod client;
pub mod errors;
pub mod models;

pub use client::{PushBatchSender, PushConfig};
pub use errors::PushError;
pub use models::{partition, BatchOutcome, PushMessage, PushReport};
