use serde::{Deserialize, Serialize};

pub const DEFAULT_SOUND: &str = "default";
pub const DEFAULT_PRIORITY: &str = "high";
pub const DEFAULT_CHANNEL: &str = "default";

/// Push Message
///
/// One message per device token, serialized in the gateway's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    #[serde(rename = "to")]
    pub recipient_token: String,
    pub sound: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub priority: String,
    #[serde(rename = "channelId")]
    pub channel: String,
}

impl PushMessage {
    /// Build a message with the fixed sound/priority/channel defaults
    pub fn new(
        recipient_token: impl Into<String>,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Self {
        Self {
            recipient_token: recipient_token.into(),
            sound: DEFAULT_SOUND.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            data,
            priority: DEFAULT_PRIORITY.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

/// Split `items` into consecutive batches of at most `batch_size`,
/// preserving input order. A zero batch size is treated as 1.
pub fn partition<T>(items: &[T], batch_size: usize) -> Vec<&[T]> {
    items.chunks(batch_size.max(1)).collect()
}

/// Outcome of a single outbound batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Delivered { index: usize, size: usize },
    Failed { index: usize, size: usize, error: String },
}

impl BatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, BatchOutcome::Delivered { .. })
    }

    pub fn size(&self) -> usize {
        match self {
            BatchOutcome::Delivered { size, .. } | BatchOutcome::Failed { size, .. } => *size,
        }
    }
}

/// Per-call push report, one entry per batch in send order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub batches: Vec<BatchOutcome>,
}

impl PushReport {
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn delivered_messages(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.is_delivered())
            .map(BatchOutcome::size)
            .sum()
    }

    pub fn failed_batches(&self) -> usize {
        self.batches.iter().filter(|b| !b.is_delivered()).count()
    }

    pub fn all_delivered(&self) -> bool {
        self.failed_batches() == 0
    }
}
