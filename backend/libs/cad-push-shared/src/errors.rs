use thiserror::Error;

/// Push gateway error types
///
/// A failure is always scoped to a single batch.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("Failed to encode push batch: {0}")]
    Encode(String),

    #[error("Push gateway request failed: {0}")]
    Transport(String),

    #[error("Push gateway request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Push gateway returned status: {0}")]
    Status(u16),
}

impl From<PushError> for String {
    fn from(err: PushError) -> Self {
        err.to_string()
    }
}
