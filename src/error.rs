use thiserror::Error;

/// Library error types
#[derive(Error, Debug)]
pub enum LensKitError {
    #[error("Missing payload slot: {0}")]
    MissingSlot(String),

    #[error("Invalid payload slot {slot}: {reason}")]
    InvalidSlot { slot: String, reason: String },

    #[error("Lens group ids cannot be empty")]
    EmptyLensGroups,

    #[error("Resource scope is closed")]
    ScopeClosed,

    #[error("Invalid lens id pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid launch manifest: {0}")]
    Manifest(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl LensKitError {
    pub(crate) fn invalid_slot(slot: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSlot {
            slot: slot.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for lenskit operations
pub type Result<T> = std::result::Result<T, LensKitError>;
