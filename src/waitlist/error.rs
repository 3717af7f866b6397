use std::path::PathBuf;

use crate::waitlist::validate::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access waitlist snapshot {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to (de)serialize waitlist snapshot: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("waitlist snapshot is corrupt: {0}")]
    Corrupt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WaitlistError {
    #[error("invalid signup: {0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
}
