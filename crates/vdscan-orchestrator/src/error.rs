use thiserror::Error;

/// Error kinds the orchestrator distinguishes.
///
/// All of these are fatal to the current event at most; none terminate the
/// process.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("malformed inbound message: {0}")]
    MalformedInput(String),

    #[error("invalid scanner type: {0}")]
    InvalidScannerType(String),

    #[error("feed access failed: {0}")]
    FeedAccess(anyhow::Error),

    #[error("inventory store access failed: {0}")]
    StoreAccess(anyhow::Error),

    #[error("package translation unusable: {0}")]
    Translation(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
