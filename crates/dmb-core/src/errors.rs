use crate::domain::ChatId;

/// Core error type for the monitor.
///
/// Adapter crates map their specific errors into this type so the engine
/// can tell isolated, retryable failures apart from fatal setup problems.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("send to {channel} failed: {reason}")]
    Transport { channel: ChatId, reason: String },

    #[error("inventory load failed: {0}")]
    Load(String),

    #[error("setup failed: {0}")]
    Setup(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
