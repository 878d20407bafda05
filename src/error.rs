use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Send failed: {reason}")]
    SendFailed { reason: String },

    #[error("Link closed: {0}")]
    Closed(String),

    #[error("Timeout after {duration_ms}ms during {operation}")]
    Timeout { duration_ms: u64, operation: String },

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Failed to listen on transport '{transport}': {source}")]
    Listen {
        transport: String,
        #[source]
        source: TransportError,
    },

    #[error("Send failed on {failed} of {total} transports: {source}")]
    Send {
        failed: usize,
        total: usize,
        #[source]
        source: TransportError,
    },
}

pub type Result<T> = std::result::Result<T, ChannelError>;
pub type TransportResult<T> = std::result::Result<T, TransportError>;
pub type CodecResult<T> = std::result::Result<T, CodecError>;

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Serialization(err.to_string())
    }
}
