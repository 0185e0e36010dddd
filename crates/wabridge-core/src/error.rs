use thiserror::Error;

/// Top-level error type for wabridge collaborators and configuration.
#[derive(Debug, Error)]
pub enum WabridgeError {
    /// Error from the WhatsApp client library.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// QR rendering error.
    #[error("qr error: {0}")]
    Qr(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the session manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A required request parameter was missing or blank.
    #[error("validation error: {0}")]
    Validation(String),

    /// A send was attempted before the session reached `Ready`.
    #[error("whatsapp session is not ready")]
    NotReady,

    /// The library failed to dispatch a message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The library failed to construct or connect a client.
    #[error("client initialization failed: {0}")]
    LibraryInit(String),

    /// An event from a superseded generation. Dropped, never user-visible.
    #[error("stale event from generation {event} (current {current})")]
    StaleEvent { event: u64, current: u64 },
}
