//! Error types for the kiosk core

use thiserror::Error;

use crate::session::SessionError;

/// Result type alias for kiosk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the kiosk core
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Catalog could not be loaded or failed validation
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Speech capability is absent on this kiosk
    #[error("speech is unavailable")]
    SpeechUnavailable,

    /// Platform could not capture an utterance
    #[error("recognition failed: {0}")]
    RecognitionFailed(String),

    /// Speech synthesis error
    #[error("speech error: {0}")]
    Speech(String),

    /// Selection session invariant was violated
    #[error("session invariant violation: {0}")]
    Session(#[from] SessionError),

    /// Payment effect reported failure
    #[error("payment failed: {0}")]
    Payment(String),

    /// Direct selection of an id the current step does not offer
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// The kiosk runtime is no longer running
    #[error("kiosk has shut down")]
    Closed,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
