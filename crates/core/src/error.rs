//! Error types for the turnpost domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] ties them together.

use thiserror::Error;

/// The top-level error type for all turnpost operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Decode errors (fatal) ---
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    // --- Sink errors ---
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    // --- Input errors ---
    #[error("Input error: {0}")]
    Io(#[from] std::io::Error),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A framed line could not be turned into a record.
///
/// Every variant is fatal for the relay: a broken line means the upstream
/// producer violated the framing contract.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Malformed record envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("Record of type '{kind}' has no message payload")]
    MissingPayload { kind: String },

    #[error("Malformed {kind} message: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// An output sink failed to deliver a batch. Never fatal to the stream.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Delivery failed to {sink}: {reason}")]
    DeliveryFailed { sink: String, reason: String },

    #[error("{sink} API rejected the message: {code}")]
    Api { sink: String, code: String },

    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),
}
