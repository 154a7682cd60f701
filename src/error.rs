/// Error types for ReasoningBank operations.
///
/// Every fallible engine operation returns `Result<T, BankError>`. The
/// variants follow the failure modes of the engine: configuration problems
/// surface at construction, embedding failures propagate to the caller, and
/// backend failures carry the underlying I/O message.
use thiserror::Error;

/// The main error type for ReasoningBank operations.
#[derive(Error, Debug)]
pub enum BankError {
    /// Invalid construction configuration (backend location, dimension).
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what is wrong with the configuration
        reason: String,
    },

    /// The embedding provider could not produce a vector.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Serialization error when converting data to/from JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored pattern payload could not be decoded.
    #[error("Malformed pattern '{id}': {reason}")]
    MalformedPattern {
        /// Id of the offending record
        id: String,
        /// Why decoding failed
        reason: String,
    },

    /// Persistence backend operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// The engine was used after `close()`.
    #[error("Engine is closed")]
    Closed,
}

impl BankError {
    /// Shorthand for a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        BankError::Config {
            reason: reason.into(),
        }
    }
}

/// Result type alias for ReasoningBank operations.
pub type BankResult<T> = Result<T, BankError>;
