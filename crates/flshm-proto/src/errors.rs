//! Error types for region layout and message-codec operations.

use thiserror::Error;

/// Errors produced while framing or parsing a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Serialized frame would exceed [`crate::region::BODY_MAX`] bytes.
    #[error("serialized message is {size} bytes, exceeds the {max}-byte body limit")]
    TooLarge {
        /// Size that was attempted.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// `size` field on read was zero-but-nonempty-tick, out of range, or a
    /// delimited field was missing/unterminated within the claimed size.
    #[error("corrupt message frame: {reason}")]
    Corrupt {
        /// Human-readable description of what failed to parse.
        reason: String,
    },

    /// A field value fell outside its enumerated set (e.g. `version`,
    /// `sandbox`, `amfv`).
    #[error("invalid argument for field {field}: {value}")]
    InvalidArgument {
        /// Name of the offending field.
        field: &'static str,
        /// Raw value that failed validation.
        value: String,
    },
}

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
