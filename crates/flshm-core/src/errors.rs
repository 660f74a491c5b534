//! Top-level error type for the `LocalConnection` facade.
//!
//! Every discriminant here is one of the error kinds a caller can observe;
//! [`flshm_platform::PlatformError`] and [`flshm_proto::CodecError`] fold
//! into it at this boundary, the same layering the rest of this workspace
//! uses between its proto/platform crates and its public-facing one.

use thiserror::Error;

use flshm_platform::PlatformError;
use flshm_proto::CodecError;

/// Errors produced by [`crate::LocalConnection`] and the registry/name
/// modules it builds on.
#[derive(Error, Debug)]
pub enum Error {
    /// Cannot open or attach the semaphore/segment.
    #[error("cannot open semaphore/segment: {0}")]
    Unavailable(String),

    /// Lock or unlock failed at the OS level.
    #[error("lock/unlock failed: {0}")]
    LockLost(String),

    /// Serialized message would exceed the body limit.
    #[error("serialized message is {size} bytes, exceeds the {max}-byte body limit")]
    TooLarge {
        /// Size that was attempted.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// A read found the message slot in an inconsistent state.
    #[error("corrupt message frame: {reason}")]
    Corrupt {
        /// Human-readable description of what failed to parse.
        reason: String,
    },

    /// The connection registry already holds its maximum of 8 entries.
    #[error("connection registry is full (capacity 8)")]
    Full,

    /// No matching entry was found to remove.
    #[error("connection not found in registry")]
    NotFound,

    /// A connection name fails the validity predicate.
    #[error("invalid connection name: {0:?}")]
    InvalidName(String),

    /// A field value fell outside its enumerated set, or otherwise violated
    /// a precondition of the operation (e.g. a duplicate registry name).
    #[error("invalid argument for field {field}: {value}")]
    InvalidArgument {
        /// Name of the offending field.
        field: &'static str,
        /// Raw value (or description) that failed validation.
        value: String,
    },
}

impl From<PlatformError> for Error {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Unavailable(msg) => Self::Unavailable(msg),
            PlatformError::LockLost(msg) => Self::LockLost(msg),
        }
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::TooLarge { size, max } => Self::TooLarge { size, max },
            CodecError::Corrupt { reason } => Self::Corrupt { reason },
            CodecError::InvalidArgument { field, value } => Self::InvalidArgument { field, value },
        }
    }
}

/// Result alias for `flshm-core` operations.
pub type Result<T> = std::result::Result<T, Error>;
