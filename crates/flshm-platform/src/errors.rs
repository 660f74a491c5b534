//! Error types for the platform primitives adapter.

use thiserror::Error;

/// Errors from opening or operating the semaphore/shared-memory primitives.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The semaphore or segment could not be created or attached
    /// (permissions, resource exhaustion, or a backend-specific OS error).
    #[error("cannot open semaphore/segment: {0}")]
    Unavailable(String),

    /// A lock or unlock call failed at the OS level.
    #[error("lock/unlock failed: {0}")]
    LockLost(String),
}
