//! Region layout, tick source, and message codec for the flshm
//! `LocalConnection` shared-memory protocol.
//!
//! This crate is the pure, platform-independent half of the system: it
//! knows the exact byte layout of the 64,528-byte region and how to frame
//! and parse one message, but never opens a semaphore or a memory mapping
//! itself. Callers (see `flshm-core`) supply the mapped byte slice and hold
//! the lock for the duration of every call here.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod message;
pub mod region;
pub mod tick;

pub use errors::{CodecError, Result};
pub use message::{AmfVersion, FrameVersion, Message, Sandbox, VersionedFields};
pub use tick::tick;
