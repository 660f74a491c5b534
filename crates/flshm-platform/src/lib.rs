//! Platform primitives adapter for the flshm `LocalConnection` core.
//!
//! This is the only crate in the workspace allowed `unsafe_code`: it is the
//! sole place that opens a semaphore, maps shared memory, or calls into the
//! host OS. Every other crate manipulates only the mapped byte range through
//! [`Platform::bytes`]/[`Platform::bytes_mut`], always while holding a
//! [`LockGuard`].
//!
//! One backend module is compiled per host family — see [`backend`] — but
//! all of them implement the same [`Platform`] trait, so `flshm-core` is
//! generic over `Platform` rather than over a concrete OS type.

#![warn(missing_docs)]

mod backend;
mod errors;
mod keys;

pub use errors::PlatformError;
pub use keys::Keys;

/// A cross-platform semaphore + mapped shared-memory segment.
///
/// All operations are synchronous and blocking: `lock` may block
/// indefinitely on contention, everything else is wait-free once the lock is
/// held.
pub trait Platform {
    /// Opaque local handle: local mapping + local semaphore handle.
    type Handle;

    /// Derives this platform's semaphore/segment keys.
    fn keys(is_per_user: bool) -> Keys;

    /// Opens (creating if absent) the semaphore and the region, and maps the
    /// region into the caller's address space.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unavailable`] if the OS denies creation or
    /// attachment.
    fn open(is_per_user: bool) -> Result<Self::Handle, PlatformError>;

    /// Blocks until the semaphore is acquired.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::LockLost`] on an OS-level failure.
    fn lock(handle: &Self::Handle) -> Result<(), PlatformError>;

    /// Releases the semaphore.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::LockLost`] on an OS-level failure.
    fn unlock(handle: &Self::Handle) -> Result<(), PlatformError>;

    /// Detaches the mapping and releases local handles. Never removes the
    /// kernel-level objects: they are intentionally persistent so other
    /// processes continue to see the same region.
    fn close(handle: Self::Handle);

    /// Borrows the mapped region. Caller must hold the lock.
    fn bytes(handle: &Self::Handle) -> &[u8];

    /// Mutably borrows the mapped region. Caller must hold the lock.
    fn bytes_mut(handle: &mut Self::Handle) -> &mut [u8];
}

/// Scoped lock release: pairs every successful [`Platform::lock`] with
/// exactly one [`Platform::unlock`] on every exit path, including panics,
/// via `Drop`.
pub struct LockGuard<'a, P: Platform> {
    handle: &'a mut P::Handle,
}

impl<'a, P: Platform> LockGuard<'a, P> {
    /// Acquires the lock on `handle`, returning a guard that releases it
    /// when dropped.
    ///
    /// # Errors
    ///
    /// Propagates [`PlatformError::LockLost`] from the underlying `lock`
    /// call; on failure, no guard is constructed and no unlock is owed.
    pub fn acquire(handle: &'a mut P::Handle) -> Result<Self, PlatformError> {
        P::lock(handle)?;
        Ok(Self { handle })
    }

    /// Borrows the mapped region for the lifetime of this guard.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        P::bytes(self.handle)
    }

    /// Mutably borrows the mapped region for the lifetime of this guard.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        P::bytes_mut(self.handle)
    }
}

impl<P: Platform> Drop for LockGuard<'_, P> {
    fn drop(&mut self) {
        if let Err(err) = P::unlock(self.handle) {
            tracing::error!(%err, "failed to release shared-memory lock");
        }
    }
}

#[cfg(target_os = "windows")]
mod default_platform {
    use super::{Keys, Platform, PlatformError};
    use crate::backend::windows::{WindowsHandle, WindowsPlatform};

    /// The OS-selected [`Platform`] implementation for this build.
    pub struct DefaultPlatform;

    impl Platform for DefaultPlatform {
        type Handle = WindowsHandle;

        fn keys(is_per_user: bool) -> Keys {
            WindowsPlatform::keys(is_per_user)
        }

        fn open(is_per_user: bool) -> Result<Self::Handle, PlatformError> {
            WindowsPlatform::open(is_per_user)
        }

        fn lock(handle: &Self::Handle) -> Result<(), PlatformError> {
            WindowsPlatform::lock(handle)
        }

        fn unlock(handle: &Self::Handle) -> Result<(), PlatformError> {
            WindowsPlatform::unlock(handle)
        }

        fn close(handle: Self::Handle) {
            WindowsPlatform::close(handle);
        }

        fn bytes(handle: &Self::Handle) -> &[u8] {
            WindowsPlatform::bytes(handle)
        }

        fn bytes_mut(handle: &mut Self::Handle) -> &mut [u8] {
            WindowsPlatform::bytes_mut(handle)
        }
    }
}

#[cfg(target_os = "macos")]
mod default_platform {
    use super::{Keys, Platform, PlatformError};
    use crate::backend::macos::{MacosHandle, MacosPlatform};

    /// The OS-selected [`Platform`] implementation for this build.
    pub struct DefaultPlatform;

    impl Platform for DefaultPlatform {
        type Handle = MacosHandle;

        fn keys(is_per_user: bool) -> Keys {
            MacosPlatform::keys(is_per_user)
        }

        fn open(is_per_user: bool) -> Result<Self::Handle, PlatformError> {
            MacosPlatform::open(is_per_user)
        }

        fn lock(handle: &Self::Handle) -> Result<(), PlatformError> {
            MacosPlatform::lock(handle)
        }

        fn unlock(handle: &Self::Handle) -> Result<(), PlatformError> {
            MacosPlatform::unlock(handle)
        }

        fn close(handle: Self::Handle) {
            MacosPlatform::close(handle);
        }

        fn bytes(handle: &Self::Handle) -> &[u8] {
            MacosPlatform::bytes(handle)
        }

        fn bytes_mut(handle: &mut Self::Handle) -> &mut [u8] {
            MacosPlatform::bytes_mut(handle)
        }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
mod default_platform {
    use super::{Keys, Platform, PlatformError};
    use crate::backend::unix::{UnixHandle, UnixPlatform};

    /// The OS-selected [`Platform`] implementation for this build.
    pub struct DefaultPlatform;

    impl Platform for DefaultPlatform {
        type Handle = UnixHandle;

        fn keys(is_per_user: bool) -> Keys {
            UnixPlatform::keys(is_per_user)
        }

        fn open(is_per_user: bool) -> Result<Self::Handle, PlatformError> {
            UnixPlatform::open(is_per_user)
        }

        fn lock(handle: &Self::Handle) -> Result<(), PlatformError> {
            UnixPlatform::lock(handle)
        }

        fn unlock(handle: &Self::Handle) -> Result<(), PlatformError> {
            UnixPlatform::unlock(handle)
        }

        fn close(handle: Self::Handle) {
            UnixPlatform::close(handle);
        }

        fn bytes(handle: &Self::Handle) -> &[u8] {
            UnixPlatform::bytes(handle)
        }

        fn bytes_mut(handle: &mut Self::Handle) -> &mut [u8] {
            UnixPlatform::bytes_mut(handle)
        }
    }
}

pub use default_platform::DefaultPlatform;
