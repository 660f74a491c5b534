//! The `LocalConnection` facade: connection registry, name validity, and the
//! public entry point that composes `flshm-platform` and `flshm-proto`
//! under a single lock discipline.
//!
//! This is the library's public surface. Production code uses the default
//! type parameter (`LocalConnection<DefaultPlatform>`, the real OS backend);
//! tests can substitute any other [`Platform`] implementation in its place,
//! the same way a clock or RNG source gets swapped for a fake in tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod name;
pub mod registry;

use flshm_platform::LockGuard;
pub use flshm_platform::{DefaultPlatform, Platform};
use flshm_proto::region::{REGISTRY_OFFSET, REGISTRY_SIZE};
pub use flshm_proto::{AmfVersion, FrameVersion, Message, Sandbox, VersionedFields};

pub use errors::{Error, Result};
pub use name::is_valid_name;
pub use registry::{ConnName, Connection};

/// The `LocalConnection` shared-memory channel: one message slot plus the
/// capacity-8 connection registry, guarded by a single cross-process lock.
///
/// Generic over [`Platform`] so tests can swap in an in-memory fake; defaults
/// to [`DefaultPlatform`], the real OS-backed semaphore and shared-memory
/// mapping.
pub struct LocalConnection<P: Platform = DefaultPlatform> {
    handle: P::Handle,
}

impl<P: Platform> LocalConnection<P> {
    /// Opens (creating if absent) the region and its guarding semaphore.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unavailable`] if the OS denies creation or
    /// attachment.
    pub fn open(is_per_user: bool) -> Result<Self> {
        let handle = P::open(is_per_user)?;
        tracing::debug!(is_per_user, "opened LocalConnection region");
        Ok(Self { handle })
    }

    /// Writes `msg` into the message slot, publishing its tick last.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooLarge`] if the serialized frame exceeds the body
    /// limit, or [`Error::LockLost`] if the lock could not be acquired or
    /// released.
    pub fn write(&mut self, msg: &Message) -> Result<()> {
        let mut guard = LockGuard::<P>::acquire(&mut self.handle)?;
        flshm_proto::message::write_message(guard.bytes_mut(), msg)?;
        Ok(())
    }

    /// Reads the current message, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupt`] if the slot's `size` is out of range or a
    /// frame field is missing, or [`Error::LockLost`] if the lock could not
    /// be acquired or released.
    pub fn read(&mut self) -> Result<Option<Message>> {
        let guard = LockGuard::<P>::acquire(&mut self.handle)?;
        Ok(flshm_proto::message::read_message(guard.bytes())?)
    }

    /// Peeks the current slot's tick without parsing the frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockLost`] if the lock could not be acquired or
    /// released.
    pub fn tick(&mut self) -> Result<u32> {
        let guard = LockGuard::<P>::acquire(&mut self.handle)?;
        Ok(flshm_proto::message::tick_of(guard.bytes()))
    }

    /// Clears the message slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockLost`] if the lock could not be acquired or
    /// released.
    pub fn clear(&mut self) -> Result<()> {
        let mut guard = LockGuard::<P>::acquire(&mut self.handle)?;
        flshm_proto::message::clear_message(guard.bytes_mut());
        Ok(())
    }

    /// Lists every registered connection, in insertion order.
    ///
    /// The returned names are owned copies; nothing here aliases the live
    /// mapping once the lock is released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupt`] if the registry table holds an
    /// out-of-range value, or [`Error::LockLost`] if the lock could not be
    /// acquired or released.
    pub fn list(&mut self) -> Result<Vec<Connection>> {
        let guard = LockGuard::<P>::acquire(&mut self.handle)?;
        registry::list(registry_table(guard.bytes()))
    }

    /// Registers `conn`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Full`] if the registry already holds 8 entries, or
    /// [`Error::InvalidArgument`] if `conn.sandbox` is
    /// [`Sandbox::Application`] or the name is already registered.
    pub fn add(&mut self, conn: Connection) -> Result<()> {
        let mut guard = LockGuard::<P>::acquire(&mut self.handle)?;
        registry::add(registry_table_mut(guard.bytes_mut()), conn)
    }

    /// Removes the first entry matching `conn`'s `(name, version, sandbox)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no entry matches.
    pub fn remove(&mut self, conn: &Connection) -> Result<()> {
        let mut guard = LockGuard::<P>::acquire(&mut self.handle)?;
        registry::remove(registry_table_mut(guard.bytes_mut()), conn)
    }

    /// Detaches the local mapping and releases local handles. Never removes
    /// the kernel-level objects.
    pub fn close(self) {
        P::close(self.handle);
    }
}

fn registry_table(region: &[u8]) -> &[u8] {
    &region[REGISTRY_OFFSET..REGISTRY_OFFSET + REGISTRY_SIZE]
}

fn registry_table_mut(region: &mut [u8]) -> &mut [u8] {
    &mut region[REGISTRY_OFFSET..REGISTRY_OFFSET + REGISTRY_SIZE]
}

#[cfg(test)]
mod tests {
    use flshm_platform::{Keys, PlatformError};
    use flshm_proto::region::REGION_SIZE;

    use super::*;

    /// In-memory [`Platform`] backed by a plain `Vec<u8>`, with no real
    /// semaphore: every call succeeds immediately. Enough to exercise the
    /// facade's composition of `flshm-proto` + `flshm-core::registry`
    /// without a live shared-memory mapping.
    struct FakePlatform;

    impl Platform for FakePlatform {
        type Handle = Vec<u8>;

        fn keys(_is_per_user: bool) -> Keys {
            Keys::Unix { sem_key: 0, shm_key: 0 }
        }

        fn open(_is_per_user: bool) -> std::result::Result<Self::Handle, PlatformError> {
            Ok(vec![0u8; REGION_SIZE])
        }

        fn lock(_handle: &Self::Handle) -> std::result::Result<(), PlatformError> {
            Ok(())
        }

        fn unlock(_handle: &Self::Handle) -> std::result::Result<(), PlatformError> {
            Ok(())
        }

        fn close(_handle: Self::Handle) {}

        fn bytes(handle: &Self::Handle) -> &[u8] {
            handle
        }

        fn bytes_mut(handle: &mut Self::Handle) -> &mut [u8] {
            handle
        }
    }

    fn v1(tick: u32, name: &str) -> Message {
        Message {
            tick,
            name: name.to_string(),
            host: "localhost".to_string(),
            method: "ping".to_string(),
            fields: VersionedFields::V1,
            data: vec![],
            amfl: None,
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut conn = LocalConnection::<FakePlatform>::open(true).unwrap();
        conn.write(&v1(42, "_foo")).unwrap();
        assert_eq!(conn.tick().unwrap(), 42);
        assert_eq!(conn.read().unwrap(), Some(v1(42, "_foo")));
    }

    #[test]
    fn clear_empties_the_slot() {
        let mut conn = LocalConnection::<FakePlatform>::open(true).unwrap();
        conn.write(&v1(1, "a")).unwrap();
        conn.clear().unwrap();
        assert_eq!(conn.tick().unwrap(), 0);
        assert_eq!(conn.read().unwrap(), None);
    }

    #[test]
    fn registry_add_list_remove_through_facade() {
        let mut conn = LocalConnection::<FakePlatform>::open(true).unwrap();
        let a = Connection {
            name: ConnName::new("a").unwrap(),
            version: FrameVersion::V1,
            sandbox: Sandbox::Remote,
        };
        conn.add(a.clone()).unwrap();
        assert_eq!(conn.list().unwrap(), vec![a.clone()]);
        conn.remove(&a).unwrap();
        assert_eq!(conn.list().unwrap(), vec![]);
    }

    #[test]
    fn add_duplicate_name_is_rejected() {
        let mut conn = LocalConnection::<FakePlatform>::open(true).unwrap();
        let a = Connection {
            name: ConnName::new("a").unwrap(),
            version: FrameVersion::V1,
            sandbox: Sandbox::Remote,
        };
        conn.add(a.clone()).unwrap();
        assert!(matches!(conn.add(a), Err(Error::InvalidArgument { .. })));
    }
}
