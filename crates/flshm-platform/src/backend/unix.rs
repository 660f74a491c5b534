//! SysV semaphore + SysV shared memory backend for non-macOS Unix.

use std::ptr;

use flshm_proto::region::REGION_SIZE;

use crate::{
    errors::PlatformError,
    keys::{self, Keys},
};

/// Opened SysV semaphore + shared-memory mapping.
pub struct UnixHandle {
    sem_id: libc::c_int,
    shm_id: libc::c_int,
    shm_ptr: *mut u8,
}

// SAFETY: the raw pointer addresses a SysV shared-memory segment, not
// thread-local or process-local memory; it is valid to hand across threads
// as long as callers serialize access via `lock`/`unlock`, which this type's
// only callers (`flshm-core`) do.
unsafe impl Send for UnixHandle {}

/// Marker type selecting the non-macOS Unix backend.
pub struct UnixPlatform;

impl UnixPlatform {
    /// Derives this platform's semaphore/segment keys.
    #[must_use]
    pub fn keys(is_per_user: bool) -> Keys {
        keys::keys(is_per_user)
    }

    /// Opens (creating if absent) the semaphore and region mapping.
    pub fn open(is_per_user: bool) -> Result<UnixHandle, PlatformError> {
        let Keys::Unix { sem_key, shm_key } = Self::keys(is_per_user) else {
            unreachable!("UnixPlatform::keys always returns Keys::Unix")
        };

        let (sem_id, created) = open_semaphore(sem_key)?;
        if created {
            init_semaphore(sem_id)?;
        }

        let shm_id = open_segment(shm_key)?;
        let shm_ptr = attach_segment(shm_id)?;

        Ok(UnixHandle { sem_id, shm_id, shm_ptr })
    }

    /// Blocks until the semaphore is acquired.
    pub fn lock(handle: &UnixHandle) -> Result<(), PlatformError> {
        semop(handle.sem_id, -1)
    }

    /// Releases the semaphore.
    pub fn unlock(handle: &UnixHandle) -> Result<(), PlatformError> {
        semop(handle.sem_id, 1)
    }

    /// Detaches the local mapping. Does not remove the kernel objects.
    pub fn close(handle: UnixHandle) {
        // SAFETY: `shm_ptr` was returned by a successful `shmat` in `open`
        // and has not been detached since.
        unsafe {
            libc::shmdt(handle.shm_ptr.cast());
        }
    }

    /// Borrows the mapped region.
    #[must_use]
    pub fn bytes(handle: &UnixHandle) -> &[u8] {
        // SAFETY: `shm_ptr` points at a `REGION_SIZE`-byte SysV segment for
        // the lifetime of `handle`; the caller holds the lock for the
        // duration of any read.
        unsafe { std::slice::from_raw_parts(handle.shm_ptr, REGION_SIZE) }
    }

    /// Mutably borrows the mapped region.
    pub fn bytes_mut(handle: &mut UnixHandle) -> &mut [u8] {
        // SAFETY: see `bytes`; `&mut UnixHandle` ensures exclusive Rust-side
        // access, and the caller holds the lock for cross-process exclusion.
        unsafe { std::slice::from_raw_parts_mut(handle.shm_ptr, REGION_SIZE) }
    }
}

/// Opens the semaphore set, returning whether this call created it.
fn open_semaphore(key: i32) -> Result<(libc::c_int, bool), PlatformError> {
    // SAFETY: FFI call with no preconditions beyond valid arguments, which
    // these are (a stack-local flag value and the derived key).
    let created_id =
        unsafe { libc::semget(key, 1, libc::IPC_CREAT | libc::IPC_EXCL | 0o666) };
    if created_id >= 0 {
        return Ok((created_id, true));
    }

    // SAFETY: same as above.
    let existing_id = unsafe { libc::semget(key, 1, 0o666) };
    if existing_id < 0 {
        return Err(PlatformError::Unavailable(format!(
            "semget({key}) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok((existing_id, false))
}

/// Initializes a freshly-created semaphore to `1`, so its first `lock`
/// succeeds without blocking.
fn init_semaphore(sem_id: libc::c_int) -> Result<(), PlatformError> {
    // SAFETY: `sem_id` was just returned by a successful `semget`.
    let rc = unsafe { libc::semctl(sem_id, 0, libc::SETVAL, 1) };
    if rc < 0 {
        return Err(PlatformError::Unavailable(format!(
            "semctl(SETVAL) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

fn semop(sem_id: libc::c_int, delta: i16) -> Result<(), PlatformError> {
    let mut buf = libc::sembuf { sem_num: 0, sem_op: delta, sem_flg: 0 };
    // SAFETY: `buf` is a single well-formed `sembuf` and `sem_id` refers to
    // a semaphore set opened by this process.
    let rc = unsafe { libc::semop(sem_id, ptr::addr_of_mut!(buf), 1) };
    if rc < 0 {
        return Err(PlatformError::LockLost(format!(
            "semop({delta:+}) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

fn open_segment(key: i32) -> Result<libc::c_int, PlatformError> {
    // SAFETY: FFI call with valid arguments.
    let shm_id = unsafe { libc::shmget(key, REGION_SIZE, libc::IPC_CREAT | 0o666) };
    if shm_id < 0 {
        return Err(PlatformError::Unavailable(format!(
            "shmget({key}) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(shm_id)
}

fn attach_segment(shm_id: libc::c_int) -> Result<*mut u8, PlatformError> {
    // SAFETY: `shm_id` was returned by a successful `shmget` above.
    let ptr = unsafe { libc::shmat(shm_id, ptr::null(), 0) };
    if ptr.cast::<i8>() as isize == -1 {
        return Err(PlatformError::Unavailable(format!(
            "shmat({shm_id}) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(ptr.cast())
}
