//! Named POSIX semaphore + SysV shared memory backend for macOS. macOS
//! lacks named SysV semaphores, so locking uses `sem_open` while the
//! segment itself stays SysV shared memory, matching the other Unix
//! backend's segment layout.

use std::{ffi::CString, ptr};

use flshm_proto::region::REGION_SIZE;

use crate::{
    errors::PlatformError,
    keys::{self, Keys},
};

/// Opened named semaphore + SysV shared-memory mapping.
pub struct MacosHandle {
    sem: *mut libc::sem_t,
    shm_id: libc::c_int,
    shm_ptr: *mut u8,
}

// SAFETY: see `UnixHandle` in `backend::unix` — access is serialized by the
// `lock`/`unlock` discipline, not by Rust's `Send`/`Sync` machinery.
unsafe impl Send for MacosHandle {}

/// Marker type selecting the macOS backend.
pub struct MacosPlatform;

impl MacosPlatform {
    /// Derives this platform's semaphore/segment keys.
    #[must_use]
    pub fn keys(is_per_user: bool) -> Keys {
        keys::keys(is_per_user)
    }

    /// Opens (creating if absent) the semaphore and region mapping.
    pub fn open(is_per_user: bool) -> Result<MacosHandle, PlatformError> {
        let Keys::Macos { sem_name, shm_key } = Self::keys(is_per_user) else {
            unreachable!("MacosPlatform::keys always returns Keys::Macos")
        };

        let sem = open_named_semaphore(&sem_name)?;
        let shm_id = open_segment(shm_key)?;
        let shm_ptr = attach_segment(shm_id)?;

        Ok(MacosHandle { sem, shm_id, shm_ptr })
    }

    /// Blocks until the semaphore is acquired.
    pub fn lock(handle: &MacosHandle) -> Result<(), PlatformError> {
        // SAFETY: `handle.sem` is a live semaphore returned by `sem_open`.
        let rc = unsafe { libc::sem_wait(handle.sem) };
        if rc != 0 {
            return Err(PlatformError::LockLost(format!(
                "sem_wait failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    /// Releases the semaphore.
    pub fn unlock(handle: &MacosHandle) -> Result<(), PlatformError> {
        // SAFETY: see `lock`.
        let rc = unsafe { libc::sem_post(handle.sem) };
        if rc != 0 {
            return Err(PlatformError::LockLost(format!(
                "sem_post failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    /// Detaches the local mapping and closes the local semaphore handle.
    /// Does not remove the kernel objects.
    pub fn close(handle: MacosHandle) {
        // SAFETY: `handle.sem`/`handle.shm_ptr` were opened/attached by
        // `open` and not yet released.
        unsafe {
            libc::sem_close(handle.sem);
            libc::shmdt(handle.shm_ptr.cast());
        }
    }

    /// Borrows the mapped region.
    #[must_use]
    pub fn bytes(handle: &MacosHandle) -> &[u8] {
        // SAFETY: see `backend::unix::UnixPlatform::bytes`.
        unsafe { std::slice::from_raw_parts(handle.shm_ptr, REGION_SIZE) }
    }

    /// Mutably borrows the mapped region.
    pub fn bytes_mut(handle: &mut MacosHandle) -> &mut [u8] {
        // SAFETY: see `backend::unix::UnixPlatform::bytes_mut`.
        unsafe { std::slice::from_raw_parts_mut(handle.shm_ptr, REGION_SIZE) }
    }
}

fn open_named_semaphore(name: &str) -> Result<*mut libc::sem_t, PlatformError> {
    let c_name = CString::new(name)
        .map_err(|_| PlatformError::Unavailable("semaphore name contains a NUL byte".into()))?;

    // SAFETY: `c_name` is NUL-terminated and lives for the duration of the
    // call; `O_CREAT` with mode/initial-value arguments is the documented
    // three/five-argument form of `sem_open`.
    let sem = unsafe { libc::sem_open(c_name.as_ptr(), libc::O_CREAT, 0o666u32, 1u32) };
    if sem == libc::SEM_FAILED {
        return Err(PlatformError::Unavailable(format!(
            "sem_open({name}) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(sem)
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
