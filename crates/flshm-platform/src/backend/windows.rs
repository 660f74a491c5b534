//! Named mutex + named file mapping backend for Windows.

use windows_sys::Win32::{
    Foundation::{CloseHandle, GetLastError, HANDLE, WAIT_FAILED, WAIT_OBJECT_0},
    System::{
        Memory::{
            CreateFileMappingW, FILE_MAP_ALL_ACCESS, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile,
            PAGE_READWRITE, UnmapViewOfFile,
        },
        Threading::{CreateMutexW, INFINITE, ReleaseMutex, WaitForSingleObject},
    },
};

use flshm_proto::region::REGION_SIZE;

use crate::{
    errors::PlatformError,
    keys::{self, Keys},
};

/// Opened named mutex + named file mapping.
pub struct WindowsHandle {
    mutex: HANDLE,
    mapping: HANDLE,
    view: *mut u8,
}

// SAFETY: access is serialized by the `lock`/`unlock` discipline, not by
// Rust's `Send`/`Sync` machinery; the handles are plain kernel object
// references valid from any thread.
unsafe impl Send for WindowsHandle {}

/// Marker type selecting the Windows backend.
pub struct WindowsPlatform;

fn wide_null(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

impl WindowsPlatform {
    /// Derives this platform's semaphore/segment keys.
    #[must_use]
    pub fn keys(is_per_user: bool) -> Keys {
        keys::keys(is_per_user)
    }

    /// Opens (creating if absent) the named mutex and file mapping.
    pub fn open(is_per_user: bool) -> Result<WindowsHandle, PlatformError> {
        let Keys::Windows { mutex_name, mapping_name } = Self::keys(is_per_user) else {
            unreachable!("WindowsPlatform::keys always returns Keys::Windows")
        };

        let mutex = open_mutex(&mutex_name)?;
        let mapping = open_mapping(&mapping_name)?;
        let view = map_view(mapping)?;

        Ok(WindowsHandle { mutex, mapping, view })
    }

    /// Blocks until the mutex is acquired.
    pub fn lock(handle: &WindowsHandle) -> Result<(), PlatformError> {
        // SAFETY: `handle.mutex` is a live mutex handle returned by `open`.
        let result = unsafe { WaitForSingleObject(handle.mutex, INFINITE) };
        if result == WAIT_FAILED {
            return Err(PlatformError::LockLost(format!(
                "WaitForSingleObject failed: error {}",
                // SAFETY: reading the thread-local last-error value.
                unsafe { GetLastError() }
            )));
        }
        if result != WAIT_OBJECT_0 {
            return Err(PlatformError::LockLost(format!(
                "WaitForSingleObject returned unexpected status {result}"
            )));
        }
        Ok(())
    }

    /// Releases the mutex.
    pub fn unlock(handle: &WindowsHandle) -> Result<(), PlatformError> {
        // SAFETY: see `lock`.
        let ok = unsafe { ReleaseMutex(handle.mutex) };
        if ok == 0 {
            return Err(PlatformError::LockLost(format!(
                "ReleaseMutex failed: error {}",
                unsafe { GetLastError() }
            )));
        }
        Ok(())
    }

    /// Unmaps the view and closes the local handles. Does not destroy the
    /// kernel objects while any other process still references them.
    pub fn close(handle: WindowsHandle) {
        // SAFETY: `handle.view`/`handle.mapping`/`handle.mutex` were
        // produced by a successful `open` and not yet released.
        unsafe {
            UnmapViewOfFile(MEMORY_MAPPED_VIEW_ADDRESS { Value: handle.view.cast() });
            CloseHandle(handle.mapping);
            CloseHandle(handle.mutex);
        }
    }

    /// Borrows the mapped region.
    #[must_use]
    pub fn bytes(handle: &WindowsHandle) -> &[u8] {
        // SAFETY: see `backend::unix::UnixPlatform::bytes`.
        unsafe { std::slice::from_raw_parts(handle.view, REGION_SIZE) }
    }

    /// Mutably borrows the mapped region.
    pub fn bytes_mut(handle: &mut WindowsHandle) -> &mut [u8] {
        // SAFETY: see `backend::unix::UnixPlatform::bytes_mut`.
        unsafe { std::slice::from_raw_parts_mut(handle.view, REGION_SIZE) }
    }
}

fn open_mutex(name: &str) -> Result<HANDLE, PlatformError> {
    let wide = wide_null(name);
    // SAFETY: `wide` is a NUL-terminated UTF-16 string alive for the call.
    // A non-owned, non-inheritable mutex (`FALSE` initial owner) is
    // immediately acquirable, so its first lock never blocks.
    let handle = unsafe { CreateMutexW(std::ptr::null(), 0, wide.as_ptr()) };
    if handle.is_null() {
        return Err(PlatformError::Unavailable(format!(
            "CreateMutexW({name}) failed: error {}",
            unsafe { GetLastError() }
        )));
    }
    Ok(handle)
}

fn open_mapping(name: &str) -> Result<HANDLE, PlatformError> {
    let wide = wide_null(name);
    #[allow(clippy::cast_possible_truncation)]
    let size_low = REGION_SIZE as u32;
    // SAFETY: `INVALID_HANDLE_VALUE`-style page-file-backed mapping is
    // requested by passing a null file handle; `wide` is valid for the
    // call.
    let handle = unsafe {
        CreateFileMappingW(
            windows_sys::Win32::Foundation::INVALID_HANDLE_VALUE,
            std::ptr::null(),
            PAGE_READWRITE,
            0,
            size_low,
            wide.as_ptr(),
        )
    };
    if handle.is_null() {
        return Err(PlatformError::Unavailable(format!(
            "CreateFileMappingW({name}) failed: error {}",
            unsafe { GetLastError() }
        )));
    }
    Ok(handle)
}

fn map_view(mapping: HANDLE) -> Result<*mut u8, PlatformError> {
    // SAFETY: `mapping` was returned by a successful `CreateFileMappingW`.
    let view = unsafe { MapViewOfFile(mapping, FILE_MAP_ALL_ACCESS, 0, 0, REGION_SIZE) };
    if view.Value.is_null() {
        return Err(PlatformError::Unavailable(format!(
            "MapViewOfFile failed: error {}",
            unsafe { GetLastError() }
        )));
    }
    Ok(view.Value.cast::<u8>())
}
