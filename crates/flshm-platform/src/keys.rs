//! Derivation of the per-platform semaphore/segment identifiers.
//!
//! # Open question
//!
//! The ASVM's own derivation (exact names/keys it uses on each platform) is
//! not available to this implementation — it ships only as compiled
//! ActionScript Virtual Machine binaries, and no reference source for it
//! survived into this workspace (see `DESIGN.md`). The scheme below is a
//! documented, deterministic best-effort reconstruction of the key shapes
//! each platform needs; it is internally consistent (two processes using
//! this code interoperate with each other) but is flagged, not guessed
//! silently, as the place where true ASVM byte-compatibility would need
//! verification against the original VM.

use std::hash::{Hash, Hasher};

/// Base name used to derive every platform's keys, chosen to resemble the
/// ASVM's own `"FlashPlayerLocalConnection"` segment family.
const BASE_NAME: &str = "FlashPlayerLC";

/// Platform-specific identifiers for the semaphore and shared-memory
/// segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keys {
    /// Windows: named mutex + named file mapping, each ≤ 23 chars + NUL.
    Windows {
        /// Name passed to `CreateMutexW`.
        mutex_name: String,
        /// Name passed to `CreateFileMappingW`.
        mapping_name: String,
    },
    /// macOS: named POSIX semaphore + numeric SysV shared-memory key.
    Macos {
        /// Name passed to `sem_open`.
        sem_name: String,
        /// Key passed to `shmget`.
        shm_key: i32,
    },
    /// Other Unix: numeric SysV semaphore + shared-memory keys.
    Unix {
        /// Key passed to `semget`.
        sem_key: i32,
        /// Key passed to `shmget`.
        shm_key: i32,
    },
}

fn scope_suffix(is_per_user: bool) -> u64 {
    if !is_per_user {
        return 0;
    }
    #[cfg(unix)]
    {
        u64::from(unsafe { libc::getuid() })
    }
    #[cfg(windows)]
    {
        std::env::var("USERNAME").map_or(0, |name| hash_str(&name))
    }
    #[cfg(not(any(unix, windows)))]
    {
        0
    }
}

fn hash_str(value: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Derives a deterministic 31-bit positive key from `tag` and `scope`,
/// suitable for `semget`/`shmget`.
fn numeric_key(tag: u8, scope: u64) -> i32 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    BASE_NAME.hash(&mut hasher);
    tag.hash(&mut hasher);
    scope.hash(&mut hasher);
    #[allow(clippy::cast_possible_wrap)]
    let key = (hasher.finish() & 0x7FFF_FFFF) as i32;
    // Avoid the reserved IPC_PRIVATE value (0).
    if key == 0 { 1 } else { key }
}

/// Derives the [`Keys`] for the current platform.
///
/// `is_per_user` scopes the identifiers to the invoking user account
/// (effective UID on Unix-likes, username on Windows) rather than host-wide.
#[must_use]
pub fn keys(is_per_user: bool) -> Keys {
    let scope = scope_suffix(is_per_user);

    #[cfg(target_os = "windows")]
    {
        let suffix = if is_per_user { format!("{:x}", scope & 0xFFFF_FFFF) } else { String::new() };
        Keys::Windows {
            mutex_name: truncate_for_windows(&format!("{BASE_NAME}Mtx{suffix}")),
            mapping_name: truncate_for_windows(&format!("{BASE_NAME}Map{suffix}")),
        }
    }
    #[cfg(target_os = "macos")]
    {
        let suffix = if is_per_user { format!("_{:x}", scope & 0xFFFF) } else { String::new() };
        Keys::Macos {
            sem_name: truncate_for_macos(&format!("/{BASE_NAME}{suffix}")),
            shm_key: numeric_key(b'M', scope),
        }
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Keys::Unix { sem_key: numeric_key(b'S', scope), shm_key: numeric_key(b'M', scope) }
    }
}

#[cfg(target_os = "windows")]
fn truncate_for_windows(name: &str) -> String {
    // Windows kernel object names here are capped at 23 chars + NUL.
    name.chars().take(23).collect()
}

#[cfg(target_os = "macos")]
fn truncate_for_macos(name: &str) -> String {
    // macOS POSIX semaphore names are capped at 31 chars including the
    // leading slash.
    name.chars().take(31).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_deterministic() {
        assert_eq!(keys(true), keys(true));
        assert_eq!(keys(false), keys(false));
    }

    #[test]
    fn numeric_key_never_zero() {
        for tag in [b'S', b'M'] {
            for scope in [0, 1, 1000, u64::MAX] {
                assert_ne!(numeric_key(tag, scope), 0);
            }
        }
    }
}
