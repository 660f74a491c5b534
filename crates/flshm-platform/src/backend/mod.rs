//! Per-host-family backend implementations. Exactly one of these modules is
//! compiled in, selected by `cfg(target_os = ...)` in [`crate::DefaultPlatform`].

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(all(unix, not(target_os = "macos")))]
pub mod unix;

#[cfg(target_os = "windows")]
pub mod windows;
