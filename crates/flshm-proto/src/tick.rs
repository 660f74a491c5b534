//! Monotonic-ish 32-bit change-detection stamp.
//!
//! The tick is not a Lamport clock: it only needs to usually increase between
//! calls so a receiver can detect "a new message arrived" by comparing
//! against the last tick it observed. `0` is reserved to mean "slot empty"
//! (see [`crate::message`]), so a writer that happens to compute `0` must
//! retry.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current tick: milliseconds since the Unix epoch, truncated to
/// 32 bits.
///
/// Retries internally on the astronomically unlikely event that truncation
/// produces exactly `0`, since `0` is the empty-slot sentinel.
#[must_use]
pub fn tick() -> u32 {
    loop {
        let value = now_millis_truncated();
        if value != 0 {
            return value;
        }
    }
}

fn now_millis_truncated() -> u32 {
    #[allow(clippy::disallowed_methods)]
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    #[allow(clippy::cast_possible_truncation)]
    let millis = elapsed.as_millis() as u64;
    (millis & u64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_never_zero() {
        for _ in 0..1000 {
            assert_ne!(tick(), 0);
        }
    }

    #[test]
    fn successive_ticks_do_not_decrease_much() {
        let a = tick();
        let b = tick();
        // Usually increases; at worst stays equal within the same millisecond.
        assert!(b >= a || a - b < 2);
    }
}
