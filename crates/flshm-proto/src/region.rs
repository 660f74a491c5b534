//! Fixed offsets and sizes of the shared-memory region.
//!
//! These constants are the compatibility contract with the ASVM
//! `LocalConnection` implementation: every offset here must match what the
//! original virtual machine reads and writes. Nothing in this module performs
//! I/O; it exists so the rest of the crate has a single source of truth for
//! "where things live" in the 64,528-byte region.
//!
//! ```text
//! 0                 8 12              16                 40976           64528
//! +-----------------+--+---------------+------------------+---------------+
//! | reserved        |tk| body size     | message body     | registry      |
//! +-----------------+--+---------------+------------------+---------------+
//! ```

/// Total size of the shared-memory region, in bytes.
pub const REGION_SIZE: usize = 64_528;

/// Bytes reserved at the start of the region, unused by this core.
pub const RESERVED_SIZE: usize = 8;

/// Offset of the 32-bit message tick.
pub const TICK_OFFSET: usize = 8;

/// Size of the tick field, in bytes.
pub const TICK_SIZE: usize = 4;

/// Offset of the 32-bit message body size prefix.
pub const SIZE_OFFSET: usize = 12;

/// Size of the size-prefix field, in bytes.
pub const SIZE_FIELD_SIZE: usize = 4;

/// Offset of the message body (frame payload).
pub const BODY_OFFSET: usize = 16;

/// Maximum length of a serialized message body.
pub const BODY_MAX: usize = 40_960;

/// Offset of the connection registry table.
pub const REGISTRY_OFFSET: usize = 40_976;

/// Size of the connection registry table, in bytes.
pub const REGISTRY_SIZE: usize = 23_552;

/// Maximum number of connection entries the registry can hold.
pub const REGISTRY_CAPACITY: usize = 8;

const _: () = assert!(BODY_OFFSET + BODY_MAX <= REGISTRY_OFFSET);
const _: () = assert!(REGISTRY_OFFSET + REGISTRY_SIZE <= REGION_SIZE);
const _: () = assert!(TICK_OFFSET + TICK_SIZE <= SIZE_OFFSET);
const _: () = assert!(SIZE_OFFSET + SIZE_FIELD_SIZE <= BODY_OFFSET);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_size_matches_table() {
        assert_eq!(REGION_SIZE, 64_528);
        assert_eq!(BODY_MAX, 40_960);
        assert_eq!(REGISTRY_OFFSET, 40_976);
        assert_eq!(REGISTRY_SIZE, 23_552);
    }

    #[test]
    fn registry_fits_exactly_to_end_of_region() {
        assert_eq!(REGISTRY_OFFSET + REGISTRY_SIZE, REGION_SIZE);
    }
}
