//! Fuzz target for the connection registry's read path.
//!
//! `registry::list` parses the count and slot fields of a registry table
//! that, like the message slot, may belong to another process and be
//! corrupted or adversarial. It must never panic.

#![no_main]

use flshm_core::registry::list;
use flshm_proto::region::REGISTRY_SIZE;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut table = vec![0u8; REGISTRY_SIZE];
    let len = data.len().min(REGISTRY_SIZE);
    table[..len].copy_from_slice(&data[..len]);

    let _ = list(&table);
});
