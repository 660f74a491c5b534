//! Fuzz target for the message codec's read path.
//!
//! `read_message` is the one place this workspace parses bytes it did not
//! itself write — another process's (possibly corrupted, possibly
//! malicious) shared-memory region. It must never panic; every malformed
//! input is a `CodecError`.

#![no_main]

use flshm_proto::message::read_message;
use flshm_proto::region::REGION_SIZE;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut region = vec![0u8; REGION_SIZE];
    let len = data.len().min(REGION_SIZE);
    region[..len].copy_from_slice(&data[..len]);

    let _ = read_message(&region);
});
