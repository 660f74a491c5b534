//! Black-box scenario tests against `flshm-proto`'s public API only.

use flshm_proto::message::{clear_message, read_message, tick_of, write_message};
use flshm_proto::region::REGION_SIZE;
use flshm_proto::{AmfVersion, FrameVersion, Message, Sandbox, VersionedFields};

fn blank_region() -> Vec<u8> {
    vec![0u8; REGION_SIZE]
}

#[test]
fn v4_round_trip_carries_amf_version() {
    let mut region = blank_region();
    let msg = Message {
        tick: 7,
        name: "_app".to_string(),
        host: "localhost".to_string(),
        method: "invoke".to_string(),
        fields: VersionedFields::V4 {
            sandboxed: true,
            https: true,
            sandbox: Sandbox::LocalTrusted,
            swfv: 32,
            filepath: None,
            amfv: AmfVersion::Amf3,
        },
        data: vec![1, 2, 3, 4],
        amfl: None,
    };

    write_message(&mut region, &msg).unwrap();
    let read = read_message(&region).unwrap().unwrap();
    assert_eq!(read, msg);
    assert_eq!(read.version(), FrameVersion::V4);
}

#[test]
fn successive_writes_overwrite_the_single_slot() {
    let mut region = blank_region();
    let first = Message {
        tick: 1,
        name: "a".to_string(),
        host: "h".to_string(),
        method: "m".to_string(),
        fields: VersionedFields::V1,
        data: vec![0xAA],
        amfl: None,
    };
    let second = Message { tick: 2, data: vec![0xBB], ..first.clone() };

    write_message(&mut region, &first).unwrap();
    write_message(&mut region, &second).unwrap();

    assert_eq!(tick_of(&region), 2);
    assert_eq!(read_message(&region).unwrap().unwrap(), second);
}

#[test]
fn scenario_s6_corrupt_then_clear_via_public_api() {
    use flshm_proto::region::SIZE_OFFSET;

    let mut region = blank_region();
    let msg = Message {
        tick: 9,
        name: "a".to_string(),
        host: "h".to_string(),
        method: "m".to_string(),
        fields: VersionedFields::V1,
        data: vec![],
        amfl: None,
    };
    write_message(&mut region, &msg).unwrap();

    region[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&50_000u32.to_le_bytes());
    assert!(read_message(&region).is_err());

    clear_message(&mut region);
    assert_eq!(tick_of(&region), 0);
    assert_eq!(read_message(&region).unwrap(), None);
}
