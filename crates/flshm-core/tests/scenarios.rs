//! Cross-module scenarios against `flshm-core`'s public API: message traffic
//! and registry mutation sharing one region, addressed only through
//! `LocalConnection`.

use flshm_core::registry::{ConnName, Connection};
use flshm_core::{FrameVersion, LocalConnection, Message, Platform, Sandbox};
use flshm_platform::{Keys, PlatformError};
use flshm_proto::VersionedFields;
use flshm_proto::region::{REGION_SIZE, REGISTRY_CAPACITY};

struct FakePlatform;

impl Platform for FakePlatform {
    type Handle = Vec<u8>;

    fn keys(_is_per_user: bool) -> Keys {
        Keys::Unix { sem_key: 0, shm_key: 0 }
    }

    fn open(_is_per_user: bool) -> Result<Self::Handle, PlatformError> {
        Ok(vec![0u8; REGION_SIZE])
    }

    fn lock(_handle: &Self::Handle) -> Result<(), PlatformError> {
        Ok(())
    }

    fn unlock(_handle: &Self::Handle) -> Result<(), PlatformError> {
        Ok(())
    }

    fn close(_handle: Self::Handle) {}

    fn bytes(handle: &Self::Handle) -> &[u8] {
        handle
    }

    fn bytes_mut(handle: &mut Self::Handle) -> &mut [u8] {
        handle
    }
}

fn conn(name: &str) -> Connection {
    Connection {
        name: ConnName::new(name).unwrap(),
        version: FrameVersion::V1,
        sandbox: Sandbox::LocalTrusted,
    }
}

#[test]
fn registry_mutation_is_independent_of_message_traffic() {
    let mut lc = LocalConnection::<FakePlatform>::open(true).unwrap();

    let msg = Message {
        tick: 1,
        name: "_chat".to_string(),
        host: "localhost".to_string(),
        method: "send".to_string(),
        fields: VersionedFields::V1,
        data: b"hello".to_vec(),
        amfl: None,
    };
    lc.write(&msg).unwrap();

    lc.add(conn("_chat")).unwrap();
    lc.add(conn("_lobby")).unwrap();

    // the message slot is untouched by registry writes
    let read = lc.read().unwrap().unwrap();
    assert_eq!(read, msg);

    let listed = lc.list().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().any(|c| c.name.as_str() == "_chat"));
    assert!(listed.iter().any(|c| c.name.as_str() == "_lobby"));

    lc.remove(&conn("_chat")).unwrap();
    assert_eq!(lc.list().unwrap().len(), 1);

    // removing from the registry never clears the message slot
    assert_eq!(lc.read().unwrap().unwrap(), msg);
}

#[test]
fn clear_empties_slot_but_preserves_registry() {
    let mut lc = LocalConnection::<FakePlatform>::open(true).unwrap();
    lc.add(conn("_app")).unwrap();

    let msg = Message {
        tick: 3,
        name: "_app".to_string(),
        host: "h".to_string(),
        method: "m".to_string(),
        fields: VersionedFields::V1,
        data: vec![],
        amfl: None,
    };
    lc.write(&msg).unwrap();
    lc.clear().unwrap();

    assert_eq!(lc.tick().unwrap(), 0);
    assert_eq!(lc.read().unwrap(), None);
    assert_eq!(lc.list().unwrap().len(), 1);
}

#[test]
fn scenario_registry_capacity_enforced_through_facade() {
    let mut lc = LocalConnection::<FakePlatform>::open(true).unwrap();
    for i in 0..REGISTRY_CAPACITY {
        lc.add(conn(&format!("_c{i}"))).unwrap();
    }
    let err = lc.add(conn("_overflow")).unwrap_err();
    assert!(matches!(err, flshm_core::Error::Full));
}
