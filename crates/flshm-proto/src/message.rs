//! Message codec: one framed message occupying the region's message slot.
//!
//! A message is written as a sequence of `key=value\0` tokens in a fixed,
//! version-gated order, followed by the opaque payload bytes (see the module
//! doc on [`VersionedFields`] for the exact layout). The codec never
//! interprets the payload; it only frames it.
//!
//! Publication is a two-step write: the body and size are copied in first,
//! and the tick is stored last. A reader that takes the lock before
//! publication sees the old tick (and, if it reads size too, a stale body);
//! a reader that takes the lock after sees the new tick and the matching
//! body. There is no state where a reader under the same lock discipline can
//! observe a new size with a stale tick.

use std::fmt;

use crate::{
    errors::{CodecError, Result},
    region::{BODY_MAX, BODY_OFFSET, SIZE_OFFSET, TICK_OFFSET},
};

/// ASVM `LocalConnection` protocol revision. Dictates which fields beyond
/// `name`/`host`/`method` are present in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameVersion {
    /// Bare `name`/`host`/`method` only.
    V1,
    /// Adds `sandboxed`/`https`.
    V2,
    /// Adds `sandbox`/`swfv`/(conditionally) `filepath`.
    V3,
    /// Adds `amfv`.
    V4,
}

impl FrameVersion {
    /// Numeric wire value for this version.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
            Self::V4 => 4,
        }
    }

    /// Parses the numeric wire value, rejecting anything outside `1..=4`.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            4 => Some(Self::V4),
            _ => None,
        }
    }
}

/// Sender security sandbox classification. `Application` is a legal sender
/// value but is never stored in the connection registry (see
/// `flshm_core::registry`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sandbox {
    /// No sandbox recorded.
    None,
    /// Remote (network-loaded) content.
    Remote,
    /// Local content with filesystem access.
    LocalWithFile,
    /// Local content with network access.
    LocalWithNetwork,
    /// Local trusted content.
    LocalTrusted,
    /// The application sandbox (host application, not a loaded SWF).
    Application,
}

impl Sandbox {
    /// Numeric wire value for this sandbox.
    #[must_use]
    pub fn as_i8(self) -> i8 {
        match self {
            Self::None => -1,
            Self::Remote => 0,
            Self::LocalWithFile => 1,
            Self::LocalWithNetwork => 2,
            Self::LocalTrusted => 3,
            Self::Application => 5,
        }
    }

    /// Parses the numeric sandbox value used on the wire.
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            -1 => Some(Self::None),
            0 => Some(Self::Remote),
            1 => Some(Self::LocalWithFile),
            2 => Some(Self::LocalWithNetwork),
            3 => Some(Self::LocalTrusted),
            5 => Some(Self::Application),
            _ => None,
        }
    }
}

/// AMF encoding of the payload (version ≥ 4 only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmfVersion {
    /// AMF0.
    Amf0,
    /// AMF3.
    Amf3,
}

impl AmfVersion {
    /// Numeric wire value for this AMF version.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Amf0 => 0,
            Self::Amf3 => 3,
        }
    }

    /// Parses the numeric AMF version. Any value outside `{0, 3}` is
    /// rejected at this boundary.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Amf0),
            3 => Some(Self::Amf3),
            _ => None,
        }
    }
}

/// The version-gated tail of a message. Modeled as a tagged variant over
/// [`FrameVersion`] so omitting a version's fields (or reading them under
/// the wrong version) is a compile-time exhaustiveness error, not a runtime
/// bug waiting to happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionedFields {
    /// Version 1: no additional fields.
    V1,
    /// Version 2: sandbox/https flags.
    V2 {
        /// Sender was running in a sandboxed player.
        sandboxed: bool,
        /// Sender connection used HTTPS.
        https: bool,
    },
    /// Version 3: adds sandbox classification, sender SWF version, and
    /// (conditionally) a filesystem path.
    V3 {
        /// Sender was running in a sandboxed player.
        sandboxed: bool,
        /// Sender connection used HTTPS.
        https: bool,
        /// Sender's security sandbox.
        sandbox: Sandbox,
        /// Sender's SWF version number.
        swfv: u32,
        /// Present only when `sandbox == LocalWithFile`; silently omitted
        /// from the wire otherwise.
        filepath: Option<String>,
    },
    /// Version 4: adds the payload's AMF encoding.
    V4 {
        /// Sender was running in a sandboxed player.
        sandboxed: bool,
        /// Sender connection used HTTPS.
        https: bool,
        /// Sender's security sandbox.
        sandbox: Sandbox,
        /// Sender's SWF version number.
        swfv: u32,
        /// Present only when `sandbox == LocalWithFile`.
        filepath: Option<String>,
        /// AMF encoding of `data`.
        amfv: AmfVersion,
    },
}

impl VersionedFields {
    /// The [`FrameVersion`] this variant corresponds to.
    #[must_use]
    pub fn version(&self) -> FrameVersion {
        match self {
            Self::V1 => FrameVersion::V1,
            Self::V2 { .. } => FrameVersion::V2,
            Self::V3 { .. } => FrameVersion::V3,
            Self::V4 { .. } => FrameVersion::V4,
        }
    }
}

/// A single framed `LocalConnection` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Publication stamp. `0` is reserved for "slot empty" and must never be
    /// used for a real message (see [`crate::tick`]).
    pub tick: u32,
    /// Connection name the sender addressed.
    pub name: String,
    /// Sender host identifier.
    pub host: String,
    /// Method name being invoked.
    pub method: String,
    /// Version-gated fields.
    pub fields: VersionedFields,
    /// Opaque AMF-encoded payload, framed but never interpreted here.
    pub data: Vec<u8>,
    /// The `amfl` header field ("length of all the AMF data"), read
    /// verbatim if present in the frame. Its relationship to `size` is
    /// undocumented and no known writer populates it; this codec never
    /// writes it and reports whatever the frame actually contains on read.
    pub amfl: Option<u32>,
}

impl Message {
    /// Convenience accessor for the message's protocol version.
    #[must_use]
    pub fn version(&self) -> FrameVersion {
        self.fields.version()
    }
}

struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn field(&mut self, key: &str, value: &dyn fmt::Display) {
        self.buf.extend_from_slice(key.as_bytes());
        self.buf.push(b'=');
        self.buf.extend_from_slice(value.to_string().as_bytes());
        self.buf.push(0);
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Serializes `msg` into the wire frame format (header fields + payload),
/// without touching any region. Exposed for testing and for callers that
/// want to pre-validate size before taking the lock.
///
/// # Errors
///
/// Returns [`CodecError::TooLarge`] if the serialized frame would exceed
/// [`BODY_MAX`] bytes.
pub fn serialize_frame(msg: &Message) -> Result<Vec<u8>> {
    let mut w = FrameWriter::new();
    w.field("ver", &msg.version().as_u8());
    w.field("name", &msg.name);
    w.field("host", &msg.host);

    match &msg.fields {
        VersionedFields::V1 => {},
        VersionedFields::V2 { sandboxed, https } => write_v2_flags(&mut w, *sandboxed, *https),
        VersionedFields::V3 { sandboxed, https, sandbox, swfv, filepath } => {
            write_v2_flags(&mut w, *sandboxed, *https);
            write_v3_fields(&mut w, *sandbox, *swfv, filepath.as_deref());
        },
        VersionedFields::V4 { sandboxed, https, sandbox, swfv, filepath, amfv } => {
            write_v2_flags(&mut w, *sandboxed, *https);
            write_v3_fields(&mut w, *sandbox, *swfv, filepath.as_deref());
            w.field("amfv", &amfv.as_u8());
        },
    }

    w.field("method", &msg.method);

    let mut bytes = w.into_bytes();
    bytes.extend_from_slice(&msg.data);

    if bytes.len() > BODY_MAX {
        return Err(CodecError::TooLarge { size: bytes.len(), max: BODY_MAX });
    }

    Ok(bytes)
}

fn write_v2_flags(w: &mut FrameWriter, sandboxed: bool, https: bool) {
    let flags = u8::from(sandboxed) | (u8::from(https) << 1);
    w.field("flags", &flags);
}

fn write_v3_fields(w: &mut FrameWriter, sandbox: Sandbox, swfv: u32, filepath: Option<&str>) {
    w.field("sbox", &sandbox.as_i8());
    w.field("swfv", &swfv);
    // filepath is serialized iff sandbox == LocalWithFile. Writing it under
    // any other sandbox is a caller mistake; silently omit rather than
    // propagate it onto the wire.
    if sandbox == Sandbox::LocalWithFile {
        if let Some(path) = filepath {
            w.field("file", &path);
        }
    }
}

/// Writes `msg` into the message slot of `region` (the *whole* region byte
/// slice, offsets are absolute per the layout table).
///
/// Precondition: caller holds the platform lock. Publishes the tick last,
/// after body and size, so a concurrent reader under the same lock
/// discipline never observes a new size with the old tick.
///
/// # Errors
///
/// Returns [`CodecError::TooLarge`] without touching the region if the
/// serialized frame would exceed [`BODY_MAX`] bytes.
pub fn write_message(region: &mut [u8], msg: &Message) -> Result<()> {
    let frame = serialize_frame(msg)?;

    region[BODY_OFFSET..BODY_OFFSET + frame.len()].copy_from_slice(&frame);

    #[allow(clippy::cast_possible_truncation)]
    let size = frame.len() as u32;
    region[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&size.to_le_bytes());

    tracing::trace!(tick = msg.tick, size, "publishing message");
    region[TICK_OFFSET..TICK_OFFSET + 4].copy_from_slice(&msg.tick.to_le_bytes());

    Ok(())
}

/// Peeks the current slot's tick without parsing the frame.
///
/// Precondition: caller holds the lock.
#[must_use]
pub fn tick_of(region: &[u8]) -> u32 {
    u32::from_le_bytes([
        region[TICK_OFFSET],
        region[TICK_OFFSET + 1],
        region[TICK_OFFSET + 2],
        region[TICK_OFFSET + 3],
    ])
}

/// Reads the current message, if any.
///
/// Precondition: caller holds the lock. Returns `Ok(None)` when the slot is
/// empty (`tick == 0`).
///
/// # Errors
///
/// Returns [`CodecError::Corrupt`] if `size` is zero, exceeds [`BODY_MAX`],
/// or a delimited field cannot be found within the claimed size.
pub fn read_message(region: &[u8]) -> Result<Option<Message>> {
    let tick = tick_of(region);
    if tick == 0 {
        return Ok(None);
    }

    let size = u32::from_le_bytes([
        region[SIZE_OFFSET],
        region[SIZE_OFFSET + 1],
        region[SIZE_OFFSET + 2],
        region[SIZE_OFFSET + 3],
    ]) as usize;

    if size == 0 || size > BODY_MAX {
        return Err(CodecError::Corrupt { reason: format!("size {size} out of range") });
    }

    let frame = &region[BODY_OFFSET..BODY_OFFSET + size];
    parse_frame(tick, frame).map(Some)
}

struct FrameReader<'a> {
    rest: &'a [u8],
}

impl<'a> FrameReader<'a> {
    fn new(frame: &'a [u8]) -> Self {
        Self { rest: frame }
    }

    fn token(&mut self) -> Result<&'a str> {
        let nul = self
            .rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| CodecError::Corrupt { reason: "unterminated field".to_string() })?;
        let (token, after) = self.rest.split_at(nul);
        self.rest = &after[1..];
        std::str::from_utf8(token)
            .map_err(|_| CodecError::Corrupt { reason: "field is not valid utf-8".to_string() })
    }

    fn field(&mut self, expected_key: &str) -> Result<&'a str> {
        let token = self.token()?;
        let (key, value) = token.split_once('=').ok_or_else(|| CodecError::Corrupt {
            reason: format!("expected `{expected_key}=...`, got `{token}`"),
        })?;
        if key != expected_key {
            return Err(CodecError::Corrupt {
                reason: format!("expected field `{expected_key}`, got `{key}`"),
            });
        }
        Ok(value)
    }

    fn peek_key(&self) -> Option<&'a str> {
        let nul = self.rest.iter().position(|&b| b == 0)?;
        let token = std::str::from_utf8(&self.rest[..nul]).ok()?;
        token.split_once('=').map(|(k, _)| k)
    }
}

fn parse_num<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T> {
    value.parse().map_err(|_| CodecError::InvalidArgument { field, value: value.to_string() })
}

fn parse_frame(tick: u32, frame: &[u8]) -> Result<Message> {
    let mut r = FrameReader::new(frame);

    let ver_raw = r.field("ver")?;
    let ver_num: u8 = parse_num("ver", ver_raw)?;
    let version = FrameVersion::from_u8(ver_num)
        .ok_or_else(|| CodecError::InvalidArgument { field: "ver", value: ver_raw.to_string() })?;

    let name = r.field("name")?.to_string();
    let host = r.field("host")?.to_string();

    let mut sandboxed = false;
    let mut https = false;
    let mut sandbox = Sandbox::None;
    let mut swfv = 0u32;
    let mut filepath = None;
    let mut amfv = AmfVersion::Amf0;
    let mut amfl = None;

    if matches!(version, FrameVersion::V2 | FrameVersion::V3 | FrameVersion::V4) {
        let flags: u8 = parse_num("flags", r.field("flags")?)?;
        sandboxed = flags & 0b01 != 0;
        https = flags & 0b10 != 0;
    }

    if matches!(version, FrameVersion::V3 | FrameVersion::V4) {
        let sbox_raw = r.field("sbox")?;
        let sbox_num: i8 = parse_num("sbox", sbox_raw)?;
        sandbox = Sandbox::from_i8(sbox_num)
            .ok_or_else(|| CodecError::InvalidArgument { field: "sbox", value: sbox_raw.to_string() })?;
        swfv = parse_num("swfv", r.field("swfv")?)?;

        if sandbox == Sandbox::LocalWithFile {
            if let Some("file") = r.peek_key() {
                filepath = Some(r.field("file")?.to_string());
            }
        }
    }

    if matches!(version, FrameVersion::V4) {
        if let Some("amfl") = r.peek_key() {
            amfl = Some(parse_num("amfl", r.field("amfl")?)?);
        }
        let amfv_raw = r.field("amfv")?;
        let amfv_num: u8 = parse_num("amfv", amfv_raw)?;
        amfv = AmfVersion::from_u8(amfv_num)
            .ok_or_else(|| CodecError::InvalidArgument { field: "amfv", value: amfv_raw.to_string() })?;
    }

    let method = r.field("method")?.to_string();
    let data = r.rest.to_vec();

    let fields = match version {
        FrameVersion::V1 => VersionedFields::V1,
        FrameVersion::V2 => VersionedFields::V2 { sandboxed, https },
        FrameVersion::V3 => VersionedFields::V3 { sandboxed, https, sandbox, swfv, filepath },
        FrameVersion::V4 => {
            VersionedFields::V4 { sandboxed, https, sandbox, swfv, filepath, amfv }
        },
    };

    Ok(Message { tick, name, host, method, fields, data, amfl })
}

/// Clears the message slot: `tick` and `size` go to zero, and the first few
/// header bytes of the body are zeroed. Does not wipe the full body.
///
/// Precondition: caller holds the lock.
pub fn clear_message(region: &mut [u8]) {
    region[TICK_OFFSET..TICK_OFFSET + 4].copy_from_slice(&0u32.to_le_bytes());
    region[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&0u32.to_le_bytes());
    let wipe_len = 16.min(BODY_MAX);
    for byte in &mut region[BODY_OFFSET..BODY_OFFSET + wipe_len] {
        *byte = 0;
    }
    tracing::trace!("cleared message slot");
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::region::REGION_SIZE;

    fn blank_region() -> Vec<u8> {
        vec![0u8; REGION_SIZE]
    }

    fn v1(tick: u32, name: &str, host: &str, method: &str, data: Vec<u8>) -> Message {
        Message {
            tick,
            name: name.to_string(),
            host: host.to_string(),
            method: method.to_string(),
            fields: VersionedFields::V1,
            data,
            amfl: None,
        }
    }

    #[test]
    fn scenario_s1_v1_round_trip() {
        let mut region = blank_region();
        let msg = v1(42, "_foo", "localhost", "ping", vec![]);

        write_message(&mut region, &msg).unwrap();
        assert_eq!(tick_of(&region), 42);

        let read = read_message(&region).unwrap().unwrap();
        assert_eq!(read, msg);
        assert!(matches!(read.fields, VersionedFields::V1));
    }

    #[test]
    fn scenario_s2_filepath_present_then_absent() {
        let mut region = blank_region();

        let with_file = Message {
            tick: 1,
            name: "a".into(),
            host: "h".into(),
            method: "m".into(),
            fields: VersionedFields::V3 {
                sandboxed: false,
                https: false,
                sandbox: Sandbox::LocalWithFile,
                swfv: 9,
                filepath: Some("/tmp/a.swf".into()),
            },
            data: vec![],
            amfl: None,
        };
        write_message(&mut region, &with_file).unwrap();
        let read = read_message(&region).unwrap().unwrap();
        match read.fields {
            VersionedFields::V3 { filepath, .. } => {
                assert_eq!(filepath.as_deref(), Some("/tmp/a.swf"));
            },
            _ => panic!("expected V3"),
        }

        let remote = Message {
            tick: 2,
            name: "a".into(),
            host: "h".into(),
            method: "m".into(),
            fields: VersionedFields::V3 {
                sandboxed: false,
                https: false,
                sandbox: Sandbox::Remote,
                swfv: 9,
                filepath: Some("/ignored".into()),
            },
            data: vec![],
            amfl: None,
        };
        write_message(&mut region, &remote).unwrap();
        let read = read_message(&region).unwrap().unwrap();
        match read.fields {
            VersionedFields::V3 { filepath, sandbox, .. } => {
                assert_eq!(filepath, None);
                assert_eq!(sandbox, Sandbox::Remote);
            },
            _ => panic!("expected V3"),
        }
    }

    #[test]
    fn scenario_s5_large_payload_round_trips() {
        let mut region = blank_region();
        let data = vec![0xABu8; 40_000 - "ver=1\0name=a\0host=h\0method=m\0".len()];
        let msg = v1(7, "a", "h", "m", data.clone());

        write_message(&mut region, &msg).unwrap();
        let read = read_message(&region).unwrap().unwrap();
        assert_eq!(read.data, data);
    }

    #[test]
    fn scenario_s6_corrupt_size_then_clear_restores_empty() {
        let mut region = blank_region();
        write_message(&mut region, &v1(5, "a", "h", "m", vec![])).unwrap();

        region[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&50_000u32.to_le_bytes());
        assert!(matches!(read_message(&region), Err(CodecError::Corrupt { .. })));

        clear_message(&mut region);
        assert_eq!(tick_of(&region), 0);
        assert_eq!(read_message(&region).unwrap(), None);
    }

    #[test]
    fn clear_idempotent() {
        let mut region = blank_region();
        write_message(&mut region, &v1(1, "a", "h", "m", vec![])).unwrap();
        clear_message(&mut region);
        clear_message(&mut region);
        assert_eq!(tick_of(&region), 0);
        assert_eq!(read_message(&region).unwrap(), None);
    }

    #[test]
    fn size_cap_exact_boundary() {
        let mut region = blank_region();
        let overhead = "ver=1\0name=a\0host=h\0method=m\0".len();
        let ok_msg = v1(1, "a", "h", "m", vec![0u8; BODY_MAX - overhead]);
        assert!(write_message(&mut region, &ok_msg).is_ok());

        let too_big = v1(1, "a", "h", "m", vec![0u8; BODY_MAX - overhead + 1]);
        assert_eq!(
            write_message(&mut region, &too_big),
            Err(CodecError::TooLarge { size: BODY_MAX + 1, max: BODY_MAX })
        );
    }

    #[test]
    fn read_before_write_is_empty() {
        let region = blank_region();
        assert_eq!(tick_of(&region), 0);
        assert_eq!(read_message(&region).unwrap(), None);
    }

    #[test]
    fn v4_omits_amfv_unless_version_4() {
        let frame = serialize_frame(&v1(1, "a", "h", "m", vec![1, 2, 3])).unwrap();
        let text = String::from_utf8_lossy(&frame);
        assert!(!text.contains("amfv"));
    }

    fn sandbox_strategy() -> impl Strategy<Value = Sandbox> {
        prop_oneof![
            Just(Sandbox::None),
            Just(Sandbox::Remote),
            Just(Sandbox::LocalWithFile),
            Just(Sandbox::LocalWithNetwork),
            Just(Sandbox::LocalTrusted),
            Just(Sandbox::Application),
        ]
    }

    fn message_strategy() -> impl Strategy<Value = Message> {
        (
            1u32..=u32::MAX,
            "[a-zA-Z0-9_]{1,16}",
            "[a-zA-Z0-9_.]{1,16}",
            "[a-zA-Z0-9_]{1,16}",
            prop::collection::vec(any::<u8>(), 0..200),
            1u8..=4u8,
            any::<bool>(),
            any::<bool>(),
            sandbox_strategy(),
            any::<u32>(),
            prop::option::of("[a-zA-Z0-9/_.]{1,32}"),
            prop_oneof![Just(AmfVersion::Amf0), Just(AmfVersion::Amf3)],
        )
            .prop_map(
                |(tick, name, host, method, data, ver, sandboxed, https, sandbox, swfv, filepath, amfv)| {
                    let fields = match ver {
                        1 => VersionedFields::V1,
                        2 => VersionedFields::V2 { sandboxed, https },
                        3 => VersionedFields::V3 { sandboxed, https, sandbox, swfv, filepath },
                        _ => VersionedFields::V4 { sandboxed, https, sandbox, swfv, filepath, amfv },
                    };
                    Message { tick, name, host, method, fields, data, amfl: None }
                },
            )
    }

    proptest! {
        #[test]
        fn round_trip_preserves_version_permitted_fields(msg in message_strategy()) {
            let mut region = blank_region();
            if write_message(&mut region, &msg).is_ok() {
                let read = read_message(&region).unwrap().unwrap();
                prop_assert_eq!(read.tick, msg.tick);
                prop_assert_eq!(&read.name, &msg.name);
                prop_assert_eq!(&read.host, &msg.host);
                prop_assert_eq!(&read.method, &msg.method);
                prop_assert_eq!(&read.data, &msg.data);
                prop_assert_eq!(read.version(), msg.version());

                if let (
                    VersionedFields::V3 { sandbox: rs, filepath: rf, .. },
                    VersionedFields::V3 { sandbox: ms, filepath: mf, .. },
                ) = (&read.fields, &msg.fields)
                {
                    prop_assert_eq!(rs, ms);
                    if *ms == Sandbox::LocalWithFile {
                        prop_assert_eq!(rf, mf);
                    } else {
                        prop_assert_eq!(rf, &None);
                    }
                }
            }
        }
    }
}
