//! Connection registry: the fixed capacity-8 table of active connection
//! names at the tail of the region.
//!
//! Layout of the `REGISTRY_SIZE`-byte table: a `count: u32` followed by
//! [`flshm_proto::region::REGISTRY_CAPACITY`] fixed-size slots. Each slot is
//! a `u16` name length, the name bytes, a `version: u8`, and a
//! `sandbox: i8`; unused slots and the table's trailing pad bytes are left
//! as whatever the region already contained (they are ignored past `count`).

use std::fmt;

use flshm_proto::region::{REGISTRY_CAPACITY, REGISTRY_SIZE};
use flshm_proto::{FrameVersion, Sandbox};

use crate::errors::{Error, Result};

const COUNT_FIELD_SIZE: usize = 4;
const NAME_LEN_FIELD_SIZE: usize = 2;
const VERSION_FIELD_SIZE: usize = 1;
const SANDBOX_FIELD_SIZE: usize = 1;

/// Byte size of one registry slot, derived from the table size divided by
/// its fixed capacity.
pub(crate) const SLOT_SIZE: usize = (REGISTRY_SIZE - COUNT_FIELD_SIZE) / REGISTRY_CAPACITY;

/// Maximum byte length of a connection name that fits in one slot.
pub(crate) const SLOT_NAME_MAX: usize =
    SLOT_SIZE - NAME_LEN_FIELD_SIZE - VERSION_FIELD_SIZE - SANDBOX_FIELD_SIZE;

const _: () = assert!(COUNT_FIELD_SIZE + REGISTRY_CAPACITY * SLOT_SIZE <= REGISTRY_SIZE);
const _: () = assert!(SLOT_NAME_MAX > 0);

/// A validated connection name. Construction enforces [`crate::name::is_valid_name`],
/// so an invalid name can never reach the registry table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnName(String);

impl ConnName {
    /// Validates and wraps `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `name` fails the validity
    /// predicate.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if crate::name::is_valid_name(&name) {
            Ok(Self(name))
        } else {
            Err(Error::InvalidName(name))
        }
    }

    /// Borrows the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConnName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A registered connection: name plus the version and sandbox it announced.
///
/// `sandbox` is never [`Sandbox::Application`] for a registry entry;
/// [`add`] rejects that value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// The connection's validated name.
    pub name: ConnName,
    /// Protocol version the connection announced.
    pub version: FrameVersion,
    /// Sandbox classification of the connection.
    pub sandbox: Sandbox,
}

fn slot_offset(index: usize) -> usize {
    COUNT_FIELD_SIZE + index * SLOT_SIZE
}

fn read_count(table: &[u8]) -> Result<usize> {
    let count = u32::from_le_bytes([table[0], table[1], table[2], table[3]]) as usize;
    if count > REGISTRY_CAPACITY {
        return Err(Error::Corrupt { reason: format!("registry count {count} exceeds capacity") });
    }
    Ok(count)
}

fn write_count(table: &mut [u8], count: usize) {
    #[allow(clippy::cast_possible_truncation)]
    let count = count as u32;
    table[0..4].copy_from_slice(&count.to_le_bytes());
}

fn decode_slot(slot: &[u8]) -> Result<Connection> {
    let name_len =
        u16::from_le_bytes([slot[0], slot[1]]) as usize;
    if name_len > SLOT_NAME_MAX {
        return Err(Error::Corrupt { reason: format!("slot name length {name_len} out of range") });
    }
    let name_bytes = &slot[NAME_LEN_FIELD_SIZE..NAME_LEN_FIELD_SIZE + name_len];
    let name = std::str::from_utf8(name_bytes)
        .map_err(|_| Error::Corrupt { reason: "slot name is not valid utf-8".to_string() })?;

    let version_offset = NAME_LEN_FIELD_SIZE + SLOT_NAME_MAX;
    let version_raw = slot[version_offset];
    let version = FrameVersion::from_u8(version_raw)
        .ok_or_else(|| Error::Corrupt { reason: format!("slot version {version_raw} out of range") })?;

    #[allow(clippy::cast_possible_wrap)]
    let sandbox_raw = slot[version_offset + VERSION_FIELD_SIZE] as i8;
    let sandbox = Sandbox::from_i8(sandbox_raw)
        .ok_or_else(|| Error::Corrupt { reason: format!("slot sandbox {sandbox_raw} out of range") })?;

    Ok(Connection { name: ConnName(name.to_string()), version, sandbox })
}

fn encode_slot(slot: &mut [u8], conn: &Connection) {
    let name = conn.name.as_str().as_bytes();
    #[allow(clippy::cast_possible_truncation)]
    let name_len = name.len() as u16;

    slot[0..NAME_LEN_FIELD_SIZE].copy_from_slice(&name_len.to_le_bytes());
    slot[NAME_LEN_FIELD_SIZE..NAME_LEN_FIELD_SIZE + name.len()].copy_from_slice(name);

    let version_offset = NAME_LEN_FIELD_SIZE + SLOT_NAME_MAX;
    slot[version_offset] = conn.version.as_u8();
    #[allow(clippy::cast_sign_loss)]
    let sandbox_byte = conn.sandbox.as_i8() as u8;
    slot[version_offset + VERSION_FIELD_SIZE] = sandbox_byte;
}

/// Reads every registered connection, in insertion order.
///
/// Precondition: caller holds the platform lock. `table` is the
/// `REGISTRY_SIZE`-byte registry byte range.
///
/// # Errors
///
/// Returns [`Error::Corrupt`] if `count` or a slot holds an out-of-range
/// value.
pub fn list(table: &[u8]) -> Result<Vec<Connection>> {
    let count = read_count(table)?;
    (0..count)
        .map(|i| {
            let offset = slot_offset(i);
            decode_slot(&table[offset..offset + SLOT_SIZE])
        })
        .collect()
}

/// Adds `conn` to the registry.
///
/// Precondition: caller holds the lock.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `conn.sandbox` is
/// [`Sandbox::Application`] or the name is already present;
/// [`Error::Full`] if the registry already holds 8 entries.
pub fn add(table: &mut [u8], conn: Connection) -> Result<()> {
    if conn.sandbox == Sandbox::Application {
        return Err(Error::InvalidArgument {
            field: "sandbox",
            value: "application sandbox is not permitted in the registry".to_string(),
        });
    }

    let existing = list(table)?;
    if existing.iter().any(|c| c.name == conn.name) {
        return Err(Error::InvalidArgument {
            field: "name",
            value: format!("{} is already registered", conn.name),
        });
    }

    if existing.len() >= REGISTRY_CAPACITY {
        return Err(Error::Full);
    }

    let offset = slot_offset(existing.len());
    encode_slot(&mut table[offset..offset + SLOT_SIZE], &conn);
    write_count(table, existing.len() + 1);
    tracing::debug!(name = %conn.name, count = existing.len() + 1, "registered connection");
    Ok(())
}

/// Removes the first entry whose `(name, version, sandbox)` matches `conn`,
/// compacting later entries forward by one slot to preserve registration
/// order.
///
/// Precondition: caller holds the lock.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if no entry matches.
pub fn remove(table: &mut [u8], conn: &Connection) -> Result<()> {
    let existing = list(table)?;
    let index = existing
        .iter()
        .position(|c| c.name == conn.name && c.version == conn.version && c.sandbox == conn.sandbox)
        .ok_or(Error::NotFound)?;

    for i in index..existing.len() - 1 {
        let next = &existing[i + 1];
        let offset = slot_offset(i);
        encode_slot(&mut table[offset..offset + SLOT_SIZE], next);
    }

    let last_offset = slot_offset(existing.len() - 1);
    table[last_offset..last_offset + SLOT_SIZE].fill(0);
    write_count(table, existing.len() - 1);
    tracing::debug!(name = %conn.name, count = existing.len() - 1, "removed connection");
    Ok(())
}
