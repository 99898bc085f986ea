// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The EIP encapsulation header that prefixes every TCP message (spec §4.1).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |            command            |             length           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         session handle                       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             status                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        sender context (8)                     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                            options                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! All multi-byte fields are little-endian.

use anyhow::{Result, bail};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, LittleEndian, U16, U32, U64};

pub const ENCAP_HEADER_LEN: usize = 24;

/// EIP commands this core sends or expects (spec §4.1). The numeric value
/// is the only thing that governs dispatch; see `SPEC_FULL.md` §9a.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RegisterSession = 0x0065,
    UnregisterSession = 0x0066,
    SendRrData = 0x006F,
    SendUnitData = 0x0070,
}

impl Command {
    #[inline]
    pub fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            0x0065 => Self::RegisterSession,
            0x0066 => Self::UnregisterSession,
            0x006F => Self::SendRrData,
            0x0070 => Self::SendUnitData,
            _ => return None,
        })
    }
}

/// Fixed 24-byte EIP encapsulation header.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct EncapHeader {
    pub command: U16<LittleEndian>,
    pub length: U16<LittleEndian>,
    pub session_handle: U32<LittleEndian>,
    pub status: U32<LittleEndian>,
    pub sender_context: U64<LittleEndian>,
    pub options: U32<LittleEndian>,
}

impl EncapHeader {
    pub fn new(command: Command, length: u16, session_handle: u32, sender_context: u64) -> Self {
        let mut h = EncapHeader::default();
        h.command.set(command as u16);
        h.length.set(length);
        h.session_handle.set(session_handle);
        h.sender_context.set(sender_context);
        h
    }

    pub fn to_bytes(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() != ENCAP_HEADER_LEN {
            bail!("buffer length must be {ENCAP_HEADER_LEN}, got {}", buf.len());
        }
        buf.copy_from_slice(self.as_bytes());
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != ENCAP_HEADER_LEN {
            bail!("buffer length must be {ENCAP_HEADER_LEN}, got {}", buf.len());
        }
        Self::read_from_bytes(buf)
            .map_err(|e| anyhow::anyhow!("failed to parse EIP encapsulation header: {e}"))
    }

    pub fn command(&self) -> Option<Command> {
        Command::from_u16(self.command.get())
    }
}

/// Body of a `RegisterSession` request/reply (4 bytes, little-endian).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RegisterSessionBody {
    pub protocol_version: U16<LittleEndian>,
    pub options_flags: U16<LittleEndian>,
}

impl RegisterSessionBody {
    pub const LEN: usize = 4;

    /// Protocol version 1, no option flags (spec §4.2 step 3).
    pub fn request() -> Self {
        let mut b = RegisterSessionBody::default();
        b.protocol_version.set(1);
        b.options_flags.set(0);
        b
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != Self::LEN {
            bail!("buffer length must be {}, got {}", Self::LEN, buf.len());
        }
        Self::read_from_bytes(buf)
            .map_err(|e| anyhow::anyhow!("failed to parse RegisterSession body: {e}"))
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}
