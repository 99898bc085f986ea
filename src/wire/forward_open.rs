// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! ForwardOpen / ForwardOpenEx / ForwardClose bodies (spec §4.1, §4.2).
//!
//! ForwardOpen negotiates a CIP connection. The classic form (`0x54`) packs
//! the payload size into a 9-bit field of a 16-bit connection parameter
//! word, capping payloads at 511 bytes; the extended form (`0x5B`) widens
//! the size field to a full 16 bits inside a 32-bit word, allowing up to
//! 4000-odd bytes. Both forms otherwise share the same fields.

use bitflags::bitflags;

use crate::wire::cip;

/// Transport class/trigger byte used by this core: class 3, application
/// triggered, cyclic (value is fixed per spec §4.1).
pub const TRANSPORT_CLASS_TRIGGER: u8 = 0xA3;

bitflags! {
    /// High bits of a connection parameter word, common to both the
    /// classic (16-bit) and extended (32-bit) encodings.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConnectionParamFlags: u8 {
        const REDUNDANT_OWNER = 0b1000_0000;
        /// Connection type = point-to-point (`01`) occupies two bits; this
        /// flag alone already encodes point-to-point, the only type used.
        const POINT_TO_POINT  = 0b0100_0000;
        const PRIORITY_HIGH   = 0b0001_0000;
        const VARIABLE_SIZE   = 0b0000_1000;
    }
}

impl Default for ConnectionParamFlags {
    fn default() -> Self {
        ConnectionParamFlags::POINT_TO_POINT | ConnectionParamFlags::VARIABLE_SIZE
    }
}

/// Encodes the classic 16-bit connection parameter word: flags in the top
/// byte, a 9-bit size in bits 0..8.
pub fn encode_connection_params_classic(flags: ConnectionParamFlags, size: u16) -> u16 {
    ((flags.bits() as u16) << 8) | (size & 0x01FF)
}

pub fn decode_connection_params_classic(word: u16) -> (ConnectionParamFlags, u16) {
    let flags = ConnectionParamFlags::from_bits_truncate((word >> 8) as u8);
    (flags, word & 0x01FF)
}

/// Encodes the extended 32-bit connection parameter word: flags in the top
/// byte, a full 16-bit size in the low word.
pub fn encode_connection_params_extended(flags: ConnectionParamFlags, size: u16) -> u32 {
    ((flags.bits() as u32) << 24) | (size as u32)
}

pub fn decode_connection_params_extended(word: u32) -> (ConnectionParamFlags, u16) {
    let flags = ConnectionParamFlags::from_bits_truncate((word >> 24) as u8);
    (flags, (word & 0xFFFF) as u16)
}

/// Fields shared by the classic and extended ForwardOpen request bodies
/// (spec §4.1), independent of the connection-parameter word width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardOpenParams {
    pub secs_per_tick: u8,
    pub timeout_ticks: u8,
    pub orig_to_targ_connection_id: u32,
    pub targ_to_orig_connection_id: u32,
    pub connection_serial_number: u16,
    pub originator_vendor_id: u16,
    pub originator_serial: u32,
    pub timeout_multiplier: u8,
    pub orig_to_targ_rpi: u32,
    pub orig_to_targ_size: u16,
    pub targ_to_orig_rpi: u32,
    pub targ_to_orig_size: u16,
}

/// Builds a classic (`0x54`) ForwardOpen request body, everything up to and
/// including the connection path.
pub fn build_forward_open_classic(p: &ForwardOpenParams, connection_path: &[u8]) -> Vec<u8> {
    let flags = ConnectionParamFlags::default();
    let mut body = Vec::with_capacity(32 + connection_path.len());
    body.push(p.secs_per_tick);
    body.push(p.timeout_ticks);
    body.extend_from_slice(&p.orig_to_targ_connection_id.to_le_bytes());
    body.extend_from_slice(&p.targ_to_orig_connection_id.to_le_bytes());
    body.extend_from_slice(&p.connection_serial_number.to_le_bytes());
    body.extend_from_slice(&p.originator_vendor_id.to_le_bytes());
    body.extend_from_slice(&p.originator_serial.to_le_bytes());
    body.push(p.timeout_multiplier);
    body.extend_from_slice(&[0u8; 3]); // reserved
    body.extend_from_slice(&p.orig_to_targ_rpi.to_le_bytes());
    body.extend_from_slice(
        &encode_connection_params_classic(flags, p.orig_to_targ_size).to_le_bytes(),
    );
    body.extend_from_slice(&p.targ_to_orig_rpi.to_le_bytes());
    body.extend_from_slice(
        &encode_connection_params_classic(flags, p.targ_to_orig_size).to_le_bytes(),
    );
    body.push(TRANSPORT_CLASS_TRIGGER);
    body.push((connection_path.len() / 2) as u8);
    body.extend_from_slice(connection_path);
    body
}

/// Builds an extended (`0x5B`) ForwardOpen request body with 32-bit
/// connection parameter words, allowing payloads above 511 bytes.
pub fn build_forward_open_extended(p: &ForwardOpenParams, connection_path: &[u8]) -> Vec<u8> {
    let flags = ConnectionParamFlags::default();
    let mut body = Vec::with_capacity(36 + connection_path.len());
    body.push(p.secs_per_tick);
    body.push(p.timeout_ticks);
    body.extend_from_slice(&p.orig_to_targ_connection_id.to_le_bytes());
    body.extend_from_slice(&p.targ_to_orig_connection_id.to_le_bytes());
    body.extend_from_slice(&p.connection_serial_number.to_le_bytes());
    body.extend_from_slice(&p.originator_vendor_id.to_le_bytes());
    body.extend_from_slice(&p.originator_serial.to_le_bytes());
    body.push(p.timeout_multiplier);
    body.extend_from_slice(&[0u8; 3]); // reserved
    body.extend_from_slice(&p.orig_to_targ_rpi.to_le_bytes());
    body.extend_from_slice(
        &encode_connection_params_extended(flags, p.orig_to_targ_size).to_le_bytes(),
    );
    body.extend_from_slice(&p.targ_to_orig_rpi.to_le_bytes());
    body.extend_from_slice(
        &encode_connection_params_extended(flags, p.targ_to_orig_size).to_le_bytes(),
    );
    body.push(TRANSPORT_CLASS_TRIGGER);
    body.push((connection_path.len() / 2) as u8);
    body.extend_from_slice(connection_path);
    body
}

/// Selects `0x54` or `0x5B` and builds the matching body.
pub fn build_forward_open(
    use_extended: bool,
    p: &ForwardOpenParams,
    connection_path: &[u8],
) -> (u8, Vec<u8>) {
    if use_extended {
        (cip::SVC_FORWARD_OPEN_EX, build_forward_open_extended(p, connection_path))
    } else {
        (cip::SVC_FORWARD_OPEN, build_forward_open_classic(p, connection_path))
    }
}

/// A successful ForwardOpen reply: the assigned target connection id plus
/// echoed originator-side fields (enough to drive ForwardClose and the CIP
/// connection sequence number).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardOpenReply {
    pub orig_to_targ_connection_id: u32,
    pub targ_to_orig_connection_id: u32,
    pub connection_serial_number: u16,
    pub originator_vendor_id: u16,
    pub originator_serial: u32,
}

pub fn parse_forward_open_success(data: &[u8]) -> anyhow::Result<ForwardOpenReply> {
    anyhow::ensure!(data.len() >= 16, "ForwardOpen success reply truncated");
    Ok(ForwardOpenReply {
        orig_to_targ_connection_id: u32::from_le_bytes(data[0..4].try_into()?),
        targ_to_orig_connection_id: u32::from_le_bytes(data[4..8].try_into()?),
        connection_serial_number: u16::from_le_bytes(data[8..10].try_into()?),
        originator_vendor_id: u16::from_le_bytes(data[10..12].try_into()?),
        originator_serial: u32::from_le_bytes(data[12..16].try_into()?),
    })
}

/// Builds a ForwardClose (`0x4E`) request body (spec §4.1).
pub fn build_forward_close(
    secs_per_tick: u8,
    timeout_ticks: u8,
    connection_serial_number: u16,
    originator_vendor_id: u16,
    originator_serial: u32,
    connection_path: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(16 + connection_path.len());
    body.push(secs_per_tick);
    body.push(timeout_ticks);
    body.extend_from_slice(&connection_serial_number.to_le_bytes());
    body.extend_from_slice(&originator_vendor_id.to_le_bytes());
    body.extend_from_slice(&originator_serial.to_le_bytes());
    body.push((connection_path.len() / 2) as u8);
    body.push(0); // reserved
    body.extend_from_slice(connection_path);
    body
}
