// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PCCC envelope embedded in CIP `ExecutePCCC` (`0x4B`), used by PLC-5/SLC/
//! MicroLogix targets (spec §4.1, §4.4).

use anyhow::{Result, ensure};

use crate::error::{EipError, pccc_status_to_error};

/// PCCC function codes used by the typed read/write commands (spec §4.4).
pub const FN_TYPED_READ: u8 = 0xA2;
pub const FN_TYPED_WRITE: u8 = 0xAA;

/// PCCC element type codes for the typed-data descriptor.
pub const ELEMENT_TYPE_INT: u8 = 0x89;
pub const ELEMENT_TYPE_REAL: u8 = 0x8A;

/// A DH+ routing destination appended ahead of the PCCC command when the
/// request must cross a DH+ last hop (spec §9a: unified behind one
/// builder rather than two near-duplicate code paths).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhpDestination {
    pub channel: u8,
    pub node: u8,
}

/// Fields of a PCCC request envelope (spec §4.1): request-id size is
/// always 7, vendor id/serial identify this client, command/status/
/// sequence/function select the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcccRequestHeader {
    pub vendor_id: u16,
    pub vendor_serial: u32,
    pub command: u8,
    pub sequence: u16,
    pub function: u8,
}

pub const PCCC_COMMAND_EXECUTE: u8 = 0x0F;

/// Builds one PCCC envelope, optionally prefixed by a DH+ routing
/// destination, followed by `body` (the command-specific payload).
pub fn build(
    hdr: &PcccRequestHeader,
    dhp: Option<DhpDestination>,
    body: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(11 + body.len() + if dhp.is_some() { 2 } else { 0 });

    if let Some(d) = dhp {
        out.push(d.channel);
        out.push(d.node);
    }

    out.push(7); // request-id size
    out.extend_from_slice(&hdr.vendor_id.to_le_bytes());
    out.extend_from_slice(&hdr.vendor_serial.to_le_bytes());
    out.push(hdr.command);
    out.push(0); // status, 0 in a request
    out.extend_from_slice(&hdr.sequence.to_le_bytes());
    out.push(hdr.function);
    out.extend_from_slice(body);
    out
}

/// Builds the typed-data descriptor byte (type nibble, size nibble) for a
/// scalar PCCC element.
pub fn typed_descriptor(element_type: u8, element_size: u8) -> u8 {
    ((element_type & 0x0F) << 4) | (element_size & 0x0F)
}

/// Builds the body of a typed-read PCCC request: element count (u16).
pub fn build_typed_read_body(element_count: u16) -> Vec<u8> {
    element_count.to_le_bytes().to_vec()
}

/// Builds the body of a typed-write PCCC request: an array descriptor
/// (size = element-descriptor-bytes + total-data-bytes) followed by the
/// element descriptor and the raw element data (spec §4.4).
pub fn build_typed_write_body(element_type: u8, element_size: u8, data: &[u8]) -> Vec<u8> {
    let element_descriptor = [typed_descriptor(element_type, element_size), element_size];
    let array_size = element_descriptor.len() as u8 + data.len() as u8;

    let mut out = Vec::with_capacity(2 + element_descriptor.len() + data.len());
    out.push(typed_descriptor(0x0A, 0)); // array-of type marker
    out.push(array_size);
    out.extend_from_slice(&element_descriptor);
    out.extend_from_slice(data);
    out
}

/// A parsed PCCC reply: the status byte and the reply body (for reads, the
/// element data; for writes, empty).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcccReply<'a> {
    pub status: u8,
    pub sequence: u16,
    pub data: &'a [u8],
}

/// Parses a PCCC reply envelope: request-id size byte, vendor id/serial,
/// command, status, sequence, then reply data (spec §4.1).
pub fn parse_reply(buf: &[u8]) -> Result<PcccReply<'_>> {
    ensure!(buf.len() >= 11, "PCCC reply envelope truncated");
    let status = buf[8];
    let sequence = u16::from_le_bytes([buf[9], buf[10]]);
    Ok(PcccReply { status, sequence, data: &buf[11..] })
}

impl<'a> PcccReply<'a> {
    pub fn error(&self) -> Option<EipError> {
        pccc_status_to_error(self.status)
    }
}
