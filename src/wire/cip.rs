// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! CIP service header framing (spec §4.1): service code, request path, and
//! the reply's general/extended status.
//!
//! Service codes are only unique per target object class, not globally —
//! `0x52` means Unconnected Send against the Connection Manager and Read Tag
//! Fragmented against a Logix symbol instance. This module exposes the raw
//! codes and lets callers interpret them in context.

use anyhow::{Result, ensure};

use crate::error::EipError;

pub const SVC_GET_ATTRIBUTE_ALL: u8 = 0x01;
pub const SVC_GET_ATTRIBUTE_LIST: u8 = 0x03;
pub const SVC_EXECUTE_PCCC: u8 = 0x4B;
pub const SVC_CIP_READ: u8 = 0x4C;
pub const SVC_CIP_WRITE: u8 = 0x4D;
pub const SVC_FORWARD_CLOSE: u8 = 0x4E;
pub const SVC_CIP_READ_FRAG: u8 = 0x52;
pub const SVC_UNCONNECTED_SEND: u8 = 0x52;
pub const SVC_CIP_WRITE_FRAG: u8 = 0x53;
/// Read-Modify-Write Tag, a vendor-specific service on the Symbol object
/// (class `0x6B`) used for bit-in-word writes. Shares its numeric value
/// with [`SVC_FORWARD_CLOSE`] on the Connection Manager object; service
/// codes are only unique per target class (spec §4.1, §4.4).
pub const SVC_READ_MODIFY_WRITE: u8 = 0x4E;
pub const SVC_FORWARD_OPEN: u8 = 0x54;
pub const SVC_CIP_LIST_TAGS: u8 = 0x55;
pub const SVC_FORWARD_OPEN_EX: u8 = 0x5B;
pub const SVC_MULTIPLE_SERVICE_PACKET: u8 = 0x0A;

/// OR'd into a request service code to get the corresponding reply service.
pub const REPLY_MASK: u8 = 0x80;

/// General status `Partial/Bundled error` — a non-fatal per-sub-response
/// status inside a `MultipleServicePacket` reply (spec §4.3).
pub const STATUS_PARTIAL_OR_BUNDLED_ERROR: u8 = 0x1E;

/// CIP "fragmented transfer in progress" general status (spec §4.1).
pub const STATUS_FRAGMENTED: u8 = 0x06;

#[inline]
pub fn reply_service(request_service: u8) -> u8 {
    request_service | REPLY_MASK
}

/// Builds a CIP service header: service code, path size in words, path
/// bytes. `path` must have even length.
pub fn build_request_header(service: u8, path: &[u8]) -> Result<Vec<u8>> {
    ensure!(path.len() % 2 == 0, "CIP request path must have even length, got {}", path.len());
    let mut out = Vec::with_capacity(2 + path.len());
    out.push(service);
    out.push((path.len() / 2) as u8);
    out.extend_from_slice(path);
    Ok(out)
}

/// Encodes a logical segment path addressing `class`/`instance`, using the
/// 8-bit form when both fit and the 16-bit form otherwise (the
/// MultipleServicePacket path to the Message Router is always the 8-bit
/// form: `20 02 24 01`).
pub fn epath_class_instance(class: u16, instance: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    if class <= 0xFF {
        out.push(0x20);
        out.push(class as u8);
    } else {
        out.push(0x21);
        out.push(0x00);
        out.extend_from_slice(&class.to_le_bytes());
    }
    if instance <= 0xFF {
        out.push(0x24);
        out.push(instance as u8);
    } else {
        out.push(0x25);
        out.push(0x00);
        out.extend_from_slice(&instance.to_le_bytes());
    }
    // Pad to even length (16-bit segments already are; 8-bit pairs already are).
    if out.len() % 2 != 0 {
        out.push(0);
    }
    out
}

/// Encodes a comma-separated routing path (e.g. `"1,0"` for backplane port
/// 1, slot 0) into CIP port segments: each `port,link` pair becomes one
/// byte (port number, or `0x10 | port` when `link > 255`) followed by the
/// link address (1 byte, or 2 bytes little-endian plus a zero pad byte when
/// extended).
///
/// An empty path encodes to an empty byte string (no routing hops — the
/// gateway itself is the target, as for Micro800).
pub fn encode_port_path(path: &str) -> Result<Vec<u8>> {
    let path = path.trim();
    if path.is_empty() {
        return Ok(Vec::new());
    }

    let nums: Vec<u32> = path
        .split(',')
        .map(|t| t.trim().parse::<u32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| anyhow::anyhow!("invalid routing path {path:?}"))?;
    ensure!(nums.len() % 2 == 0, "routing path {path:?} must have an even number of terms");

    let mut out = Vec::new();
    for pair in nums.chunks_exact(2) {
        let (port, link) = (pair[0], pair[1]);
        ensure!(port <= 0x0F, "routing path port {port} out of range");
        if link <= 0xFF {
            out.push(port as u8);
            out.push(link as u8);
        } else {
            ensure!(link <= 0xFFFF, "routing path link address {link} out of range");
            out.push(0x10 | port as u8);
            out.extend_from_slice(&(link as u16).to_le_bytes());
            out.push(0);
        }
    }
    Ok(out)
}

/// A parsed CIP reply header: reply service code, general status, and the
/// additional (extended) status words, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipReplyHeader<'a> {
    pub reply_service: u8,
    pub general_status: u8,
    pub extended_status: &'a [u8],
    pub data: &'a [u8],
}

/// Parses the fixed CIP reply prefix: service (u8), reserved (u8),
/// general status (u8), additional status size in words (u8), then that
/// many 16-bit words, then the reply data.
pub fn parse_reply_header(buf: &[u8]) -> Result<CipReplyHeader<'_>> {
    ensure!(buf.len() >= 4, "CIP reply header truncated");
    let reply_service = buf[0];
    let general_status = buf[2];
    let extended_words = buf[3] as usize;
    let extended_len = extended_words * 2;
    ensure!(buf.len() >= 4 + extended_len, "CIP reply extended status truncated");

    Ok(CipReplyHeader {
        reply_service,
        general_status,
        extended_status: &buf[4..4 + extended_len],
        data: &buf[4 + extended_len..],
    })
}

impl<'a> CipReplyHeader<'a> {
    /// First extended status word, little-endian, if present.
    pub fn extended_status_word(&self) -> Option<u16> {
        if self.extended_status.len() >= 2 {
            Some(u16::from_le_bytes([self.extended_status[0], self.extended_status[1]]))
        } else {
            None
        }
    }

    /// Second extended status word (carries e.g. the ForwardOpen supported
    /// connection size), little-endian, if present.
    pub fn extended_status_trailing_word(&self) -> Option<u16> {
        if self.extended_status.len() >= 4 {
            Some(u16::from_le_bytes([self.extended_status[2], self.extended_status[3]]))
        } else {
            None
        }
    }

    /// Maps the general status to `Ok(())`/`EipError`, treating
    /// `STATUS_FRAGMENTED` as success (the fragmented-read/write loop
    /// interprets it itself).
    pub fn status(&self) -> Result<(), EipError> {
        match self.general_status {
            0x00 | STATUS_FRAGMENTED => Ok(()),
            other => Err(EipError::RemoteError(other)),
        }
    }
}
