// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Logix-class CIP read/write/read-modify-write request builders and
//! response parsers (spec §4.4).
//!
//! `path` everywhere below is the already wire-encoded CIP symbolic path
//! for the target tag, produced by the (out-of-scope) tag-name parser.
//! Every `build_*` function returns a complete CIP service request — the
//! service byte through the last data byte — suitable either as a
//! [`crate::request::Request`] body directly, or as one sub-request handed
//! to [`crate::session::packer::build`].

use anyhow::{Result, bail, ensure};

use crate::wire::cip::{self, CipReplyHeader};

/// Atomic CIP data type codes occupy this range (spec §4.4); the second
/// byte of the descriptor is reserved and always zero.
pub const ATOMIC_TYPE_MIN: u8 = 0xC1;
pub const ATOMIC_TYPE_MAX: u8 = 0xDE;

/// Marks a variable-length aggregate (structure) type descriptor: a length
/// byte followed by that many bytes of opaque structure handle.
const AGGREGATE_MARKER: u8 = 0xA0;

/// The type descriptor a Logix read reply leads with, and a write must
/// echo back (spec §4.4 "CIP write"). Recorded on the tag the first time a
/// read sees it so a later write knows which form to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    /// A scalar atomic type, e.g. `0xC4` = DINT.
    Atomic(u8),
    /// A structure (UDT instance, STRING, etc.): opaque handle bytes.
    Aggregate(Vec<u8>),
}

impl TypeDescriptor {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            TypeDescriptor::Atomic(code) => vec![*code, 0x00],
            TypeDescriptor::Aggregate(handle) => {
                let mut out = Vec::with_capacity(2 + handle.len());
                out.push(AGGREGATE_MARKER);
                out.push(handle.len() as u8);
                out.extend_from_slice(handle);
                out
            },
        }
    }

    /// Parses one descriptor off the front of `buf`, returning it and the
    /// remaining bytes.
    fn parse(buf: &[u8]) -> Result<(Self, &[u8])> {
        ensure!(!buf.is_empty(), "CIP type descriptor truncated");
        if (ATOMIC_TYPE_MIN..=ATOMIC_TYPE_MAX).contains(&buf[0]) {
            ensure!(buf.len() >= 2, "atomic type descriptor truncated");
            Ok((TypeDescriptor::Atomic(buf[0]), &buf[2..]))
        } else if buf[0] == AGGREGATE_MARKER {
            ensure!(buf.len() >= 2, "aggregate type descriptor truncated");
            let len = buf[1] as usize;
            ensure!(buf.len() >= 2 + len, "aggregate type descriptor handle truncated");
            Ok((TypeDescriptor::Aggregate(buf[2..2 + len].to_vec()), &buf[2 + len..]))
        } else {
            bail!("unrecognized CIP type descriptor byte 0x{:02x}", buf[0]);
        }
    }
}

/// Builds `CipReadFrag` (`0x52` against a symbol instance): path, element
/// count, bytes already read.
pub fn build_read_frag(path: &[u8], element_count: u16, byte_offset: u32) -> Result<Vec<u8>> {
    let mut body = cip::build_request_header(cip::SVC_CIP_READ_FRAG, path)?;
    body.extend_from_slice(&element_count.to_le_bytes());
    body.extend_from_slice(&byte_offset.to_le_bytes());
    Ok(body)
}

/// Builds `CipRead` (`0x4C`) for targets with no fragmentation support
/// (Omron-NJ, spec §4.4): no byte offset, never iterates.
pub fn build_read_single(path: &[u8], element_count: u16) -> Result<Vec<u8>> {
    let mut body = cip::build_request_header(cip::SVC_CIP_READ, path)?;
    body.extend_from_slice(&element_count.to_le_bytes());
    Ok(body)
}

/// Builds `CipWrite` (`0x4D`) for a payload that fits in one packet: path,
/// the stored type descriptor, element count, data padded to even length.
pub fn build_write(
    path: &[u8],
    type_descriptor: &TypeDescriptor,
    element_count: u16,
    data: &[u8],
) -> Result<Vec<u8>> {
    let mut body = cip::build_request_header(cip::SVC_CIP_WRITE, path)?;
    body.extend_from_slice(&type_descriptor.to_bytes());
    body.extend_from_slice(&element_count.to_le_bytes());
    body.extend_from_slice(data);
    if data.len() % 2 != 0 {
        body.push(0);
    }
    Ok(body)
}

/// Builds `CipWriteFrag` (`0x53`) for a payload that does not fit in one
/// packet: as [`build_write`] plus the byte offset of this fragment.
pub fn build_write_frag(
    path: &[u8],
    type_descriptor: &TypeDescriptor,
    element_count: u16,
    byte_offset: u32,
    data: &[u8],
) -> Result<Vec<u8>> {
    let mut body = cip::build_request_header(cip::SVC_CIP_WRITE_FRAG, path)?;
    body.extend_from_slice(&type_descriptor.to_bytes());
    body.extend_from_slice(&element_count.to_le_bytes());
    body.extend_from_slice(&byte_offset.to_le_bytes());
    body.extend_from_slice(data);
    if data.len() % 2 != 0 {
        body.push(0);
    }
    Ok(body)
}

/// Computes the OR-mask/AND-mask pair for a Read-Modify-Write Tag request
/// that sets exactly one bit of a `total_bytes`-wide word to `set_to`
/// (spec §4.4 "bit-in-word"): `result = (current & and_mask) | or_mask`.
pub fn bit_modify_masks(total_bytes: usize, bit_index: u32, set_to: bool) -> (Vec<u8>, Vec<u8>) {
    let mut or_mask = vec![0u8; total_bytes];
    let mut and_mask = vec![0xFFu8; total_bytes];
    let byte = (bit_index / 8) as usize;
    let bit = (bit_index % 8) as u8;
    if set_to {
        or_mask[byte] |= 1 << bit;
    } else {
        and_mask[byte] &= !(1 << bit);
    }
    (or_mask, and_mask)
}

/// Builds a Read-Modify-Write Tag request for a bit-in-word write: path,
/// mask size, OR-mask, AND-mask.
pub fn build_read_modify_write(path: &[u8], or_mask: &[u8], and_mask: &[u8]) -> Result<Vec<u8>> {
    ensure!(or_mask.len() == and_mask.len(), "OR-mask and AND-mask must be the same size");
    let mut body = cip::build_request_header(cip::SVC_READ_MODIFY_WRITE, path)?;
    body.extend_from_slice(&(or_mask.len() as u16).to_le_bytes());
    body.extend_from_slice(or_mask);
    body.extend_from_slice(and_mask);
    Ok(body)
}

/// One read reply, possibly one fragment of several (spec §4.4 "CIP
/// read"). `type_descriptor` is only present on the first fragment
/// (`byte_offset == 0`); later fragments resume the data stream with no
/// header of their own.
#[derive(Debug, Clone)]
pub struct ReadFragment<'a> {
    pub type_descriptor: Option<TypeDescriptor>,
    pub data: &'a [u8],
    /// `true` once general status is `0` — no further fragments to request.
    pub complete: bool,
}

/// Parses a `CipRead`/`CipReadFrag` reply (spec §4.4). `header` is the CIP
/// reply header parsed off the completed request's buffer;
/// `is_first_fragment` tells the parser whether to expect a leading type
/// descriptor.
pub fn parse_read_reply<'a>(
    header: &CipReplyHeader<'a>,
    is_first_fragment: bool,
) -> Result<ReadFragment<'a>> {
    let complete = header.general_status == 0;
    if is_first_fragment {
        let (descriptor, rest) = TypeDescriptor::parse(header.data)?;
        Ok(ReadFragment { type_descriptor: Some(descriptor), data: rest, complete })
    } else {
        Ok(ReadFragment { type_descriptor: None, data: header.data, complete })
    }
}
