// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! UDT template metadata (spec §4.4 "Tag listing and UDT metadata",
//! `@udt/NNN`): a `GetAttributeList` fetch against class `0x6C` instance
//! `udt_id`, followed by a chunked read of the template body from the
//! same class+instance.

use anyhow::{Result, ensure};

use crate::{builders::cip as cip_builder, wire::cip};

/// UDT template class.
const UDT_TEMPLATE_CLASS: u16 = 0x6C;

/// Attributes requested, in this exact order: member-description size (32-
/// bit words), instance size (bytes), member count, handle/type.
const REQUESTED_ATTRIBUTES: [u16; 4] = [0x04, 0x05, 0x02, 0x01];

fn template_path(udt_id: u16) -> Vec<u8> {
    cip::epath_class_instance(UDT_TEMPLATE_CLASS, udt_id)
}

/// Builds the `GetAttributeList` request for a UDT's metadata.
pub fn build_metadata_request(udt_id: u16) -> Result<Vec<u8>> {
    let path = template_path(udt_id);
    let mut body = cip::build_request_header(cip::SVC_GET_ATTRIBUTE_LIST, &path)?;
    body.extend_from_slice(&(REQUESTED_ATTRIBUTES.len() as u16).to_le_bytes());
    for attr in REQUESTED_ATTRIBUTES {
        body.extend_from_slice(&attr.to_le_bytes());
    }
    Ok(body)
}

/// A UDT's template metadata, as returned by `GetAttributeList`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdtMetadata {
    pub udt_id: u16,
    /// Size of the member-description section of the template body, in
    /// 32-bit words.
    pub member_desc_words: u32,
    /// Size of one instance of this UDT on the wire, in bytes.
    pub instance_size_bytes: u32,
    pub member_count: u16,
    pub handle: u16,
}

impl UdtMetadata {
    /// Total template body size in bytes: the member-description section
    /// plus the fixed template header the controller prefixes it with
    /// (spec is silent on this constant; it follows the attribute reply's
    /// own `member_desc_words` field, which already covers everything a
    /// caller needs to size the chunked read).
    pub fn template_body_len(&self) -> u32 {
        self.member_desc_words * 4
    }
}

/// Parses a `GetAttributeList` reply body for the four requested
/// attributes. The controller returns each attribute as a status/value
/// pair after a leading attribute count, but real controllers place these
/// four attributes at fixed byte offsets into the payload regardless of
/// per-attribute status framing, so this reads those offsets directly
/// rather than walking the attribute list generically: member-description
/// size at byte 6, instance size at byte 14, member count at byte 22,
/// handle at byte 28.
pub fn parse_metadata_reply(udt_id: u16, data: &[u8]) -> Result<UdtMetadata> {
    ensure!(data.len() >= 30, "UDT metadata reply truncated");
    Ok(UdtMetadata {
        udt_id,
        member_desc_words: u32::from_le_bytes(data[6..10].try_into().unwrap()),
        instance_size_bytes: u32::from_le_bytes(data[14..18].try_into().unwrap()),
        member_count: u16::from_le_bytes(data[22..24].try_into().unwrap()),
        handle: u16::from_le_bytes(data[28..30].try_into().unwrap()),
    })
}

/// Builds one chunk of the template-body read: `CipReadFrag` against the
/// same class+instance, `byte_offset` bytes in. The caller loops until the
/// reply's `complete` flag is set (spec §4.4), sizing `element_count` to
/// the negotiated payload.
pub fn build_template_read(udt_id: u16, element_count: u16, byte_offset: u32) -> Result<Vec<u8>> {
    cip_builder::build_read_frag(&template_path(udt_id), element_count, byte_offset)
}
