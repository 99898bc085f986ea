// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `CipListTags` (`0x55`) request building and reply parsing for `@tags`
//! and `PROGRAM:x.@tags` (spec §4.4 "Tag listing and UDT metadata").
//!
//! Pagination: a request starts at `starting_instance_id` (`0` for the
//! first page); the reply is fragmented (general status
//! [`crate::wire::cip::STATUS_FRAGMENTED`]) when more tags remain, and the
//! next request's starting id is `last entry's instance_id + 1`.

use anyhow::{Result, ensure};

use crate::wire::cip;

/// Symbol/tag-info class targeted by `CipListTags`.
const TAG_INFO_CLASS: u16 = 0x6B;

/// The four attributes requested per entry: symbol type, base type size
/// in bytes, array dimensions, symbol name — in this exact order, which
/// is also the order the reply's fixed fields appear in.
const REQUESTED_ATTRIBUTES: [u16; 4] = [0x02, 0x07, 0x08, 0x01];

/// Builds a `CipListTags` request for one page, optionally scoped to a
/// program's local tags when `program_path` (the program's own encoded
/// symbolic path, without its leading CIP path-size byte) is given.
pub fn build(starting_instance_id: u32, program_path: Option<&[u8]>) -> Result<Vec<u8>> {
    ensure!(starting_instance_id <= u16::MAX as u32, "tag list instance id {starting_instance_id} out of range");

    let mut path = Vec::new();
    if let Some(program_path) = program_path {
        path.extend_from_slice(program_path);
    }
    path.push(0x20);
    path.push(TAG_INFO_CLASS as u8);
    path.push(0x25);
    path.push(0x00);
    path.extend_from_slice(&(starting_instance_id as u16).to_le_bytes());

    let mut body = cip::build_request_header(cip::SVC_CIP_LIST_TAGS, &path)?;
    body.extend_from_slice(&(REQUESTED_ATTRIBUTES.len() as u16).to_le_bytes());
    for attr in REQUESTED_ATTRIBUTES {
        body.extend_from_slice(&attr.to_le_bytes());
    }
    Ok(body)
}

/// One decoded tag-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagListEntry {
    pub instance_id: u32,
    pub symbol_type: u16,
    pub element_length: u16,
    pub array_dims: [u32; 3],
    pub name: Vec<u8>,
}

/// Entry wire layout: `instance_id` (u32), `symbol_type` (u16),
/// `element_length` (u16), `array_dims` (3 x u32), `string_len` (u16),
/// then `string_len` bytes of name, not padded.
const ENTRY_FIXED_LEN: usize = 4 + 2 + 2 + 12 + 2;

/// Decodes every whole entry present in one reply's data, returning them
/// plus the instance id to resume from on the next page (`last id + 1`).
/// Truncated trailing bytes (whose owning entry must wait for the next
/// fragment) are ignored, mirroring the original client's behavior.
pub fn parse_entries(data: &[u8]) -> Result<(Vec<TagListEntry>, Option<u32>)> {
    let mut entries = Vec::new();
    let mut next_id = None;
    let mut rest = data;

    while rest.len() >= ENTRY_FIXED_LEN {
        let instance_id = u32::from_le_bytes(rest[0..4].try_into().unwrap());
        let symbol_type = u16::from_le_bytes(rest[4..6].try_into().unwrap());
        let element_length = u16::from_le_bytes(rest[6..8].try_into().unwrap());
        let array_dims = [
            u32::from_le_bytes(rest[8..12].try_into().unwrap()),
            u32::from_le_bytes(rest[12..16].try_into().unwrap()),
            u32::from_le_bytes(rest[16..20].try_into().unwrap()),
        ];
        let string_len = u16::from_le_bytes(rest[20..22].try_into().unwrap()) as usize;
        ensure!(rest.len() >= ENTRY_FIXED_LEN + string_len, "tag list entry name truncated");

        let name = rest[ENTRY_FIXED_LEN..ENTRY_FIXED_LEN + string_len].to_vec();
        next_id = Some(instance_id + 1);
        entries.push(TagListEntry { instance_id, symbol_type, element_length, array_dims, name });
        rest = &rest[ENTRY_FIXED_LEN + string_len..];
    }

    Ok((entries, next_id))
}
