// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Combines several queued connected requests into one
//! `MultipleServicePacket` (spec §4.3), and unpacks the matching reply back
//! into per-request slices.

use anyhow::{Result, bail};

use crate::wire::cip;

/// Message Router object path (class `0x02` instance `1`), the fixed target
/// of a `MultipleServicePacket`.
pub fn message_router_path() -> Vec<u8> {
    cip::epath_class_instance(0x02, 0x01)
}

/// Given the bodies of consecutive queued requests (each a bare CIP service
/// request, no CPF/encapsulation headers) and the negotiated
/// `max_payload_size`, returns how many leading bodies can be packed
/// together.
///
/// The first body is always included even if it alone would not fit under
/// a smaller limit (the singleton case never fails this way in practice,
/// since `max_payload_size` already bounds a single request). Packing stops
/// as soon as adding the next body would push the total CIP payload above
/// `max_payload_size`, counting the `MultipleServicePacket` header, the
/// growing offset table, and the header that will wrap the packed body
/// (spec §4.3).
pub fn select_batch(bodies: &[&[u8]], max_payload_size: usize) -> usize {
    if bodies.is_empty() {
        return 0;
    }

    let header_len = 2 + message_router_path().len(); // service + path-size + path
    let mut count = 1usize;
    let mut total = count_len_field_bytes() + bodies[0].len() + 2; // count + body + 1 offset

    for body in &bodies[1..] {
        let next_total = total + 2 + body.len(); // one more offset + body bytes
        if header_len + next_total > max_payload_size {
            break;
        }
        total = next_total;
        count += 1;
    }

    count
}

fn count_len_field_bytes() -> usize {
    2
}

/// Builds the full `MultipleServicePacket` CIP service request wrapping
/// `bodies` in order (spec §4.3 packed header layout).
pub fn build(bodies: &[&[u8]]) -> Result<Vec<u8>> {
    let path = message_router_path();
    let count = bodies.len() as u16;

    // Offsets are measured from the start of the count field.
    let mut offsets = Vec::with_capacity(bodies.len());
    let mut cursor = 2 + bodies.len() * 2; // count field + one u16 offset per body
    for body in bodies {
        offsets.push(cursor as u16);
        cursor += body.len();
    }

    let mut packed_body = Vec::with_capacity(cursor);
    packed_body.extend_from_slice(&count.to_le_bytes());
    for off in &offsets {
        packed_body.extend_from_slice(&off.to_le_bytes());
    }
    for body in bodies {
        packed_body.extend_from_slice(body);
    }

    let mut out = cip::build_request_header(cip::SVC_MULTIPLE_SERVICE_PACKET, &path)?;
    out.extend_from_slice(&packed_body);
    Ok(out)
}

/// Splits a `MultipleServicePacket` reply body (after the outer CIP reply
/// header) into one slice per sub-response, using the offset table and the
/// buffer's own end to compute each sub-response's length (spec §4.3).
pub fn unpack<'a>(sub_response_count: u16, offsets: &[u16], data: &'a [u8]) -> Result<Vec<&'a [u8]>> {
    if offsets.len() != sub_response_count as usize {
        bail!("MultipleServicePacket offset table length mismatch");
    }

    let mut out = Vec::with_capacity(offsets.len());
    for (i, &start) in offsets.iter().enumerate() {
        let start = start as usize;
        let end = offsets.get(i + 1).map(|&o| o as usize).unwrap_or(data.len());
        if start > data.len() || end > data.len() || start > end {
            bail!("MultipleServicePacket sub-response offset out of range");
        }
        out.push(&data[start..end]);
    }
    Ok(out)
}
