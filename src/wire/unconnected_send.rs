// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `UnconnectedSend` (CIP `0x52` against the Connection Manager, class
//! `0x06` instance `1`) wraps an embedded CIP request so it can be routed
//! to a device that has no open connection (spec §4.1).

use anyhow::{Result, ensure};

use crate::wire::cip;

/// Connection Manager object path (`20 06 24 01`), the fixed target of
/// every `UnconnectedSend`.
pub fn connection_manager_path() -> Vec<u8> {
    cip::epath_class_instance(0x06, 0x01)
}

/// Wraps `embedded_body` (a full CIP service request, service byte
/// onward) in an UnconnectedSend envelope addressed to `route_path`.
///
/// Layout: tick time (u8), timeout ticks (u8), embedded length (u16),
/// embedded body, an even-length pad byte if the embedded body is odd,
/// route path size in words (u8), reserved (u8 = 0), route path bytes.
pub fn build(
    tick_time: u8,
    timeout_ticks: u8,
    embedded_body: &[u8],
    route_path: &[u8],
) -> Result<Vec<u8>> {
    ensure!(route_path.len() % 2 == 0, "route path must have even length");
    let pad = embedded_body.len() % 2;
    let mut out =
        Vec::with_capacity(4 + embedded_body.len() + pad + 2 + route_path.len());

    out.push(tick_time);
    out.push(timeout_ticks);
    out.extend_from_slice(&(embedded_body.len() as u16).to_le_bytes());
    out.extend_from_slice(embedded_body);
    if pad == 1 {
        out.push(0);
    }
    out.push((route_path.len() / 2) as u8);
    out.push(0); // reserved
    out.extend_from_slice(route_path);

    Ok(out)
}

/// Extracts the embedded CIP request body back out of an UnconnectedSend
/// request (used by the loopback test fixture, which must decode what the
/// Session sent).
pub fn parse_embedded(buf: &[u8]) -> Result<&[u8]> {
    ensure!(buf.len() >= 4, "UnconnectedSend body truncated");
    let embedded_len = u16::from_le_bytes([buf[2], buf[3]]) as usize;
    ensure!(buf.len() >= 4 + embedded_len, "UnconnectedSend embedded body truncated");
    Ok(&buf[4..4 + embedded_len])
}
