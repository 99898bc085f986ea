// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PCCC typed read/write requests wrapped in CIP `ExecutePCCC` (`0x4B`),
//! for PLC-5/SLC/MicroLogix targets (spec §4.4). `address` is the already
//! wire-encoded PCCC logical address (e.g. `N7:10`), produced by the
//! out-of-scope tag-name parser.

use anyhow::Result;

use crate::wire::{
    cip,
    pccc::{self, DhpDestination, FN_TYPED_READ, FN_TYPED_WRITE, PCCC_COMMAND_EXECUTE, PcccRequestHeader},
};

/// PCCC object path (class `0x67` instance `1`), the fixed target of every
/// `ExecutePCCC` request regardless of which PCCC command it carries.
pub fn pccc_object_path() -> Vec<u8> {
    cip::epath_class_instance(0x67, 0x01)
}

/// Everything the caller supplies to identify itself in the PCCC envelope,
/// common to every typed read/write (spec §4.1).
#[derive(Debug, Clone, Copy)]
pub struct PcccIdentity {
    pub vendor_id: u16,
    pub vendor_serial: u32,
    pub sequence: u16,
}

/// Builds a typed-read `ExecutePCCC` request: transfer size = element
/// count (spec §4.4).
pub fn build_typed_read(
    identity: PcccIdentity,
    dhp: Option<DhpDestination>,
    address: &[u8],
    element_count: u16,
) -> Result<Vec<u8>> {
    let hdr = PcccRequestHeader {
        vendor_id: identity.vendor_id,
        vendor_serial: identity.vendor_serial,
        command: PCCC_COMMAND_EXECUTE,
        sequence: identity.sequence,
        function: FN_TYPED_READ,
    };
    let mut pccc_body = address.to_vec();
    pccc_body.extend_from_slice(&pccc::build_typed_read_body(element_count));
    let envelope = pccc::build(&hdr, dhp, &pccc_body);

    let mut body = cip::build_request_header(cip::SVC_EXECUTE_PCCC, &pccc_object_path())?;
    body.extend_from_slice(&envelope);
    Ok(body)
}

/// Builds a typed-write `ExecutePCCC` request: an array descriptor wrapping
/// the element descriptor and raw element data (spec §4.4).
pub fn build_typed_write(
    identity: PcccIdentity,
    dhp: Option<DhpDestination>,
    address: &[u8],
    element_type: u8,
    element_size: u8,
    data: &[u8],
) -> Result<Vec<u8>> {
    let hdr = PcccRequestHeader {
        vendor_id: identity.vendor_id,
        vendor_serial: identity.vendor_serial,
        command: PCCC_COMMAND_EXECUTE,
        sequence: identity.sequence,
        function: FN_TYPED_WRITE,
    };
    let mut pccc_body = address.to_vec();
    pccc_body.extend_from_slice(&pccc::build_typed_write_body(element_type, element_size, data));
    let envelope = pccc::build(&hdr, dhp, &pccc_body);

    let mut body = cip::build_request_header(cip::SVC_EXECUTE_PCCC, &pccc_object_path())?;
    body.extend_from_slice(&envelope);
    Ok(body)
}
