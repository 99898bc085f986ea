// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Tagged-variant PLC dispatch (spec §9): a pure function per kind for
//! `build_read`/`build_write`, replacing the teacher's per-tag vtable.
//!
//! This mirrors [`crate::cfg::enums::PlcKind`] but is a distinct type: the
//! `cfg` enum governs session-level policy (connected vs unconnected,
//! payload guess), while this one only routes a single read/write to the
//! `cip` or `pccc` builder that knows how to encode it. A tag never needs
//! more than this to build its next request.

use anyhow::Result;

use crate::{
    builders::{
        cip::{self, TypeDescriptor},
        pccc::{self, PcccIdentity},
    },
    cfg::enums,
    wire::pccc::DhpDestination,
};

/// Which protocol family a tag's requests are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlcKind {
    Plc5,
    Slc,
    MicroLogix,
    Logix,
    LogixPccc,
    Micro800,
    OmronNj,
}

impl From<enums::PlcKind> for PlcKind {
    fn from(kind: enums::PlcKind) -> Self {
        match kind {
            enums::PlcKind::Plc5 => PlcKind::Plc5,
            enums::PlcKind::Slc => PlcKind::Slc,
            enums::PlcKind::MicroLogix => PlcKind::MicroLogix,
            enums::PlcKind::Logix => PlcKind::Logix,
            enums::PlcKind::LogixPccc => PlcKind::LogixPccc,
            enums::PlcKind::Micro800 => PlcKind::Micro800,
            enums::PlcKind::OmronNj => PlcKind::OmronNj,
        }
    }
}

impl PlcKind {
    /// Whether reads/writes for this kind are built as PCCC envelopes
    /// (`ExecutePCCC`) rather than native CIP read/write services.
    pub fn is_pccc(self) -> bool {
        matches!(self, PlcKind::Plc5 | PlcKind::Slc | PlcKind::MicroLogix | PlcKind::LogixPccc)
    }

    /// Whether this kind supports fragmented read/write at all. Omron-NJ
    /// only answers unfragmented `CipRead`/`CipWrite` (spec §4.4).
    pub fn supports_fragmentation(self) -> bool {
        !matches!(self, PlcKind::OmronNj)
    }
}

/// Everything a read/write builder needs that is not already implied by
/// the target `path`/`address`: identity fields for the PCCC envelope, and
/// (for CIP writes) the type descriptor recorded from a prior read.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub pccc_identity: PcccIdentity,
    pub dhp: Option<DhpDestination>,
}

/// Builds a read request for `kind` against `path` (CIP symbolic path) or
/// `address` (PCCC logical address) — whichever applies — starting at
/// `byte_offset` bytes into the tag's value. Fragmentation is handled by
/// the caller looping on [`crate::builders::cip::ReadFragment::complete`];
/// this only ever builds the next single request.
pub fn build_read(
    kind: PlcKind,
    ctx: &BuildContext,
    path_or_address: &[u8],
    element_count: u16,
    byte_offset: u32,
) -> Result<Vec<u8>> {
    if kind.is_pccc() {
        pccc::build_typed_read(ctx.pccc_identity, ctx.dhp, path_or_address, element_count)
    } else if kind.supports_fragmentation() {
        cip::build_read_frag(path_or_address, element_count, byte_offset)
    } else {
        cip::build_read_single(path_or_address, element_count)
    }
}

/// Builds a write request for `kind`. `type_descriptor` is `None` for PCCC
/// kinds (the descriptor there is `element_type`/`element_size`, not a CIP
/// [`TypeDescriptor`]) and must be `Some` for CIP kinds — it is the
/// descriptor a prior read recorded for this tag.
#[allow(clippy::too_many_arguments)]
pub fn build_write(
    kind: PlcKind,
    ctx: &BuildContext,
    path_or_address: &[u8],
    type_descriptor: Option<&TypeDescriptor>,
    pccc_element_type: u8,
    pccc_element_size: u8,
    element_count: u16,
    byte_offset: u32,
    data: &[u8],
) -> Result<Vec<u8>> {
    if kind.is_pccc() {
        pccc::build_typed_write(
            ctx.pccc_identity,
            ctx.dhp,
            path_or_address,
            pccc_element_type,
            pccc_element_size,
            data,
        )
    } else {
        let descriptor = type_descriptor
            .ok_or_else(|| anyhow::anyhow!("CIP write requires a type descriptor from a prior read"))?;
        if kind.supports_fragmentation() && byte_offset > 0 {
            cip::build_write_frag(path_or_address, descriptor, element_count, byte_offset, data)
        } else {
            cip::build_write(path_or_address, descriptor, element_count, data)
        }
    }
}
