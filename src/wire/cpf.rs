// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Common Packet Format framing carried inside `SendRRData`/`SendUnitData`
//! (spec §4.1): an interface handle, a router timeout, an item count, and
//! that many `(type, length, value)` items.

use anyhow::{Result, bail, ensure};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, LittleEndian, U16, U32};

pub const ITEM_TYPE_NULL_ADDRESS: u16 = 0x0000;
pub const ITEM_TYPE_CONNECTED_ADDRESS: u16 = 0x00A1;
pub const ITEM_TYPE_UNCONNECTED_DATA: u16 = 0x00B2;
pub const ITEM_TYPE_CONNECTED_DATA: u16 = 0x00B1;

/// Fixed part of the CPF envelope preceding the item array.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct CpfHeader {
    pub interface_handle: U32<LittleEndian>,
    pub router_timeout: U16<LittleEndian>,
    pub item_count: U16<LittleEndian>,
}

pub const CPF_HEADER_LEN: usize = 8;

/// `(type, length)` prefix of one CPF item.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct CpfItemHeader {
    pub type_id: U16<LittleEndian>,
    pub length: U16<LittleEndian>,
}

pub const CPF_ITEM_HEADER_LEN: usize = 4;

/// A parsed CPF item: its type id and a view into its value bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpfItem<'a> {
    pub type_id: u16,
    pub value: &'a [u8],
}

/// Encodes an unconnected CIP request: Null Address Item + Unconnected Data
/// Item wrapping `body`.
pub fn encode_unconnected(router_timeout: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CPF_HEADER_LEN + 2 * CPF_ITEM_HEADER_LEN + body.len());

    let mut hdr = CpfHeader::default();
    hdr.router_timeout.set(router_timeout);
    hdr.item_count.set(2);
    out.extend_from_slice(hdr.as_bytes());

    let mut null_item = CpfItemHeader::default();
    null_item.type_id.set(ITEM_TYPE_NULL_ADDRESS);
    out.extend_from_slice(null_item.as_bytes());

    let mut data_item = CpfItemHeader::default();
    data_item.type_id.set(ITEM_TYPE_UNCONNECTED_DATA);
    data_item.length.set(body.len() as u16);
    out.extend_from_slice(data_item.as_bytes());
    out.extend_from_slice(body);

    out
}

/// Encodes a connected CIP request: Connected Address Item carrying
/// `target_connection_id` + Connected Data Item wrapping `connection_seq`
/// followed by `body`.
pub fn encode_connected(target_connection_id: u32, connection_seq: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        CPF_HEADER_LEN + CPF_ITEM_HEADER_LEN + 4 + CPF_ITEM_HEADER_LEN + 2 + body.len(),
    );

    let mut hdr = CpfHeader::default();
    hdr.router_timeout.set(0);
    hdr.item_count.set(2);
    out.extend_from_slice(hdr.as_bytes());

    let mut addr_item = CpfItemHeader::default();
    addr_item.type_id.set(ITEM_TYPE_CONNECTED_ADDRESS);
    addr_item.length.set(4);
    out.extend_from_slice(addr_item.as_bytes());
    out.extend_from_slice(&target_connection_id.to_le_bytes());

    let mut data_item = CpfItemHeader::default();
    data_item.type_id.set(ITEM_TYPE_CONNECTED_DATA);
    data_item.length.set((2 + body.len()) as u16);
    out.extend_from_slice(data_item.as_bytes());
    out.extend_from_slice(&connection_seq.to_le_bytes());
    out.extend_from_slice(body);

    out
}

/// An unconnected CPF payload: the Unconnected Data Item's CIP body.
pub struct UnconnectedPayload<'a> {
    pub cip_body: &'a [u8],
}

/// A connected CPF payload: the target connection id echoed in the address
/// item, the connection sequence number, and the CIP body.
pub struct ConnectedPayload<'a> {
    pub target_connection_id: u32,
    pub connection_seq: u16,
    pub cip_body: &'a [u8],
}

fn read_item_header(buf: &[u8]) -> Result<(CpfItemHeader, &[u8])> {
    ensure!(buf.len() >= CPF_ITEM_HEADER_LEN, "CPF item header truncated");
    let hdr = CpfItemHeader::read_from_bytes(&buf[..CPF_ITEM_HEADER_LEN])
        .map_err(|e| anyhow::anyhow!("failed to parse CPF item header: {e}"))?;
    Ok((hdr, &buf[CPF_ITEM_HEADER_LEN..]))
}

/// Parses the CPF envelope assuming the unconnected (Null Address +
/// Unconnected Data) item layout.
pub fn decode_unconnected(buf: &[u8]) -> Result<UnconnectedPayload<'_>> {
    ensure!(buf.len() >= CPF_HEADER_LEN, "CPF header truncated");
    let hdr = CpfHeader::read_from_bytes(&buf[..CPF_HEADER_LEN])
        .map_err(|e| anyhow::anyhow!("failed to parse CPF header: {e}"))?;
    ensure!(hdr.item_count.get() == 2, "expected 2 CPF items, got {}", hdr.item_count.get());

    let rest = &buf[CPF_HEADER_LEN..];
    let (addr_hdr, rest) = read_item_header(rest)?;
    ensure!(
        addr_hdr.type_id.get() == ITEM_TYPE_NULL_ADDRESS,
        "expected Null Address Item, got type 0x{:04x}",
        addr_hdr.type_id.get()
    );
    let addr_len = addr_hdr.length.get() as usize;
    ensure!(rest.len() >= addr_len, "CPF address item truncated");
    let rest = &rest[addr_len..];

    let (data_hdr, rest) = read_item_header(rest)?;
    ensure!(
        data_hdr.type_id.get() == ITEM_TYPE_UNCONNECTED_DATA,
        "expected Unconnected Data Item, got type 0x{:04x}",
        data_hdr.type_id.get()
    );
    let data_len = data_hdr.length.get() as usize;
    ensure!(rest.len() >= data_len, "CPF data item truncated");

    Ok(UnconnectedPayload { cip_body: &rest[..data_len] })
}

/// Parses the CPF envelope assuming the connected (Connected Address +
/// Connected Data) item layout.
pub fn decode_connected(buf: &[u8]) -> Result<ConnectedPayload<'_>> {
    ensure!(buf.len() >= CPF_HEADER_LEN, "CPF header truncated");
    let hdr = CpfHeader::read_from_bytes(&buf[..CPF_HEADER_LEN])
        .map_err(|e| anyhow::anyhow!("failed to parse CPF header: {e}"))?;
    ensure!(hdr.item_count.get() == 2, "expected 2 CPF items, got {}", hdr.item_count.get());

    let rest = &buf[CPF_HEADER_LEN..];
    let (addr_hdr, rest) = read_item_header(rest)?;
    ensure!(
        addr_hdr.type_id.get() == ITEM_TYPE_CONNECTED_ADDRESS,
        "expected Connected Address Item, got type 0x{:04x}",
        addr_hdr.type_id.get()
    );
    let addr_len = addr_hdr.length.get() as usize;
    ensure!(addr_len == 4 && rest.len() >= 4, "CPF connected address item malformed");
    let target_connection_id = u32::from_le_bytes(rest[0..4].try_into().unwrap());
    let rest = &rest[addr_len..];

    let (data_hdr, rest) = read_item_header(rest)?;
    ensure!(
        data_hdr.type_id.get() == ITEM_TYPE_CONNECTED_DATA,
        "expected Connected Data Item, got type 0x{:04x}",
        data_hdr.type_id.get()
    );
    let data_len = data_hdr.length.get() as usize;
    ensure!(data_len >= 2 && rest.len() >= data_len, "CPF connected data item malformed");
    let connection_seq = u16::from_le_bytes(rest[0..2].try_into().unwrap());

    Ok(ConnectedPayload {
        target_connection_id,
        connection_seq,
        cip_body: &rest[2..data_len],
    })
}

/// Reads the type id of the first item without assuming a layout, so a
/// caller can pick `decode_unconnected`/`decode_connected` accordingly.
pub fn peek_first_item_type(buf: &[u8]) -> Result<u16> {
    if buf.len() < CPF_HEADER_LEN + CPF_ITEM_HEADER_LEN {
        bail!("CPF envelope too short to contain an item");
    }
    let (hdr, _) = read_item_header(&buf[CPF_HEADER_LEN..])?;
    Ok(hdr.type_id.get())
}
