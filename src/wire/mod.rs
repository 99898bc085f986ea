// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Pure, allocation-light codecs for the EIP/CIP/PCCC wire formats. Nothing
//! in this module touches a socket; it only encodes/decodes byte buffers.

/// CIP service header, service codes, general-status parsing.
pub mod cip;
/// Common Packet Format item framing.
pub mod cpf;
/// EIP encapsulation header and command codes.
pub mod encap;
/// ForwardOpen / ForwardOpenEx / ForwardClose bodies.
pub mod forward_open;
/// PCCC envelope embedded in CIP service `0x4B`.
pub mod pccc;
/// Reply dispatch enum used by the session's read path.
pub mod pdu;
/// UnconnectedSend (CIP `0x52`) embedding.
pub mod unconnected_send;
