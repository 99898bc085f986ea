// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-protocol request builders and response parsers (spec §4.4).
//!
//! These sit one layer above `wire::*`: they know how a read, a write, a
//! tag-list page, or a UDT metadata fetch is actually laid out for a given
//! PLC family, but still touch no socket — callers get back a complete CIP
//! service request (service byte onward) ready to become a
//! [`crate::request::Request`] body, or a parsed view over a completed
//! request's reply bytes.
//!
//! The tag-name parser that turns `Program:Main.MyArr[3]` or `N7:10` into
//! the `path`/`address` byte slices these functions take is out of scope
//! (spec §1) — everything here is a pure function over already-encoded
//! addresses.

/// Logix-class CIP read/write/read-modify-write builders and parsers.
pub mod cip;
/// PCCC typed read/write builders wrapped in `ExecutePCCC`, for PLC-5/SLC/
/// MicroLogix targets.
pub mod pccc;
/// The tagged variant that replaces the teacher's per-tag vtable (spec §9),
/// dispatching a read/write to the `cip` or `pccc` builder for its kind.
pub mod plc_kind;
/// `CipListTags` request/response handling for `@tags` and
/// `PROGRAM:x.@tags`.
pub mod tag_list;
/// UDT template metadata (`GetAttributeList` on class `0x6C`) and the
/// chunked template-body read that follows it.
pub mod udt;
