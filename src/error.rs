// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Typed error kinds surfaced by the session subsystem (spec §7).
//!
//! The tag layer (out of scope here) maps these onto its own public
//! taxonomy. Internally, most functions still return `anyhow::Result<T>` so
//! call sites can attach `.context(...)`; `EipError` is the thing that ends
//! up at the bottom of that chain whenever the failure is one this crate
//! understands structurally rather than a generic I/O error.

use thiserror::Error;

/// Error kinds from spec §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EipError {
    #[error("operation is still pending")]
    Pending,
    #[error("request was aborted")]
    Aborted,
    #[error("operation timed out")]
    Timeout,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("connection lost")]
    ConnectionLost,
    #[error("remote error: CIP general status 0x{0:02x}")]
    RemoteError(u8),
    #[error("service not supported by remote device")]
    UnsupportedService,
    #[error("duplicate connection")]
    DuplicateConnection,
    #[error("payload too large, remote device supports {0} bytes")]
    PayloadTooLarge(u16),
    #[error("partial transfer in progress")]
    PartialTransfer,
    #[error("malformed packet")]
    BadFormat,
    #[error("out of memory")]
    OutOfMemory,
    #[error("not found")]
    NotFound,
}

/// CIP general status codes (CIP Vol 1, Appendix B) relevant to this core,
/// translated to [`EipError`]. Unknown codes fall back to
/// `RemoteError(code)` so no status is ever silently dropped.
#[inline]
pub fn cip_general_status_to_error(status: u8) -> Option<EipError> {
    match status {
        0x00 => None,
        0x01 => Some(EipError::ConnectionLost),
        0x05 => Some(EipError::NotFound),
        0x06 => Some(EipError::PartialTransfer),
        0x08 => Some(EipError::UnsupportedService),
        0x0D => Some(EipError::NotFound),
        0x13 => Some(EipError::BadFormat),
        0x1E => Some(EipError::RemoteError(status)),
        0x20 => Some(EipError::BadFormat),
        other => Some(EipError::RemoteError(other)),
    }
}

/// ForwardOpen extended status codes (CIP Vol 1, § 3-5.5.3) that this core
/// interprets structurally instead of surfacing as an opaque `RemoteError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOpenExtendedStatus {
    /// `0x0100` — a connection with the same parameters already exists.
    DuplicateConnection,
    /// `0x0109` — invalid connection size; the trailing word carries the
    /// largest size the target will accept.
    InvalidConnectionSize { supported_size: u16 },
    /// Anything else: surfaced as `RemoteError(general_status)`.
    Other,
}

impl ForwardOpenExtendedStatus {
    pub fn decode(extended_status: u16, trailing_word: Option<u16>) -> Self {
        match extended_status {
            0x0100 => Self::DuplicateConnection,
            0x0109 => Self::InvalidConnectionSize {
                supported_size: trailing_word.unwrap_or(508),
            },
            _ => Self::Other,
        }
    }
}

/// PCCC status codes (Allen-Bradley PCCC command reference) relevant to the
/// typed read/write commands this core builds.
#[inline]
pub fn pccc_status_to_error(status: u8) -> Option<EipError> {
    match status {
        0x00 => None,
        0x10 => Some(EipError::BadFormat),
        0x20 => Some(EipError::OutOfMemory),
        0x30 => Some(EipError::NotFound),
        0xF0 => Some(EipError::BadFormat),
        other => Some(EipError::RemoteError(other)),
    }
}
