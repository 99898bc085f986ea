// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

/// PLC family targeted by a session (spec §6, "cpu"/PLC-type attribute).
///
/// The session state machine only cares about two derived facts: whether
/// messaging is connected (`use_connected_msg`) and the default payload
/// guess to use for ForwardOpen negotiation. Everything protocol-specific
/// about how a tag read/write is *built* lives in
/// [`crate::builders::plc_kind::PlcKind`], which mirrors this enum.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlcKind {
    #[serde(rename = "PLC5", alias = "plc5")]
    Plc5,
    #[serde(rename = "SLC", alias = "slc")]
    Slc,
    #[serde(rename = "MLGX", alias = "mlgx", alias = "MicroLogix")]
    MicroLogix,
    #[serde(rename = "LGX", alias = "lgx", alias = "Logix")]
    Logix,
    #[serde(rename = "LGX-PCCC", alias = "lgx-pccc")]
    LogixPccc,
    #[serde(rename = "Micro800", alias = "micro800")]
    Micro800,
    #[serde(rename = "Omron-NJ", alias = "omron-nj", alias = "OmronNJ")]
    OmronNj,
}

impl fmt::Display for PlcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlcKind::Plc5 => "PLC5",
            PlcKind::Slc => "SLC",
            PlcKind::MicroLogix => "MLGX",
            PlcKind::Logix => "LGX",
            PlcKind::LogixPccc => "LGX-PCCC",
            PlcKind::Micro800 => "Micro800",
            PlcKind::OmronNj => "Omron-NJ",
        })
    }
}

impl PlcKind {
    /// Whether PCCC envelopes (service `0x4B`) are used instead of native
    /// CIP read/write services.
    pub fn is_pccc(self) -> bool {
        matches!(self, PlcKind::Plc5 | PlcKind::Slc | PlcKind::MicroLogix)
    }

    /// Default `use_connected_msg` policy when the attribute is not given
    /// explicitly (spec §6).
    pub fn default_use_connected_msg(self) -> bool {
        !matches!(self, PlcKind::Micro800)
    }

    /// Default ForwardOpen payload guess in bytes (spec §4.2 step 4).
    pub fn default_payload_guess(self, only_use_old_forward_open: bool) -> u16 {
        match self {
            PlcKind::Logix if !only_use_old_forward_open => 4002,
            PlcKind::Logix => 508,
            PlcKind::Plc5 | PlcKind::Slc | PlcKind::MicroLogix | PlcKind::LogixPccc => {
                244
            },
            PlcKind::OmronNj => 508,
            PlcKind::Micro800 => 508,
        }
    }
}

/// Boolean enumeration with string serialization support, used by
/// `Attributes` fields that accept `Yes`/`No`/`Auto`.
///
/// `Auto` means "derive from `PlcKind`"; see [`PlcKind::default_use_connected_msg`].
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoBool {
    #[serde(rename = "Yes", alias = "yes", alias = "true", alias = "1")]
    Yes,
    #[serde(rename = "No", alias = "no", alias = "false", alias = "0")]
    No,
    #[serde(rename = "Auto", alias = "auto")]
    Auto,
}

impl AutoBool {
    pub fn resolve(self, default: bool) -> bool {
        match self {
            AutoBool::Yes => true,
            AutoBool::No => false,
            AutoBool::Auto => default,
        }
    }
}

impl fmt::Display for AutoBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AutoBool::Yes => "Yes",
            AutoBool::No => "No",
            AutoBool::Auto => "Auto",
        })
    }
}
