// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::enums::{AutoBool, PlcKind};

/// Sentinel stored in `AutoDisconnectMs` meaning "never auto-disconnect".
pub const AUTO_DISCONNECT_NEVER: u64 = u64::MAX;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Attributes consumed at Session creation (gateway, path, PLC kind).
    pub attributes: Attributes,
    /// Implementation/runtime parameters that live outside the CIP protocol.
    pub runtime: RuntimeConfig,
}

/// Attributes consumed at Session creation.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Attributes {
    #[serde(rename = "Gateway")]
    /// `host[:port]` of the target EtherNet/IP device. Required.
    pub gateway: String,

    #[serde(default, rename = "Path")]
    /// CIP routing path to the target module, e.g. `"1,0"`.
    pub path: String,

    #[serde(default, rename = "ConnectionGroupId")]
    /// Connections sharing a group id may share one underlying Session.
    pub connection_group_id: u32,

    #[serde(default = "default_auto", rename = "UseConnectedMsg")]
    /// Whether to negotiate a ForwardOpen connection. `Auto` derives the
    /// choice from `cpu` and whether `path` is set.
    pub use_connected_msg: AutoBool,

    #[serde(default = "default_true", rename = "ShareSession")]
    /// Whether a new Session may attach to an existing one with matching
    /// `(gateway, path, connection_group_id)`.
    pub share_session: bool,

    #[serde(default = "default_never", rename = "AutoDisconnectMs")]
    /// Idle time in milliseconds before a Session with no pending requests
    /// tears itself down. `AUTO_DISCONNECT_NEVER` disables it.
    pub auto_disconnect_ms: u64,

    #[serde(rename = "Cpu")]
    /// PLC family targeted (drives PCCC vs. native CIP and ForwardOpen
    /// defaults).
    pub cpu: PlcKind,
}

fn default_auto() -> AutoBool {
    AutoBool::Auto
}

fn default_true() -> bool {
    true
}

fn default_never() -> u64 {
    AUTO_DISCONNECT_NEVER
}

impl Attributes {
    /// Resolves `UseConnectedMsg`, falling back to the PLC kind's default
    /// when set to `Auto`.
    pub fn resolve_use_connected_msg(&self) -> bool {
        self.use_connected_msg.resolve(self.cpu.default_use_connected_msg())
    }

    /// `None` if auto-disconnect is disabled.
    pub fn auto_disconnect(&self) -> Option<Duration> {
        if self.auto_disconnect_ms == AUTO_DISCONNECT_NEVER {
            None
        } else {
            Some(Duration::from_millis(self.auto_disconnect_ms))
        }
    }

    /// Splits `Gateway` into `(host, port)`, applying the default EIP port
    /// when no port is given.
    pub fn host_port(&self) -> Result<(String, u16)> {
        match self.gateway.rsplit_once(':') {
            Some((host, port)) => {
                let port: u16 = port
                    .parse()
                    .with_context(|| format!("invalid port in gateway {:?}", self.gateway))?;
                Ok((host.to_string(), port))
            },
            None => Ok((self.gateway.clone(), 44818)),
        }
    }
}

/// Runtime-only settings that do not map to CIP wire fields.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RuntimeConfig {
    #[serde(rename = "MaxSessions")]
    /// External limit on the number of simultaneously tracked sessions.
    pub max_sessions: u32,

    #[serde(rename = "TimeoutConnectMs", with = "serde_millis")]
    /// Budget for the TCP connect + RegisterSession sequence.
    pub timeout_connect: Duration,

    #[serde(rename = "TimeoutRequestMs", with = "serde_millis")]
    /// Per-request send/receive budget.
    pub timeout_request: Duration,

    #[serde(rename = "TimeoutForwardCloseMs", with = "serde_millis")]
    /// Budget for the ForwardClose exchange during teardown.
    pub timeout_forward_close: Duration,

    #[serde(rename = "PollSliceMs", with = "serde_millis")]
    /// Bounded wait slice used by the non-blocking socket poll loop.
    pub poll_slice: Duration,

    #[serde(rename = "RetryWaitMs", with = "serde_millis")]
    /// Base delay before retrying a failed connect/register attempt.
    pub retry_wait: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_sessions: 64,
            timeout_connect: Duration::from_secs(5),
            timeout_request: Duration::from_secs(5),
            timeout_forward_close: Duration::from_millis(150),
            poll_slice: Duration::from_millis(20),
            retry_wait: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants that cannot be expressed through serde alone.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.attributes.gateway.is_empty(), "Gateway must not be empty");
        self.attributes.host_port()?;
        ensure!(self.runtime.max_sessions >= 1, "MaxSessions must be >= 1");
        ensure!(
            !self.attributes.resolve_use_connected_msg() || !self.attributes.path.is_empty()
                || self.attributes.cpu.is_pccc(),
            "UseConnectedMsg=Yes requires a non-empty Path for this PLC kind"
        );
        Ok(())
    }
}

/// Serde helpers for representing `Duration` as a number of milliseconds.
mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}
