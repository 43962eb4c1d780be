// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Radio subsystem boundary.
//!
//! The coordinator only needs four synchronous capabilities from the radio
//! and receives two kinds of events from it. Anything technology-specific
//! (adapter enumeration, driver bring-up) lives behind [`Radio`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Capabilities consumed from the radio subsystem.
///
/// Implementations are called from the caller's thread (`start`, `cancel`)
/// and from whichever context wins the completion race, so they must be
/// cheap and non-blocking.
pub trait Radio: Send + Sync {
    /// Whether the radio is powered on.
    fn is_enabled(&self) -> bool;

    /// Whether the process holds the capability to run discovery.
    fn has_authorization(&self) -> bool;

    /// Ask the radio to begin discovery run `run`. `false` means it refused.
    ///
    /// Every event produced by this run must carry `run`, including events
    /// emitted after `cancel_discovery`. Events may be delivered from any
    /// context, including from inside this call.
    fn begin_discovery(&self, run: u64) -> bool;

    /// Stop discovery. Best-effort; must tolerate an already-stopped radio.
    fn cancel_discovery(&self);
}

/// Received signal strength of a sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    /// RSSI in dBm.
    Dbm(i16),
    /// The radio did not report a strength.
    Unknown,
}

impl SignalStrength {
    pub fn is_known(self) -> bool {
        matches!(self, Self::Dbm(_))
    }
}

impl From<Option<i16>> for SignalStrength {
    fn from(value: Option<i16>) -> Self {
        value.map_or(Self::Unknown, Self::Dbm)
    }
}

impl fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dbm(v) => write!(f, "{} dBm", v),
            Self::Unknown => f.write_str("unknown strength"),
        }
    }
}

/// One raw observation of a peer, as reported by the radio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sighting {
    /// Hardware address or equivalent stable id.
    pub identity: String,
    /// Advertised name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// RSSI in dBm, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<i16>,
}

impl Sighting {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            display_name: None,
            signal_strength: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn rssi(mut self, dbm: i16) -> Self {
        self.signal_strength = Some(dbm);
        self
    }
}

/// Events produced by the radio subsystem, tagged with the discovery run
/// that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    DeviceSighted { run: u64, sighting: Sighting },
    DiscoveryFinished { run: u64 },
}

impl RadioEvent {
    pub fn run(&self) -> u64 {
        match self {
            Self::DeviceSighted { run, .. } | Self::DiscoveryFinished { run } => *run,
        }
    }
}
