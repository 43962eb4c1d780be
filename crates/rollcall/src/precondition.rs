// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Readiness checks run before every scan attempt.

use crate::radio::Radio;
use std::fmt;

/// Why a scan cannot start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadyReason {
    RadioDisabled,
    MissingAuthorization,
}

impl fmt::Display for UnreadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RadioDisabled => f.write_str("radio is disabled"),
            Self::MissingAuthorization => f.write_str("discovery authorization missing"),
        }
    }
}

/// Result of [`check_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Unready(UnreadyReason),
}

/// Query the radio for power and authorization state.
///
/// Pure query, safe to call at any time. Power is checked first, so a
/// disabled radio without authorization reports `RadioDisabled`.
pub fn check_ready(radio: &dyn Radio) -> Readiness {
    if !radio.is_enabled() {
        return Readiness::Unready(UnreadyReason::RadioDisabled);
    }
    if !radio.has_authorization() {
        return Readiness::Unready(UnreadyReason::MissingAuthorization);
    }
    Readiness::Ready
}
