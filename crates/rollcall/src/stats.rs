// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session statistics.

use crate::registry::MergeOutcome;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated from the event ingestion path.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Sightings received while the session existed.
    pub sightings: AtomicU64,

    /// Sightings that created a new record.
    pub unique_devices: AtomicU64,

    /// Sightings that overwrote an existing record.
    pub duplicates: AtomicU64,

    /// Sightings discarded (late, or missing an identity).
    pub dropped: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one merge.
    pub fn record(&self, outcome: MergeOutcome) {
        self.sightings.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            MergeOutcome::Inserted => &self.unique_devices,
            MergeOutcome::Updated => &self.duplicates,
            MergeOutcome::Dropped => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a sighting rejected before reaching the registry.
    pub fn record_rejected(&self) {
        self.sightings.fetch_add(1, Ordering::Relaxed);
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            sightings: self.sightings.load(Ordering::Relaxed),
            unique_devices: self.unique_devices.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of session statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatsSnapshot {
    pub sightings: u64,
    pub unique_devices: u64,
    pub duplicates: u64,
    pub dropped: u64,
}
