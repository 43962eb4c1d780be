// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-session device registry.
//!
//! Records are kept in first-seen order in a `Vec`, with a side index from
//! identity to position, so merges are O(1) amortized and snapshots need no
//! sort.

use crate::radio::SignalStrength;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One observed peer within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Dedup key (hardware address).
    pub identity: String,
    /// Latest reported name, or the configured unknown-name label.
    pub display_name: String,
    /// Latest reported strength.
    pub signal_strength: SignalStrength,
    /// Sequence number assigned at first sighting.
    pub first_seen_order: u64,
}

/// What a merge did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First sighting of this identity.
    Inserted,
    /// Existing record overwritten in place.
    Updated,
    /// Registry already sealed; sighting discarded.
    Dropped,
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<DeviceRecord>,
    index: HashMap<String, usize>,
    sealed: bool,
}

/// Thread-safe registry of the devices seen during one session.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    inner: Mutex<Inner>,
}

impl DeviceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a sighting. Latest name and strength win; first-seen order is
    /// fixed by the first sighting.
    pub fn merge(
        &self,
        identity: &str,
        display_name: &str,
        signal_strength: SignalStrength,
    ) -> MergeOutcome {
        let mut inner = self.inner.lock();
        if inner.sealed {
            return MergeOutcome::Dropped;
        }

        if let Some(&pos) = inner.index.get(identity) {
            let record = &mut inner.records[pos];
            record.display_name.clear();
            record.display_name.push_str(display_name);
            record.signal_strength = signal_strength;
            return MergeOutcome::Updated;
        }

        let pos = inner.records.len();
        inner.records.push(DeviceRecord {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            signal_strength,
            first_seen_order: pos as u64,
        });
        inner.index.insert(identity.to_string(), pos);
        MergeOutcome::Inserted
    }

    /// Point-in-time copy, ordered by first-seen sequence.
    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        self.inner.lock().records.clone()
    }

    /// Take the final snapshot and refuse all later merges.
    ///
    /// Sealing and snapshotting happen under one lock, so no merge can land
    /// between them.
    pub fn seal(&self) -> Vec<DeviceRecord> {
        let mut inner = self.inner.lock();
        inner.sealed = true;
        inner.records.clone()
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.lock().sealed
    }

    /// Number of distinct identities.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
