// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One discovery attempt.
//!
//! A session is created already `Scanning` (the radio accepted the request)
//! and moves to `Finishing` when its [`CompletionArbiter`] is claimed. The
//! state is derived from the gate, so there is exactly one source of truth
//! for "has this session completed".

use crate::arbiter::{CompletionArbiter, CompletionTrigger};
use crate::radio::{Radio, SignalStrength, Sighting};
use crate::registry::{DeviceRecord, DeviceRegistry, MergeOutcome};
use crate::stats::{SessionStats, SessionStatsSnapshot};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Errors observed while waiting for a session result.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Session {0} ended without delivering a result")]
    ResultDropped(u64),
}

/// Lifecycle state of a live session. `Idle` is the absence of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Scanning,
    Finishing,
}

/// Consolidated result of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Session number.
    pub session_id: u64,
    /// What ended the session.
    pub trigger: CompletionTrigger,
    /// Devices ordered by first sighting.
    pub devices: Vec<DeviceRecord>,
    /// Time from start to completion.
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    /// Ingestion counters.
    pub stats: SessionStatsSnapshot,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Caller's side of an accepted scan.
#[derive(Debug)]
pub struct ScanHandle {
    session_id: u64,
    rx: oneshot::Receiver<ScanReport>,
}

impl ScanHandle {
    pub(crate) fn new(session_id: u64, rx: oneshot::Receiver<ScanReport>) -> Self {
        Self { session_id, rx }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Wait for the session result.
    pub async fn wait(self) -> Result<ScanReport, ScanError> {
        self.rx
            .await
            .map_err(|_| ScanError::ResultDropped(self.session_id))
    }

    /// Block the current thread until the result arrives.
    ///
    /// Must not be called from within an async context.
    pub fn wait_blocking(self) -> Result<ScanReport, ScanError> {
        self.rx
            .blocking_recv()
            .map_err(|_| ScanError::ResultDropped(self.session_id))
    }

    /// Non-blocking poll. `Ok(None)` while the session is still running.
    pub fn try_result(&mut self) -> Result<Option<ScanReport>, ScanError> {
        match self.rx.try_recv() {
            Ok(report) => Ok(Some(report)),
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(ScanError::ResultDropped(self.session_id))
            }
        }
    }
}

/// State owned by one discovery attempt.
#[derive(Debug)]
pub struct ScanSession {
    id: u64,
    registry: DeviceRegistry,
    arbiter: CompletionArbiter,
    stats: SessionStats,
    unknown_name: String,
    started_at: Instant,
    deadline: Instant,
    result_tx: Mutex<Option<oneshot::Sender<ScanReport>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ScanSession {
    /// Create a session with an empty registry and its result channel.
    pub(crate) fn new(
        id: u64,
        window: Duration,
        unknown_name: impl Into<String>,
    ) -> (Self, ScanHandle) {
        let (tx, rx) = oneshot::channel();
        let started_at = Instant::now();
        let session = Self {
            id,
            registry: DeviceRegistry::new(),
            arbiter: CompletionArbiter::new(),
            stats: SessionStats::new(),
            unknown_name: unknown_name.into(),
            started_at,
            deadline: started_at + window,
            result_tx: Mutex::new(Some(tx)),
            timer: Mutex::new(None),
        };
        (session, ScanHandle::new(id, rx))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        if self.arbiter.is_claimed() {
            SessionState::Finishing
        } else {
            SessionState::Scanning
        }
    }

    /// Instant at which the session completes on its own.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Live view of the devices seen so far.
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.registry.snapshot()
    }

    pub fn stats(&self) -> SessionStatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn arm_timer(&self, timer: JoinHandle<()>) {
        *self.timer.lock() = Some(timer);
    }

    /// Merge one sighting. Never fails: missing fields become sentinels and
    /// sightings that cannot be keyed or arrive late are dropped.
    pub fn ingest(&self, sighting: Sighting) -> MergeOutcome {
        if sighting.identity.is_empty() {
            warn!(session = self.id, "Dropping sighting without identity");
            self.stats.record_rejected();
            return MergeOutcome::Dropped;
        }
        if self.arbiter.is_claimed() {
            debug!(
                session = self.id,
                "Late sighting of {} discarded", sighting.identity
            );
            self.stats.record(MergeOutcome::Dropped);
            return MergeOutcome::Dropped;
        }

        let name = sighting
            .display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(self.unknown_name.as_str());
        let strength = SignalStrength::from(sighting.signal_strength);

        let outcome = self.registry.merge(&sighting.identity, name, strength);
        self.stats.record(outcome);

        match outcome {
            MergeOutcome::Inserted => debug!(
                session = self.id,
                "New device {} ({}, {})", sighting.identity, name, strength
            ),
            MergeOutcome::Updated => debug!(
                session = self.id,
                "Updated device {} ({}, {})", sighting.identity, name, strength
            ),
            MergeOutcome::Dropped => debug!(
                session = self.id,
                "Late sighting of {} discarded", sighting.identity
            ),
        }
        outcome
    }

    /// Claim the completion gate and run teardown.
    ///
    /// Returns the report for the winning trigger only. The caller must
    /// release the session slot and then call [`ScanSession::deliver`].
    pub(crate) fn complete(
        &self,
        trigger: CompletionTrigger,
        radio: &dyn Radio,
    ) -> Option<ScanReport> {
        if !self.arbiter.try_claim(trigger) {
            debug!(
                session = self.id,
                "Completion by {} ignored; already completed by {:?}",
                trigger,
                self.arbiter.winner()
            );
            return None;
        }

        radio.cancel_discovery();
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
        let devices = self.registry.seal();

        Some(ScanReport {
            session_id: self.id,
            trigger,
            devices,
            elapsed: self.started_at.elapsed(),
            stats: self.stats.snapshot(),
        })
    }

    /// Fulfill the result sink. Only the first call has an effect.
    pub(crate) fn deliver(&self, report: ScanReport) {
        let Some(tx) = self.result_tx.lock().take() else {
            return;
        };
        if tx.send(report).is_err() {
            debug!(session = self.id, "Result receiver dropped before delivery");
        }
    }
}
