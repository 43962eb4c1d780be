// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session coordinator.
//!
//! The coordinator is the single entry point for callers and for the radio.
//! It owns at most one [`ScanSession`] in an explicit slot; a new `start` is
//! rejected while the slot is occupied. Radio events, the deadline timer and
//! caller cancellation all finish a session through the same completion gate.
//!
//! Each discovery run is tagged with its session id. Radio events carry that
//! tag, and events from any run other than the one in the slot are dropped.

use crate::arbiter::CompletionTrigger;
use crate::config::ScanConfig;
use crate::precondition::{check_ready, Readiness, UnreadyReason};
use crate::radio::{Radio, RadioEvent, Sighting};
use crate::registry::DeviceRecord;
use crate::session::{ScanHandle, ScanSession};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reasons a scan start is rejected. A rejected start changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("A scan is already in progress")]
    AlreadyScanning,

    #[error("Radio is disabled")]
    RadioDisabled,

    #[error("Discovery authorization missing")]
    MissingAuthorization,

    #[error("Radio refused to start discovery")]
    ScanFailed,
}

impl StartError {
    /// Stable code for presentation layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyScanning => "BUSY",
            Self::RadioDisabled => "NO_RADIO",
            Self::MissingAuthorization => "NO_PERMISSION",
            Self::ScanFailed => "SCAN_FAILED",
        }
    }
}

impl From<UnreadyReason> for StartError {
    fn from(reason: UnreadyReason) -> Self {
        match reason {
            UnreadyReason::RadioDisabled => Self::RadioDisabled,
            UnreadyReason::MissingAuthorization => Self::MissingAuthorization,
        }
    }
}

/// Create the bounded queue that carries radio events to the coordinator.
pub fn radio_event_queue(
    config: &ScanConfig,
) -> (mpsc::Sender<RadioEvent>, mpsc::Receiver<RadioEvent>) {
    mpsc::channel(config.event_queue_capacity)
}

/// Occupancy of the single session slot.
enum Slot {
    Idle,
    /// Reserved by a `start` that is still talking to the radio.
    Starting(Arc<ScanSession>),
    Active(Arc<ScanSession>),
}

impl Slot {
    fn session(&self) -> Option<&Arc<ScanSession>> {
        match self {
            Slot::Idle => None,
            Slot::Starting(session) | Slot::Active(session) => Some(session),
        }
    }

    fn holds(&self, id: u64) -> bool {
        self.session().is_some_and(|s| s.id() == id)
    }
}

struct Shared {
    radio: Arc<dyn Radio>,
    config: ScanConfig,
    slot: Mutex<Slot>,
    next_id: AtomicU64,
}

impl Shared {
    /// Session that radio events tagged `run` belong to.
    fn session_for_run(&self, run: u64) -> Option<Arc<ScanSession>> {
        self.slot
            .lock()
            .session()
            .filter(|s| s.id() == run)
            .cloned()
    }

    fn release(&self, id: u64) {
        let mut slot = self.slot.lock();
        if slot.holds(id) {
            *slot = Slot::Idle;
        }
    }

    /// Run `trigger` through the session's gate. Only the winner releases
    /// the slot and delivers the result.
    fn finish(&self, session: &Arc<ScanSession>, trigger: CompletionTrigger) -> bool {
        let Some(report) = session.complete(trigger, self.radio.as_ref()) else {
            return false;
        };
        self.release(session.id());

        info!(
            "Scan session {} finished by {}: {} devices, {} sightings in {:?}",
            report.session_id,
            trigger,
            report.devices.len(),
            report.stats.sightings,
            report.elapsed
        );
        session.deliver(report);
        true
    }
}

/// Process-wide discovery coordinator (single-flight).
///
/// Cheap to clone; clones share the same session slot.
#[derive(Clone)]
pub struct SessionCoordinator {
    shared: Arc<Shared>,
}

impl SessionCoordinator {
    /// Create a coordinator over `radio`.
    pub fn new(radio: Arc<dyn Radio>, config: ScanConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                radio,
                config,
                slot: Mutex::new(Slot::Idle),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.shared.config
    }

    /// Start a discovery session.
    ///
    /// Does not wait for completion: the result arrives through the returned
    /// handle. Must be called from within a Tokio runtime, which drives the
    /// deadline timer.
    ///
    /// The slot is reserved before the radio is queried and no lock is held
    /// across radio calls. A `cancel` issued before `start` returns is a
    /// no-op; events tagged with the new run are accepted right away.
    pub fn start(&self) -> Result<ScanHandle, StartError> {
        let shared = &self.shared;
        let (session, handle) = {
            let mut slot = shared.slot.lock();
            if let Some(active) = slot.session() {
                warn!(
                    "Scan rejected: session {} is {:?}",
                    active.id(),
                    active.state()
                );
                return Err(StartError::AlreadyScanning);
            }

            let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
            let (session, handle) = ScanSession::new(
                id,
                shared.config.scan_timeout(),
                shared.config.unknown_name.clone(),
            );
            let session = Arc::new(session);
            *slot = Slot::Starting(Arc::clone(&session));
            (session, handle)
        };
        let id = session.id();

        if let Readiness::Unready(reason) = check_ready(shared.radio.as_ref()) {
            warn!("Scan rejected: {}", reason);
            shared.release(id);
            return Err(reason.into());
        }

        if !shared.radio.begin_discovery(id) {
            warn!("Scan rejected: radio refused to begin discovery");
            shared.release(id);
            return Err(StartError::ScanFailed);
        }

        let timer = tokio::spawn(deadline_timer(
            Arc::downgrade(shared),
            Arc::downgrade(&session),
        ));
        session.arm_timer(timer);

        {
            let mut slot = shared.slot.lock();
            // The radio may already have finished this run.
            if slot.holds(id) {
                *slot = Slot::Active(Arc::clone(&session));
            }
        }

        info!(
            "Scan session {} started ({:?} window)",
            id,
            shared.config.scan_timeout()
        );
        Ok(handle)
    }

    /// Forward a sighting from discovery run `run`. Dropped unless `run` is
    /// the session currently in the slot.
    pub fn on_device_sighted(&self, run: u64, sighting: Sighting) {
        match self.shared.session_for_run(run) {
            Some(session) => {
                session.ingest(sighting);
            }
            None => debug!(
                "Sighting of {} from run {} with no matching session",
                sighting.identity, run
            ),
        }
    }

    /// Forward the radio's discovery-finished signal for run `run`. Stale
    /// runs are ignored.
    pub fn on_discovery_finished(&self, run: u64) {
        match self.shared.session_for_run(run) {
            Some(session) => {
                self.shared
                    .finish(&session, CompletionTrigger::DiscoveryFinished);
            }
            None => debug!("Discovery finished for run {} with no matching session", run),
        }
    }

    /// Abort the active session, delivering whatever was collected so far.
    /// Idempotent; does nothing without an active session.
    pub fn cancel(&self) {
        let active = match &*self.shared.slot.lock() {
            Slot::Active(session) => Some(Arc::clone(session)),
            _ => None,
        };
        if let Some(session) = active {
            self.shared.finish(&session, CompletionTrigger::Cancelled);
        }
    }

    /// Route one radio event.
    pub fn dispatch(&self, event: RadioEvent) {
        match event {
            RadioEvent::DeviceSighted { run, sighting } => self.on_device_sighted(run, sighting),
            RadioEvent::DiscoveryFinished { run } => self.on_discovery_finished(run),
        }
    }

    /// Drain `events` into the coordinator until every sender is dropped.
    pub fn spawn_event_pump(&self, mut events: mpsc::Receiver<RadioEvent>) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                coordinator.dispatch(event);
            }
            debug!("Radio event queue closed");
        })
    }

    /// Whether a session currently occupies the slot.
    pub fn is_scanning(&self) -> bool {
        self.shared.slot.lock().session().is_some()
    }

    pub fn active_session_id(&self) -> Option<u64> {
        self.shared.slot.lock().session().map(|s| s.id())
    }

    /// Devices collected so far by the active session (empty when idle).
    pub fn live_devices(&self) -> Vec<DeviceRecord> {
        let session = self.shared.slot.lock().session().cloned();
        session.map(|s| s.devices()).unwrap_or_default()
    }
}

async fn deadline_timer(shared: Weak<Shared>, session: Weak<ScanSession>) {
    let Some(deadline) = session.upgrade().map(|s| s.deadline()) else {
        return;
    };
    tokio::time::sleep_until(deadline).await;

    if let (Some(shared), Some(session)) = (shared.upgrade(), session.upgrade()) {
        shared.finish(&session, CompletionTrigger::Deadline);
    }
}
