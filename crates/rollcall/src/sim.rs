// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Simulated radio.
//!
//! Plays a scripted [`Scenario`] into the coordinator's event queue once
//! discovery begins. Used by the CLI and by tests; it also counts
//! `begin_discovery` / `cancel_discovery` calls so single-flight and
//! exactly-once teardown can be asserted.

use crate::radio::{Radio, RadioEvent, Sighting};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Scenario loading errors.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A sighting emitted at a fixed offset after discovery begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedSighting {
    /// Offset from `begin_discovery` (milliseconds).
    pub at_ms: u64,

    #[serde(flatten)]
    pub sighting: Sighting,
}

/// Scripted radio behaviour for one discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Emit `DiscoveryFinished` at this offset. `None` lets the deadline win.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_after_ms: Option<u64>,

    /// Sightings, in any order.
    #[serde(default)]
    pub sightings: Vec<ScriptedSighting>,

    /// Sightings delivered after discovery is cancelled, as real hardware
    /// sometimes does.
    #[serde(default)]
    pub trailing: Vec<Sighting>,
}

impl Scenario {
    /// Load a scenario from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Add a sighting at `at_ms`.
    pub fn sighting(mut self, at_ms: u64, sighting: Sighting) -> Self {
        self.sightings.push(ScriptedSighting { at_ms, sighting });
        self
    }

    /// Finish discovery at `at_ms`.
    pub fn finish_after(mut self, at_ms: u64) -> Self {
        self.finish_after_ms = Some(at_ms);
        self
    }

    /// Timeline of events for discovery run `run`, ordered by offset.
    /// Finish sorts after sightings sharing its offset.
    fn timeline(&self, run: u64) -> Vec<(u64, RadioEvent)> {
        let mut events: Vec<(u64, RadioEvent)> = self
            .sightings
            .iter()
            .map(|s| {
                let event = RadioEvent::DeviceSighted {
                    run,
                    sighting: s.sighting.clone(),
                };
                (s.at_ms, event)
            })
            .collect();
        if let Some(at) = self.finish_after_ms {
            events.push((at, RadioEvent::DiscoveryFinished { run }));
        }
        events.sort_by_key(|(at, ev)| (*at, matches!(ev, RadioEvent::DiscoveryFinished { .. })));
        events
    }
}

struct Playback {
    scenario: Scenario,
    events: mpsc::Sender<RadioEvent>,
}

/// In-process [`Radio`] driven by a [`Scenario`].
pub struct SimulatedRadio {
    enabled: AtomicBool,
    authorized: AtomicBool,
    accept_begin: AtomicBool,
    discovering: AtomicBool,
    run: AtomicU64,
    begin_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    playback: Option<Playback>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedRadio {
    /// A powered, authorized radio that emits nothing.
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            authorized: AtomicBool::new(true),
            accept_begin: AtomicBool::new(true),
            discovering: AtomicBool::new(false),
            run: AtomicU64::new(0),
            begin_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            playback: None,
            task: Mutex::new(None),
        }
    }

    /// A radio that plays `scenario` into `events` on every discovery run.
    pub fn with_scenario(scenario: Scenario, events: mpsc::Sender<RadioEvent>) -> Self {
        Self {
            playback: Some(Playback { scenario, events }),
            ..Self::new()
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::SeqCst);
    }

    /// Make the next `begin_discovery` calls succeed or fail.
    pub fn set_accept_begin(&self, accept: bool) {
        self.accept_begin.store(accept, Ordering::SeqCst);
    }

    pub fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::SeqCst)
    }

    /// Run id passed to the last accepted `begin_discovery`.
    pub fn current_run(&self) -> u64 {
        self.run.load(Ordering::SeqCst)
    }

    pub fn begin_calls(&self) -> usize {
        self.begin_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    fn spawn_playback(&self, playback: &Playback, run: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No Tokio runtime; simulated radio will not emit events");
            return;
        };

        let timeline = playback.scenario.timeline(run);
        let events = playback.events.clone();
        let start = tokio::time::Instant::now();

        let task = runtime.spawn(async move {
            for (at_ms, event) in timeline {
                tokio::time::sleep_until(start + Duration::from_millis(at_ms)).await;
                if events.send(event).await.is_err() {
                    debug!("Event queue closed; stopping playback");
                    break;
                }
            }
        });

        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
    }
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl Radio for SimulatedRadio {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn has_authorization(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }

    fn begin_discovery(&self, run: u64) -> bool {
        self.begin_calls.fetch_add(1, Ordering::SeqCst);
        if !self.accept_begin.load(Ordering::SeqCst) {
            return false;
        }

        self.run.store(run, Ordering::SeqCst);
        self.discovering.store(true, Ordering::SeqCst);
        if let Some(playback) = &self.playback {
            self.spawn_playback(playback, run);
        }
        true
    }

    fn cancel_discovery(&self) {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.discovering.store(false, Ordering::SeqCst);

        if let Some(task) = self.task.lock().take() {
            task.abort();
        }

        if let Some(playback) = &self.playback {
            let run = self.run.load(Ordering::SeqCst);
            for sighting in &playback.scenario.trailing {
                // Trailing events are best-effort, like the hardware they mimic.
                let _ = playback.events.try_send(RadioEvent::DeviceSighted {
                    run,
                    sighting: sighting.clone(),
                });
            }
        }
    }
}
