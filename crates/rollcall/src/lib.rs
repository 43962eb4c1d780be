// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rollcall: time-bounded radio discovery sessions.
//!
//! Runs one discovery scan at a time against a radio subsystem, merges the
//! sightings it reports (latest signal reading wins, first-seen order is
//! kept) and delivers one consolidated device list per scan, exactly once,
//! when the radio finishes, the scan window elapses, or the caller cancels.
//!
//! # Features
//!
//! - **Single-flight**: a start while a scan is running is rejected
//! - **Dedup**: one record per device identity, freshest reading kept
//! - **Exactly-once results**: finish, deadline and cancel race through one gate
//! - **Radio-agnostic**: anything implementing [`Radio`] can drive a scan
//!
//! # Quick Start
//!
//! ```bash
//! # Run a scan against a scripted radio
//! rollcall scan --scenario classroom.toml
//!
//! # Generate example files
//! rollcall gen-config --output rollcall.toml
//! rollcall gen-scenario --output classroom.toml
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! scan_timeout_ms = 10000
//! unknown_name = "unknown device"
//! event_queue_capacity = 256
//! log_level = "info"
//! ```

pub mod arbiter;
pub mod config;
pub mod coordinator;
pub mod precondition;
pub mod radio;
pub mod registry;
pub mod session;
pub mod sim;
pub mod stats;

pub use arbiter::{CompletionArbiter, CompletionTrigger};
pub use config::{ConfigError, ScanConfig};
pub use coordinator::{radio_event_queue, SessionCoordinator, StartError};
pub use precondition::{check_ready, Readiness, UnreadyReason};
pub use radio::{Radio, RadioEvent, SignalStrength, Sighting};
pub use registry::{DeviceRecord, DeviceRegistry, MergeOutcome};
pub use session::{ScanError, ScanHandle, ScanReport, ScanSession, SessionState};
pub use sim::{Scenario, ScenarioError, ScriptedSighting, SimulatedRadio};
pub use stats::{SessionStats, SessionStatsSnapshot};
