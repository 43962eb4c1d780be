// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrency tests for discovery sessions.
//!
//! Events are delivered from blocking threads on a multi-threaded runtime so
//! completion triggers and merges genuinely race.

use rollcall::{
    radio_event_queue, CompletionTrigger, RadioEvent, ScanConfig, Scenario, SessionCoordinator,
    Sighting, SignalStrength, SimulatedRadio, StartError,
};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::time::Duration;

fn coordinator(timeout_ms: u64) -> (Arc<SimulatedRadio>, SessionCoordinator) {
    let radio = Arc::new(SimulatedRadio::new());
    let config = ScanConfig {
        scan_timeout_ms: timeout_ms,
        ..Default::default()
    };
    let coordinator = SessionCoordinator::new(radio.clone(), config);
    (radio, coordinator)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_triggers_complete_exactly_once() {
    let (radio, coordinator) = coordinator(2);
    let rounds = 200;

    for round in 0..rounds {
        let handle = coordinator.start().expect("start");
        let run = handle.session_id();
        let barrier = Arc::new(Barrier::new(2));

        let finisher = {
            let c = coordinator.clone();
            let b = Arc::clone(&barrier);
            tokio::task::spawn_blocking(move || {
                b.wait();
                c.on_discovery_finished(run);
            })
        };
        let canceller = {
            let c = coordinator.clone();
            let b = Arc::clone(&barrier);
            tokio::task::spawn_blocking(move || {
                b.wait();
                c.cancel();
            })
        };

        let report = handle.wait().await.expect("report");
        finisher.await.expect("finisher");
        canceller.await.expect("canceller");

        assert!(matches!(
            report.trigger,
            CompletionTrigger::DiscoveryFinished
                | CompletionTrigger::Cancelled
                | CompletionTrigger::Deadline
        ));
        assert_eq!(radio.cancel_calls(), round + 1);
        assert!(!coordinator.is_scanning());
    }

    assert_eq!(radio.begin_calls(), rounds);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_sightings_lose_no_updates() {
    let (radio, coordinator) = coordinator(60_000);
    let handle = coordinator.start().expect("start");
    let run = handle.session_id();

    let threads = 8;
    let per_thread = 500;
    let identities = 50;

    let workers: Vec<_> = (0..threads)
        .map(|t| {
            let c = coordinator.clone();
            tokio::task::spawn_blocking(move || {
                for i in 0..per_thread {
                    let rssi = -((t * 10 + i % 10) as i16);
                    c.on_device_sighted(
                        run,
                        Sighting::new(format!("dev-{:02}", i % identities)).rssi(rssi),
                    );
                }
            })
        })
        .collect();
    for w in workers {
        w.await.expect("worker");
    }

    coordinator.on_discovery_finished(run);
    let report = handle.wait().await.expect("report");

    assert_eq!(report.devices.len(), identities);
    assert_eq!(report.stats.sightings, (threads * per_thread) as u64);
    assert_eq!(report.stats.unique_devices, identities as u64);
    assert_eq!(
        report.stats.duplicates,
        (threads * per_thread - identities) as u64
    );
    assert_eq!(report.stats.dropped, 0);

    let orders: Vec<u64> = report.devices.iter().map(|d| d.first_seen_order).collect();
    assert_eq!(orders, (0..identities as u64).collect::<Vec<_>>());
    assert!(report
        .devices
        .iter()
        .all(|d| d.signal_strength.is_known()));
    assert_eq!(radio.cancel_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sightings_racing_cancel_stay_consistent() {
    let (radio, coordinator) = coordinator(60_000);

    for _ in 0..50 {
        let handle = coordinator.start().expect("start");
        let run = handle.session_id();
        let barrier = Arc::new(Barrier::new(4));

        let senders: Vec<_> = (0..3)
            .map(|t| {
                let c = coordinator.clone();
                let b = Arc::clone(&barrier);
                tokio::task::spawn_blocking(move || {
                    b.wait();
                    for i in 0..200 {
                        let sighting = Sighting::new(format!("t{}-{}", t, i % 20)).rssi(-60);
                        c.on_device_sighted(run, sighting);
                    }
                })
            })
            .collect();

        let canceller = {
            let c = coordinator.clone();
            let b = Arc::clone(&barrier);
            tokio::task::spawn_blocking(move || {
                b.wait();
                c.cancel();
            })
        };

        let report = handle.wait().await.expect("report");
        for s in senders {
            s.await.expect("sender");
        }
        canceller.await.expect("canceller");

        let unique: HashSet<&str> = report.devices.iter().map(|d| d.identity.as_str()).collect();
        assert_eq!(unique.len(), report.devices.len());
        assert!(report
            .devices
            .windows(2)
            .all(|w| w[0].first_seen_order < w[1].first_seen_order));
    }

    assert_eq!(radio.cancel_calls(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_rejected_from_other_threads_while_scanning() {
    let (radio, coordinator) = coordinator(60_000);
    let handle = coordinator.start().expect("start");

    let attempts: Vec<_> = (0..4)
        .map(|_| {
            let c = coordinator.clone();
            tokio::spawn(async move { c.start().map(|h| h.session_id()) })
        })
        .collect();
    for a in attempts {
        assert_eq!(a.await.expect("task"), Err(StartError::AlreadyScanning));
    }
    assert_eq!(radio.begin_calls(), 1);

    coordinator.cancel();
    handle.wait().await.expect("report");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_caller_receives_result() {
    let (_radio, coordinator) = coordinator(60_000);
    let handle = coordinator.start().expect("start");
    let run = handle.session_id();
    coordinator.on_device_sighted(run, Sighting::new("A").named("phone").rssi(-40));

    let waiter = tokio::task::spawn_blocking(move || handle.wait_blocking());
    tokio::time::sleep(Duration::from_millis(20)).await;
    coordinator.on_discovery_finished(run);

    let report = waiter.await.expect("waiter").expect("report");
    assert_eq!(report.devices.len(), 1);
    assert_eq!(report.devices[0].display_name, "phone");
}

#[tokio::test(start_paused = true)]
async fn test_scenario_with_trailing_events() {
    let config = ScanConfig::default();
    let (tx, rx) = radio_event_queue(&config);
    let mut scenario = Scenario::default()
        .sighting(100, Sighting::new("A").named("phone").rssi(-40))
        .sighting(200, Sighting::new("B"))
        .sighting(300, Sighting::new("A").rssi(-55))
        .finish_after(1_000);
    scenario.trailing.push(Sighting::new("C").rssi(-30));

    let radio = Arc::new(SimulatedRadio::with_scenario(scenario, tx));
    let coordinator = SessionCoordinator::new(radio.clone(), config);
    let _pump = coordinator.spawn_event_pump(rx);

    let report = coordinator
        .start()
        .expect("start")
        .wait()
        .await
        .expect("report");

    assert_eq!(report.trigger, CompletionTrigger::DiscoveryFinished);
    let ids: Vec<&str> = report.devices.iter().map(|d| d.identity.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert_eq!(report.devices[0].display_name, "unknown device");
    assert_eq!(report.devices[0].signal_strength, SignalStrength::Dbm(-55));
    assert_eq!(report.devices[1].signal_strength, SignalStrength::Unknown);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(coordinator.live_devices().is_empty());
    assert!(!coordinator.is_scanning());
    assert_eq!(radio.cancel_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_without_finish_hits_deadline() {
    let config = ScanConfig::with_timeout(Duration::from_secs(3));
    let (tx, rx) = radio_event_queue(&config);
    let scenario = Scenario::default()
        .sighting(500, Sighting::new("A").rssi(-40))
        .sighting(5_000, Sighting::new("too-late").rssi(-40));

    let radio = Arc::new(SimulatedRadio::with_scenario(scenario, tx));
    let coordinator = SessionCoordinator::new(radio.clone(), config);
    let _pump = coordinator.spawn_event_pump(rx);

    let report = coordinator
        .start()
        .expect("start")
        .wait()
        .await
        .expect("report");

    assert_eq!(report.trigger, CompletionTrigger::Deadline);
    assert_eq!(report.devices.len(), 1);
    assert!(!radio.is_discovering());
}

#[tokio::test(start_paused = true)]
async fn test_trailing_sightings_stay_with_their_session() {
    let config = ScanConfig::default();
    let (tx, rx) = radio_event_queue(&config);
    let mut scenario = Scenario::default();
    scenario.trailing.push(Sighting::new("ghost").rssi(-30));

    let radio = Arc::new(SimulatedRadio::with_scenario(scenario, tx));
    let coordinator = SessionCoordinator::new(radio.clone(), config);
    let _pump = coordinator.spawn_event_pump(rx);

    let first = coordinator.start().expect("start");
    coordinator.cancel();
    let report = first.wait().await.expect("first report");
    assert!(report.devices.is_empty());

    let second = coordinator.start().expect("restart");
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(coordinator.live_devices().is_empty());

    coordinator.cancel();
    let report = second.wait().await.expect("second report");
    assert_eq!(report.trigger, CompletionTrigger::Cancelled);
    assert!(report.devices.is_empty());
    assert_eq!(radio.cancel_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_finish_does_not_end_next_session() {
    let config = ScanConfig::default();
    let (tx, rx) = radio_event_queue(&config);
    let radio = Arc::new(SimulatedRadio::new());
    let coordinator = SessionCoordinator::new(radio.clone(), config);
    let _pump = coordinator.spawn_event_pump(rx);

    let first = coordinator.start().expect("start");
    let old_run = first.session_id();
    coordinator.cancel();
    tx.send(RadioEvent::DiscoveryFinished { run: old_run })
        .await
        .expect("queue open");
    first.wait().await.expect("first report");

    let mut second = coordinator.start().expect("restart");
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(second.try_result().expect("open").is_none());
    assert!(coordinator.is_scanning());

    tx.send(RadioEvent::DiscoveryFinished {
        run: second.session_id(),
    })
    .await
    .expect("queue open");
    let report = second.wait().await.expect("second report");
    assert_eq!(report.trigger, CompletionTrigger::DiscoveryFinished);
    assert_eq!(radio.cancel_calls(), 2);
}
