// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rollcall CLI
//!
//! Runs discovery sessions against a scripted radio and manages
//! configuration files.
//!
//! # Usage
//!
//! ```bash
//! # Scan with the default 10 s window
//! rollcall scan --scenario classroom.toml
//!
//! # Shorter window, JSON output
//! rollcall scan --scenario classroom.toml --timeout-ms 3000 --json
//!
//! # Simulate a powered-off radio
//! rollcall scan --radio-off
//!
//! # Validate a configuration file
//! rollcall validate --config rollcall.toml
//! ```

use clap::{Parser, Subcommand};
use rollcall::{
    radio_event_queue, ScanConfig, ScanReport, Scenario, SessionCoordinator, Sighting,
    SimulatedRadio,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Rollcall discovery sessions
#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(about = "Time-bounded radio discovery with deduplicated, exactly-once results")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one discovery session against a scripted radio
    Scan {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Scenario file driving the simulated radio
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override the scan window (milliseconds)
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Simulate a powered-off radio
        #[arg(long)]
        radio_off: bool,

        /// Simulate missing discovery authorization
        #[arg(long)]
        unauthorized: bool,

        /// Simulate the radio refusing to begin discovery
        #[arg(long)]
        refuse_start: bool,
    },

    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "rollcall.toml")]
        output: PathBuf,
    },

    /// Generate example scenario file
    GenScenario {
        /// Output file path
        #[arg(short, long, default_value = "scenario.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let file_level = match &args.command {
        Commands::Scan {
            config: Some(path), ..
        } => ScanConfig::from_file(path).ok().map(|c| c.log_level),
        _ => None,
    };
    let log_level = args
        .log_level
        .clone()
        .or(file_level)
        .unwrap_or_else(|| "info".into());
    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::Scan {
            config,
            scenario,
            timeout_ms,
            json,
            radio_off,
            unauthorized,
            refuse_start,
        } => {
            let mut config = match config {
                Some(path) => ScanConfig::from_file(path)?,
                None => ScanConfig::default(),
            };
            if let Some(ms) = timeout_ms {
                config.scan_timeout_ms = ms;
                config.validate()?;
            }
            let scenario = match scenario {
                Some(path) => Scenario::from_file(path)?,
                None => Scenario::default(),
            };
            let flags = RadioFlags {
                enabled: !radio_off,
                authorized: !unauthorized,
                accept_begin: !refuse_start,
            };
            cmd_scan(config, scenario, flags, json).await
        }
        Commands::GenConfig { output } => cmd_gen_config(output),
        Commands::GenScenario { output } => cmd_gen_scenario(output),
        Commands::Validate { config } => cmd_validate(config),
    }
}

struct RadioFlags {
    enabled: bool,
    authorized: bool,
    accept_begin: bool,
}

async fn cmd_scan(
    config: ScanConfig,
    scenario: Scenario,
    flags: RadioFlags,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = radio_event_queue(&config);
    let radio = Arc::new(SimulatedRadio::with_scenario(scenario, tx));
    radio.set_enabled(flags.enabled);
    radio.set_authorized(flags.authorized);
    radio.set_accept_begin(flags.accept_begin);

    let coordinator = SessionCoordinator::new(radio, config);
    let _pump = coordinator.spawn_event_pump(rx);

    let handle = match coordinator.start() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Scan not started [{}]: {}", e.code(), e);
            std::process::exit(2);
        }
    };

    if !json {
        eprintln!(
            "Scanning for {:?} (Ctrl+C to stop early)...",
            coordinator.config().scan_timeout()
        );
    }

    let wait = handle.wait();
    tokio::pin!(wait);
    let report = tokio::select! {
        report = &mut wait => report?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nCancelling scan...");
            coordinator.cancel();
            wait.await?
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(&ScanConfig::default())?;
    let content = format!(
        r#"# Rollcall Configuration
# Generated by rollcall gen-config

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_gen_scenario(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut scenario = Scenario::default()
        .sighting(
            150,
            Sighting::new("5C:F3:70:1A:22:01").named("Galaxy A54").rssi(-48),
        )
        .sighting(400, Sighting::new("5C:F3:70:1A:22:02").rssi(-71))
        .sighting(
            900,
            Sighting::new("5C:F3:70:1A:22:01").named("Galaxy A54").rssi(-52),
        )
        .sighting(1300, Sighting::new("5C:F3:70:1A:22:03").named("Pixel 7"))
        .finish_after(4000);
    scenario
        .trailing
        .push(Sighting::new("5C:F3:70:1A:22:04").named("late phone").rssi(-90));

    let toml_str = toml::to_string_pretty(&scenario)?;
    let content = format!(
        r#"# Rollcall Scenario
# Generated by rollcall gen-scenario
#
# Sightings are replayed relative to the start of discovery. Remove
# finish_after_ms to let the scan window expire instead.

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated scenario file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match ScanConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Scan window:     {:?}", config.scan_timeout());
            println!("Unknown name:    {}", config.unknown_name);
            println!("Event queue:     {}", config.event_queue_capacity);
            println!("Log level:       {}", config.log_level);
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_report(report: &ScanReport) {
    println!(
        "Session {} ended by {} after {:.1}s",
        report.session_id,
        report.trigger,
        report.elapsed.as_secs_f64()
    );
    println!("Devices Found ({}):", report.devices.len());
    for device in &report.devices {
        println!(
            "  {:>3}  {:<20}  {:<24}  {}",
            device.first_seen_order, device.identity, device.display_name, device.signal_strength
        );
    }
    println!(
        "--- {} sightings, {} duplicates, {} dropped ---",
        report.stats.sightings, report.stats.duplicates, report.stats.dropped
    );
}
