//! Slope Monitoring Service - Main Daemon
//!
//! A server-side daemon that continuously:
//! 1. Ingests rainfall and soil-moisture telemetry from monitoring stations
//! 2. Persists a rolling multi-day history in an embedded store
//! 3. Derives a risk status per station from threshold rules
//! 4. Detects status transitions and notifies on the critical ones
//! 5. Exports a status snapshot for the dashboard to poll
//!
//! Dashboard rendering, report generation, and vendor API access live in
//! external tooling; fetchers drop reading batches into the spool
//! directory this daemon consumes.
//!
//! Usage:
//!   cargo run --release                          # spool dir: ./incoming
//!   cargo run --release -- --spool /var/geomon   # custom spool dir
//!   cargo run --release -- --once                # single cycle, then exit
//!
//! Environment:
//!   GEOMON_DB              - store path (default: geomon.db)
//!   GEOMON_EMAIL_GATEWAY   - email gateway endpoint (optional)
//!   GEOMON_SMS_GATEWAY     - SMS gateway endpoint (optional)
//!   GEOMON_STATUS_SNAPSHOT - snapshot path (default: status.json)

use geomon_service::daemon::{Daemon, DaemonConfig};
use geomon_service::db::{ReadingQuery, Store};
use geomon_service::ingest::collector::Collector;
use geomon_service::ingest::file_drop::FileDropCollector;
use geomon_service::logging::{EventLog, LogLevel};
use geomon_service::notify::GatewaySender;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

fn main() {
    println!("Geomon - Slope Monitoring Service");
    println!("==================================\n");

    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let mut spool_dir = PathBuf::from("incoming");
    let mut run_once = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--spool" => {
                if i + 1 < args.len() {
                    spool_dir = PathBuf::from(&args[i + 1]);
                    i += 2;
                } else {
                    eprintln!("Error: --spool requires a directory path");
                    std::process::exit(1);
                }
            }
            "--once" => {
                run_once = true;
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Usage: {} [--spool DIR] [--once]", args[0]);
                std::process::exit(1);
            }
        }
    }

    // Open the store; an unreachable store at boot is the one fatal error.
    let store = match Store::open_default() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("\nStore initialization failed: {}\n", e);
            std::process::exit(1);
        }
    };

    let log = EventLog::new(store.clone(), LogLevel::Info);

    let senders = match GatewaySender::from_env() {
        Ok(senders) => {
            if senders.is_empty() {
                println!("No notification gateways configured; notifications disabled\n");
            }
            senders
        }
        Err(e) => {
            eprintln!("\nNotification gateway setup failed: {}\n", e);
            std::process::exit(1);
        }
    };

    let collectors: Vec<Arc<dyn Collector>> = vec![Arc::new(FileDropCollector::new(
        "spool",
        spool_dir.clone(),
    ))];

    let mut daemon = Daemon::new(DaemonConfig::from_env(), store.clone(), log, collectors, senders);

    println!("Initializing daemon...");
    if let Err(e) = daemon.initialize() {
        eprintln!("\nInitialization failed: {}\n", e);
        eprintln!("Check stations.toml in the working directory.\n");
        std::process::exit(1);
    }
    println!("Daemon initialized: {} stations\n", daemon.get_stations().len());

    // Report how much hot history each station already has.
    println!("Checking stored history...");
    for station in daemon.get_stations() {
        let count = store
            .query(&ReadingQuery {
                station_id: Some(station.station_id.clone()),
                last_hours: Some(72),
                ..Default::default()
            })
            .map(|readings| readings.len())
            .unwrap_or(0);
        match count {
            0 => println!("   {} - no readings in the last 72h", station.station_id),
            n => println!("   {} - {} readings in the last 72h", station.station_id, n),
        }
    }
    println!();

    if run_once {
        let summary = daemon.run_cycle(chrono::Utc::now());
        println!(
            "\nCycle complete: {} new readings, {} duplicates, {} stations, {} notifications",
            summary.readings_inserted,
            summary.readings_duplicate,
            summary.stations_evaluated,
            summary.notifications
        );
        return;
    }

    println!("Starting continuous monitoring loop...");
    println!("   Cycle period: 15 minutes");
    println!("   Spool directory: {}", spool_dir.display());
    println!("   Monitoring {} stations", daemon.get_stations().len());
    println!("   Press Ctrl+C to stop\n");

    daemon.run();
}
