//! Retention maintenance for the reading history.
//!
//! The hot path only ever queries the last 72 hours, but the store keeps
//! everything appended to it. This tool deletes readings older than the
//! retention horizon; it is the only thing that removes readings, and it
//! runs out-of-band (cron or by hand), never from the daemon cycle.
//!
//! Usage:
//!   cargo run --bin prune_history               # default 72h horizon
//!   cargo run --bin prune_history -- --hours 168
//!   cargo run --bin prune_history -- --dry-run
//!
//! Environment:
//!   GEOMON_DB - store path (default: geomon.db)

use chrono::Utc;
use geomon_service::db::{ReadingQuery, Store};
use std::env;

const DEFAULT_RETENTION_HOURS: i64 = 72;

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut retention_hours = DEFAULT_RETENTION_HOURS;
    let mut dry_run = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--hours" => {
                if i + 1 < args.len() {
                    retention_hours = match args[i + 1].parse() {
                        Ok(hours) => hours,
                        Err(_) => {
                            eprintln!("Error: --hours requires a number, got {}", args[i + 1]);
                            std::process::exit(1);
                        }
                    };
                    i += 2;
                } else {
                    eprintln!("Error: --hours requires a value");
                    std::process::exit(1);
                }
            }
            "--dry-run" => {
                dry_run = true;
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Usage: {} [--hours N] [--dry-run]", args[0]);
                std::process::exit(1);
            }
        }
    }

    let store = match Store::open_default() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let now = Utc::now();
    let cutoff = now - chrono::Duration::hours(retention_hours);

    let candidates = match store.query(&ReadingQuery {
        end: Some(cutoff),
        ..Default::default()
    }) {
        Ok(readings) => readings.len(),
        Err(e) => {
            eprintln!("Failed to count prunable readings: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "{} readings older than {}h (cutoff {})",
        candidates,
        retention_hours,
        cutoff.format("%Y-%m-%d %H:%M UTC")
    );

    if dry_run {
        println!("Dry run; nothing deleted");
        return;
    }

    match store.prune_older_than(retention_hours, now) {
        Ok(deleted) => println!("Pruned {} readings", deleted),
        Err(e) => {
            eprintln!("Prune failed: {}", e);
            std::process::exit(1);
        }
    }
}
