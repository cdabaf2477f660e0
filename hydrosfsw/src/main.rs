//! Hydros flight process entry point
//!
//! Boots the parameter store and the simulated drivers, then runs the
//! dispatch loop: one JSON uplink frame per stdin line, acknowledgments and
//! results as JSON lines on stdout. The radio transport that would feed
//! this loop in flight is an external collaborator.

use std::env;
use std::io::{self, BufRead};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use serde_json::json;

use hydrosfsw::config::constants::DEFAULT_SNAPSHOT_PATH;
use hydrosfsw::{
    sim, CommandExecutor, CommandRegistry, FswContext, ModeControl, ModeQueue, ParameterStore,
};
use hydroslibgs::{FlightMode, UplinkFrame};

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    info!("Hydros flight software starting");

    // Parameter snapshot path from the command line or the default
    let snapshot_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SNAPSHOT_PATH.to_string());

    let params = match ParameterStore::with_snapshot(&snapshot_path) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("Error loading parameter snapshot: {e}");
            process::exit(1);
        }
    };

    let modes = Arc::new(ModeQueue::new(FlightMode::Boot));
    let mut ctx = FswContext::new(params, sim::simulated_drivers(), modes.clone());
    let executor = CommandExecutor::new(CommandRegistry::standard());

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        running_clone.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    info!("Hydros initialized, entering dispatch loop");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("uplink read error: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        // Parse and process one uplinked command frame
        let frame: UplinkFrame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("discarding malformed uplink frame: {e}");
                continue;
            }
        };

        let mode = match FlightMode::try_from_id(frame.flight_mode_id) {
            Ok(mode) => mode,
            Err(e) => {
                error!("discarding uplink frame: {e}");
                continue;
            }
        };

        let response = match executor.execute(&mut ctx, mode, frame.command_id, &frame.args) {
            Ok(output) => json!({
                "flight_mode_id": frame.flight_mode_id,
                "command_id": frame.command_id,
                "success": true,
                "result": output,
            }),
            Err(e) => json!({
                "flight_mode_id": frame.flight_mode_id,
                "command_id": frame.command_id,
                "success": false,
                "error": e.to_string(),
            }),
        };
        println!("{response}");

        // Hand accepted mode requests to the (here: trivial) mode arbiter
        while let Some(requested) = modes.pop_request() {
            modes.replace_current_mode(requested);
        }

        // Drain acknowledgments toward the downlink transport
        for ack in ctx.downlink.drain() {
            match serde_json::to_string(&ack) {
                Ok(line) => println!("{line}"),
                Err(e) => error!("failed to serialize downlink frame: {e}"),
            }
        }
    }

    info!("Hydros shutdown complete");
}
