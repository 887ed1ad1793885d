mod activity;
mod advance;
mod backup;
mod db;
mod error;
mod host;
mod inactive;
mod ipc;
mod lesson;
mod locator;
mod logging;
mod maintenance;
mod replicate;
mod roster;
mod settings;
mod sheets;
mod storage;

use std::io::{self, BufRead, Write};

fn main() {
    if let Err(e) = logging::init_logging(&logging::LogConfig::from_env()) {
        eprintln!("lessond: logging disabled: {e}");
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lessond started");

    let mut state = ipc::AppState::default();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // No id to answer with.
            Err(e) => ipc::err("", "bad_json", e.to_string(), None),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("lessond stopped");
}
