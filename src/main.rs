//! DharaIO - IMU telemetry capture daemon
//!
//! Binds a TCP port, fans accepted device connections out across a fixed set
//! of ingestion shards, and records each device's raw byte stream into one
//! append-only capture file per connection. Decoding is a separate pass over
//! the recorded files (`dhara_io::decoder`), never part of the capture path.

use dhara_io::broker::{write_session_notes, CaptureSession};
use dhara_io::error::Result;
use dhara_io::Config;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Command line options
///
/// Supports:
/// - `dhara-io <config-path>` (positional)
/// - `dhara-io --config <path>` (flag-based, `-c` short form)
/// - `dhara-io --tag <name>` session tag (`-t` short form)
/// - `dhara-io --notes <text>` operator notes for the session README
struct CliOptions {
    config_path: String,
    tag: Option<String>,
    notes: String,
}

fn parse_args() -> CliOptions {
    let args: Vec<String> = env::args().collect();
    let mut options = CliOptions {
        config_path: "/etc/dharaio.toml".to_string(),
        tag: None,
        notes: String::new(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" if i + 1 < args.len() => {
                options.config_path = args[i + 1].clone();
                i += 2;
            }
            "--tag" | "-t" if i + 1 < args.len() => {
                options.tag = Some(args[i + 1].clone());
                i += 2;
            }
            "--notes" | "-n" if i + 1 < args.len() => {
                options.notes = args[i + 1].clone();
                i += 2;
            }
            arg if !arg.starts_with('-') => {
                options.config_path = arg.to_string();
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }
    options
}

/// Default session tag when none is given: seconds since the epoch
fn default_tag() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("session_{}", secs)
}

fn main() -> Result<()> {
    let options = parse_args();
    let config = Config::from_file_or_default(&options.config_path)?;

    // Initialize logger from the config, overridable via RUST_LOG
    let env = env_logger::Env::default().default_filter_or(config.logging.level.clone());
    let mut builder = env_logger::Builder::from_env(env);
    if config.logging.output == "stdout" {
        builder.target(env_logger::Target::Stdout);
    }
    builder.init();

    log::info!("DharaIO v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", options.config_path);

    let tag = options.tag.unwrap_or_else(default_tag);
    let session = CaptureSession::start(&config, &tag)?;
    let session_dir = session.session_dir().to_path_buf();

    // Graceful shutdown on SIGINT/SIGTERM
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                log::info!("Received signal {}, shutting down", sig);
                r.store(false, Ordering::Relaxed);
            }
        })?;

    log::info!("Recording session '{}'. Press Ctrl-C to stop.", tag);
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    if let Err(e) = session.stop() {
        log::error!("Session teardown reported an error: {}", e);
    }

    log::info!("Writing session README");
    write_session_notes(&session_dir, &tag, &options.notes)?;

    log::info!("DharaIO stopped");
    Ok(())
}
