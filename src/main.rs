//! MargaNav daemon entry point.
//!
//! Opens the serial link to the operator console, builds the session with
//! its planner backend registry, and runs the reader/writer/control threads
//! until a shutdown signal arrives.

use clap::Parser;
use log::{error, info, warn};
use marga_nav::config::AppConfig;
use marga_nav::error::NavError;
use marga_nav::protocol::{Frame, NavSession};
use marga_nav::shared::{RateHandle, SharedRate};
use marga_nav::threads::spawn_threads;
use marga_nav::transport::{OutboundQueue, SerialLink};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Serial navigation daemon for field survey vehicles
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (default: marga.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Serial port override
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate override
    #[arg(short, long)]
    baud: Option<u32>,
}

fn load_config(args: &Args) -> marga_nav::Result<AppConfig> {
    if let Some(path) = &args.config {
        info!("Loading configuration from {}", path);
        return AppConfig::load(Path::new(path));
    }
    if Path::new("marga.toml").exists() {
        info!("Loading configuration from marga.toml");
        return AppConfig::load(Path::new("marga.toml"));
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn main() -> marga_nav::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = load_config(&args)?;
    if let Some(port) = args.port {
        config.link.port = port;
    }
    if let Some(baud) = args.baud {
        config.link.baud = baud;
    }

    info!("MargaNav v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Link: {}@{} ({} B/s budget), telemetry {} Hz",
        config.link.port, config.link.baud, config.link.bytes_per_sec, config.telemetry.rate_hz
    );

    let transport = SerialLink::open(&config.link.port, config.link.baud)?;

    let outbound = Arc::new(OutboundQueue::new(config.link.outbound_capacity));
    let rate: SharedRate = Arc::new(RateHandle::new(config.telemetry.rate_hz));
    let session = NavSession::new(config.clone(), Arc::clone(&outbound), Arc::clone(&rate));

    outbound.push(Frame::Status {
        message: format!(
            "MargaNav ready on {}@{}",
            config.link.port, config.link.baud
        ),
    });

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| NavError::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let handles = spawn_threads(
        Box::new(transport),
        session,
        Arc::clone(&outbound),
        Arc::clone(&rate),
        config.link.clone(),
        Arc::clone(&running),
    )?;

    info!("MargaNav running. Press Ctrl-C to stop.");

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(200));
        if handles.any_finished() {
            warn!("A worker thread exited unexpectedly");
            break;
        }
    }
    running.store(false, Ordering::Relaxed);

    if let Err(e) = handles.reader.join() {
        error!("Reader thread panicked: {:?}", e);
    }
    if let Err(e) = handles.writer.join() {
        error!("Writer thread panicked: {:?}", e);
    }
    if let Err(e) = handles.control.join() {
        error!("Control thread panicked: {:?}", e);
    }

    info!("MargaNav stopped");
    Ok(())
}
