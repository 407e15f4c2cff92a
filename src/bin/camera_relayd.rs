//! camera_relayd - camera relay daemon
//!
//! This daemon:
//! 1. Opens the configured capture device (or runs without one)
//! 2. Publishes frames into the shared frame store on a background thread
//! 3. Serves the landing page, MJPEG stream and snapshot API over HTTP
//! 4. Releases the device on Ctrl-C

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};

use camera_relay::{
    api::{ApiConfig, ApiServer},
    config::RelayConfig,
    CameraService,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Listen address, e.g. 0.0.0.0:5001.
    #[arg(long)]
    addr: Option<String>,
    /// Capture device: /dev/videoN, an index N, or stub://<name>.
    #[arg(long)]
    device: Option<String>,
    /// Directory for saved snapshots.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// JSON config file (same as CAMERA_RELAY_CONFIG).
    #[arg(long, env = "CAMERA_RELAY_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Some(path) = &args.config {
        std::env::set_var("CAMERA_RELAY_CONFIG", path);
    }
    let mut config = RelayConfig::load()?;
    if let Some(addr) = args.addr {
        config.addr = addr;
    }
    if let Some(device) = args.device {
        config.device.device = device;
    }
    if let Some(dir) = args.snapshot_dir {
        config.snapshot_dir = dir;
    }
    config.validate()?;

    let service = Arc::new(CameraService::start(&config.service_config())?);
    if service.camera_available() {
        log::info!("camera_relayd: capturing from {}", config.device.resolved_device());
    } else {
        log::warn!("camera_relayd: no camera; stream and snapshot routes will report failure");
    }
    log::info!(
        "camera_relayd: snapshots go to {}",
        service.snapshots().dir().display()
    );

    let api_config = ApiConfig {
        addr: config.addr.clone(),
        min_frame_interval: config.min_frame_interval,
        ..ApiConfig::default()
    };
    let api_handle = ApiServer::new(api_config, service.clone()).spawn()?;
    log::info!("camera api listening on {}", api_handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;

    log::info!("camera_relayd waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping API server...");
    api_handle.stop()?;
    if let Some(exit) = service.shutdown()? {
        log::info!("camera_relayd: capture ended ({:?})", exit);
    }

    Ok(())
}
