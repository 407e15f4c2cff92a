use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::CaptureConfig;
use crate::codec::DEFAULT_JPEG_QUALITY;
use crate::ingest::{DeviceConfig, DEFAULT_DEVICE};
use crate::service::ServiceConfig;
use crate::snapshot::DEFAULT_SNAPSHOT_DIR;

const DEFAULT_ADDR: &str = "0.0.0.0:5001";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_RETRY_DELAY_MS: u64 = 50;

#[derive(Debug, Deserialize, Default)]
struct RelayConfigFile {
    http: Option<HttpConfigFile>,
    device: Option<DeviceConfigFile>,
    capture: Option<CaptureConfigFile>,
    snapshots: Option<SnapshotConfigFile>,
    stream: Option<StreamConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct HttpConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DeviceConfigFile {
    path: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    retry_delay_ms: Option<u64>,
    max_consecutive_failures: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SnapshotConfigFile {
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    jpeg_quality: Option<u8>,
    min_frame_interval_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub addr: String,
    pub device: DeviceConfig,
    pub capture: CaptureConfig,
    pub snapshot_dir: PathBuf,
    pub jpeg_quality: u8,
    pub min_frame_interval: Option<Duration>,
}

impl RelayConfig {
    /// Defaults, then `CAMERA_RELAY_CONFIG` (JSON), then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CAMERA_RELAY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RelayConfigFile) -> Self {
        let addr = file
            .http
            .and_then(|http| http.addr)
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let device_file = file.device.unwrap_or_default();
        let device = DeviceConfig {
            device: device_file
                .path
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            width: device_file.width.unwrap_or(DEFAULT_WIDTH),
            height: device_file.height.unwrap_or(DEFAULT_HEIGHT),
            fps: device_file.fps.unwrap_or(DEFAULT_FPS),
        };
        let capture_file = file.capture.unwrap_or_default();
        let capture = CaptureConfig {
            retry_delay: Duration::from_millis(
                capture_file
                    .retry_delay_ms
                    .unwrap_or(DEFAULT_RETRY_DELAY_MS),
            ),
            max_consecutive_failures: capture_file.max_consecutive_failures.unwrap_or(0),
        };
        let snapshot_dir = file
            .snapshots
            .and_then(|snapshots| snapshots.dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR));
        let stream = file.stream.unwrap_or_default();
        Self {
            addr,
            device,
            capture,
            snapshot_dir,
            jpeg_quality: stream.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            min_frame_interval: stream.min_frame_interval_ms.map(Duration::from_millis),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("CAMERA_RELAY_ADDR") {
            if !addr.trim().is_empty() {
                self.addr = addr;
            }
        }
        if let Ok(device) = std::env::var("CAMERA_RELAY_DEVICE") {
            if !device.trim().is_empty() {
                self.device.device = device;
            }
        }
        if let Ok(dir) = std::env::var("CAMERA_RELAY_SNAPSHOT_DIR") {
            if !dir.trim().is_empty() {
                self.snapshot_dir = PathBuf::from(dir);
            }
        }
        if let Ok(quality) = std::env::var("CAMERA_RELAY_JPEG_QUALITY") {
            self.jpeg_quality = quality
                .trim()
                .parse()
                .map_err(|_| anyhow!("CAMERA_RELAY_JPEG_QUALITY must be an integer 1-100"))?;
        }
        if let Ok(failures) = std::env::var("CAMERA_RELAY_MAX_READ_FAILURES") {
            self.capture.max_consecutive_failures = failures.trim().parse().map_err(|_| {
                anyhow!("CAMERA_RELAY_MAX_READ_FAILURES must be a non-negative integer")
            })?;
        }
        if let Ok(interval) = std::env::var("CAMERA_RELAY_FRAME_INTERVAL_MS") {
            let millis: u64 = interval.trim().parse().map_err(|_| {
                anyhow!("CAMERA_RELAY_FRAME_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.min_frame_interval = Some(Duration::from_millis(millis));
        }
        Ok(())
    }

    /// Check cross-field constraints. Public so CLI overrides can be re-checked.
    pub fn validate(&mut self) -> Result<()> {
        self.addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow!("invalid listen address '{}': {}", self.addr, e))?;
        if self.device.device.trim().is_empty() {
            return Err(anyhow!("device must not be empty"));
        }
        if self.device.width == 0 || self.device.height == 0 {
            return Err(anyhow!("device width and height must be greater than zero"));
        }
        if self.snapshot_dir.as_os_str().is_empty() {
            return Err(anyhow!("snapshot directory must not be empty"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow!(
                "jpeg quality must be between 1 and 100, got {}",
                self.jpeg_quality
            ));
        }
        if self.min_frame_interval.is_some_and(|d| d.is_zero()) {
            self.min_frame_interval = None;
        }
        Ok(())
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            device: self.device.clone(),
            capture: self.capture.clone(),
            snapshot_dir: self.snapshot_dir.clone(),
            jpeg_quality: self.jpeg_quality,
        }
    }
}

fn read_config_file(path: &Path) -> Result<RelayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
