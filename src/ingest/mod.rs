//! Capture device handles.
//!
//! This module provides the sources the capture loop can own:
//! - USB/V4L2 devices (feature: ingest-v4l2)
//! - Synthetic `stub://` devices (always available, used by tests and demos)
//!
//! Every source implements `FrameSource`. The capture loop is the only caller
//! of `next_frame`; a source is opened once and released exactly once, when
//! it is dropped.

mod synthetic;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

use crate::error::{CameraError, ReadError};
use crate::frame::Frame;

/// Device prefix selecting the synthetic source.
pub const STUB_SCHEME: &str = "stub://";

/// Device opened when none is configured: the first V4L2 camera when the
/// crate can drive one, otherwise a synthetic camera so the relay still serves
/// frames.
#[cfg(feature = "ingest-v4l2")]
pub const DEFAULT_DEVICE: &str = "/dev/video0";
#[cfg(not(feature = "ingest-v4l2"))]
pub const DEFAULT_DEVICE: &str = "stub://front_camera";

/// A device that yields frames, one blocking read at a time.
pub trait FrameSource: Send {
    /// Block until the device delivers the next frame.
    fn next_frame(&mut self) -> Result<Frame, ReadError>;

    /// Human readable device name for logs.
    fn describe(&self) -> String;
}

/// Which device to open and the format to ask it for.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// `/dev/videoN`, a bare index `N`, or `stub://<name>`.
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Frame rate requested from the device. Capture itself is not throttled.
    pub fps: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

impl DeviceConfig {
    /// Device path with bare indices expanded (`"1"` becomes `/dev/video1`).
    pub fn resolved_device(&self) -> String {
        let trimmed = self.device.trim();
        match trimmed.parse::<u32>() {
            Ok(index) => format!("/dev/video{}", index),
            Err(_) => trimmed.to_string(),
        }
    }
}

/// Open the configured device.
///
/// Fails with `DeviceUnavailable` when the device cannot be opened, or when it
/// names a real device and the crate was built without V4L2 support.
pub fn open_source(config: &DeviceConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    let device = config.resolved_device();
    if device.starts_with(STUB_SCHEME) {
        let source = SyntheticSource::new(config.clone());
        log::info!("ingest: opened {} (synthetic)", device);
        return Ok(Box::new(source));
    }
    open_device(&device, config)
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(device: &str, config: &DeviceConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    let config = DeviceConfig {
        device: device.to_string(),
        ..config.clone()
    };
    let source = V4l2Source::open(config)
        .map_err(|err| CameraError::device_unavailable(device, format!("{:#}", err)))?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(device: &str, _config: &DeviceConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    Err(CameraError::device_unavailable(
        device,
        "built without ingest-v4l2; only stub:// devices are available",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_index_maps_to_device_node() {
        let cfg = DeviceConfig {
            device: "2".to_string(),
            ..DeviceConfig::default()
        };
        assert_eq!(cfg.resolved_device(), "/dev/video2");
    }

    #[test]
    fn default_device_opens_in_this_build() {
        let cfg = DeviceConfig::default();
        assert_eq!(cfg.device, DEFAULT_DEVICE);
        if !cfg!(feature = "ingest-v4l2") {
            let source = open_source(&cfg).expect("default device");
            assert_eq!(source.describe(), "stub://front_camera");
        }
    }

    #[test]
    fn stub_device_opens() {
        let cfg = DeviceConfig {
            device: "stub://desk".to_string(),
            ..DeviceConfig::default()
        };
        let source = open_source(&cfg).expect("stub source");
        assert_eq!(source.describe(), "stub://desk");
    }

    #[test]
    fn missing_device_is_unavailable() {
        let cfg = DeviceConfig {
            device: "/nonexistent/video9".to_string(),
            ..DeviceConfig::default()
        };
        match open_source(&cfg) {
            Err(CameraError::DeviceUnavailable { device, .. }) => {
                assert_eq!(device, "/nonexistent/video9")
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("missing device must not open"),
        }
    }
}
