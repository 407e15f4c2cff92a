//! Error taxonomy shared by the capture, store and snapshot layers.

use thiserror::Error;

/// Failures surfaced to callers of the camera core.
///
/// Only `DeviceUnavailable` is fatal, and only to starting the capture
/// subsystem. Everything else is reported per request.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The capture device could not be opened (absent, busy, unsupported).
    #[error("camera device {device} unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    /// Nothing has been published into the frame store yet.
    #[error("no frame captured yet")]
    NoFrameYet,

    /// The codec could not produce bytes for a frame.
    #[error("frame encoding failed: {0}")]
    EncodeFailure(String),

    /// Writing a snapshot to disk failed.
    #[error("{0}")]
    PersistenceFailure(#[from] std::io::Error),
}

impl CameraError {
    pub(crate) fn device_unavailable(device: &str, reason: impl std::fmt::Display) -> Self {
        Self::DeviceUnavailable {
            device: device.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of a failed device read.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The read failed but the device may deliver again; retry next iteration.
    #[error("transient read failure: {0}")]
    Transient(String),

    /// The device is gone; the capture loop stops.
    #[error("device disconnected: {0}")]
    Disconnected(String),
}

impl ReadError {
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_failure_keeps_io_message() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
        let err = CameraError::from(io);
        assert!(matches!(err, CameraError::PersistenceFailure(_)));
        assert_eq!(err.to_string(), "read-only volume");
    }

    #[test]
    fn device_unavailable_names_device() {
        let err = CameraError::device_unavailable("/dev/video3", "no such file");
        assert_eq!(
            err.to_string(),
            "camera device /dev/video3 unavailable: no such file"
        );
    }

    #[test]
    fn only_disconnect_is_permanent() {
        assert!(ReadError::Disconnected("gone".into()).is_disconnect());
        assert!(!ReadError::Transient("timeout".into()).is_disconnect());
    }
}
