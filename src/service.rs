//! The owning camera component.
//!
//! `CameraService` ties the frame store, the capture loop and the snapshot
//! writer together. It is built once at startup and handed to the HTTP layer
//! behind an `Arc`. If the device cannot be opened the service still starts,
//! in degraded mode: every camera route reports the camera as absent.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::capture::{CaptureConfig, CaptureExit, CaptureHandle, CaptureLoop};
use crate::error::CameraError;
use crate::ingest::{DeviceConfig, FrameSource};
use crate::snapshot::SnapshotWriter;
use crate::store::FrameStore;

/// Everything needed to start the service.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub device: DeviceConfig,
    pub capture: CaptureConfig,
    pub snapshot_dir: PathBuf,
    pub jpeg_quality: u8,
}

struct Camera {
    store: Arc<FrameStore>,
    capture: Mutex<Option<CaptureHandle>>,
}

pub struct CameraService {
    camera: Option<Camera>,
    snapshots: SnapshotWriter,
}

impl CameraService {
    /// Open the configured device and start capturing.
    ///
    /// Device failures are logged and leave the service degraded. Only a
    /// failure to prepare the snapshot directory is returned.
    pub fn start(cfg: &ServiceConfig) -> Result<Self> {
        let store = Arc::new(FrameStore::with_quality(cfg.jpeg_quality));
        match CaptureLoop::open(&cfg.device, store.clone(), cfg.capture.clone()) {
            Ok(capture) => Self::with_capture(capture, store, cfg),
            Err(err) => {
                log::error!("camera service: {}; running without camera", err);
                Self::degraded(cfg)
            }
        }
    }

    /// Start with an already opened device handle.
    pub fn with_source(source: Box<dyn FrameSource>, cfg: &ServiceConfig) -> Result<Self> {
        let store = Arc::new(FrameStore::with_quality(cfg.jpeg_quality));
        let capture = CaptureLoop::with_source(source, store.clone(), cfg.capture.clone());
        Self::with_capture(capture, store, cfg)
    }

    /// Service with no camera at all.
    pub fn degraded(cfg: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            camera: None,
            snapshots: SnapshotWriter::new(&cfg.snapshot_dir, cfg.jpeg_quality)?,
        })
    }

    fn with_capture(capture: CaptureLoop, store: Arc<FrameStore>, cfg: &ServiceConfig) -> Result<Self> {
        let snapshots = SnapshotWriter::new(&cfg.snapshot_dir, cfg.jpeg_quality)?;
        let handle = capture.spawn()?;
        Ok(Self {
            camera: Some(Camera {
                store,
                capture: Mutex::new(Some(handle)),
            }),
            snapshots,
        })
    }

    pub fn camera_available(&self) -> bool {
        self.camera.is_some()
    }

    /// The frame store, `None` in degraded mode.
    pub fn store(&self) -> Option<&FrameStore> {
        self.camera.as_ref().map(|camera| camera.store.as_ref())
    }

    /// Whether the capture loop is still publishing.
    pub fn capturing(&self) -> bool {
        let Some(camera) = &self.camera else {
            return false;
        };
        match camera.capture.lock() {
            Ok(guard) => guard.as_ref().is_some_and(|handle| handle.is_running()),
            Err(_) => false,
        }
    }

    pub fn frames_published(&self) -> u64 {
        self.store().map_or(0, |store| store.frames_published())
    }

    /// Take one snapshot to disk.
    ///
    /// `Ok(None)` means there is no camera; errors are per-request failures.
    pub fn capture_snapshot(&self) -> Result<Option<PathBuf>, CameraError> {
        let Some(store) = self.store() else {
            return Ok(None);
        };
        self.snapshots.capture(store).map(Some)
    }

    pub fn snapshots(&self) -> &SnapshotWriter {
        &self.snapshots
    }

    /// Stop the capture loop and release the device. Safe to call twice.
    pub fn shutdown(&self) -> Result<Option<CaptureExit>> {
        let Some(camera) = &self.camera else {
            return Ok(None);
        };
        let handle = match camera.capture.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match handle {
            Some(handle) => Ok(Some(handle.stop()?)),
            None => Ok(None),
        }
    }
}

impl Drop for CameraService {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("camera service: shutdown failed: {}", err);
        }
    }
}
