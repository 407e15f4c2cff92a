//! On-demand JPEG snapshots.
//!
//! A snapshot is one read of the store, encoded and written to
//! `<dir>/snapshot_<YYYYMMDD-HHMMSS>.jpg`. Two captures in the same second
//! share a name; the later one replaces the earlier file.

use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};

use crate::codec;
use crate::error::CameraError;
use crate::store::FrameStore;

pub const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";

const FILENAME_FORMAT: &str = "snapshot_%Y%m%d-%H%M%S.jpg";

/// File name for a snapshot taken at `at`.
pub fn snapshot_filename(at: NaiveDateTime) -> String {
    at.format(FILENAME_FORMAT).to_string()
}

#[derive(Clone, Debug)]
pub struct SnapshotWriter {
    dir: PathBuf,
    jpeg_quality: u8,
}

impl SnapshotWriter {
    /// Writer rooted at `dir`, creating the directory if it is missing.
    pub fn new(dir: impl Into<PathBuf>, jpeg_quality: u8) -> Result<Self, CameraError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, jpeg_quality })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Capture using the local wall clock.
    pub fn capture(&self, store: &FrameStore) -> Result<PathBuf, CameraError> {
        self.capture_at(store, Local::now().naive_local())
    }

    /// Capture the current frame and name it after `at`.
    pub fn capture_at(
        &self,
        store: &FrameStore,
        at: NaiveDateTime,
    ) -> Result<PathBuf, CameraError> {
        let frame = store.raw_snapshot().ok_or(CameraError::NoFrameYet)?;
        let jpeg = codec::encode_jpeg(&frame, self.jpeg_quality)?;
        let path = self.dir.join(snapshot_filename(at));
        std::fs::write(&path, &jpeg)?;
        log::info!(
            "snapshot: saved {} ({}x{}, {} bytes)",
            path.display(),
            frame.width,
            frame.height,
            jpeg.len()
        );
        Ok(path)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
