//! Latest-frame store.
//!
//! Single writer (the capture loop), any number of readers (stream sessions
//! and snapshot requests). The slot is an atomically swapped pointer to an
//! immutable `Frame`:
//!
//! - `publish` swaps in a new `Arc<Frame>`; the old one is dropped once the
//!   last reader holding it lets go.
//! - Readers load the current pointer without taking a lock, then encode or
//!   copy from their own reference. A reader therefore always sees one whole
//!   published frame and never blocks the writer.

use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::codec::{self, DEFAULT_JPEG_QUALITY};
use crate::frame::Frame;

#[derive(Debug)]
pub struct FrameStore {
    slot: ArcSwapOption<Frame>,
    published: AtomicU64,
    jpeg_quality: u8,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::with_quality(DEFAULT_JPEG_QUALITY)
    }

    /// Store whose `encoded_snapshot` uses the given JPEG quality.
    pub fn with_quality(jpeg_quality: u8) -> Self {
        Self {
            slot: ArcSwapOption::empty(),
            published: AtomicU64::new(0),
            jpeg_quality,
        }
    }

    /// Replace the current frame. Writer-only.
    pub fn publish(&self, frame: Frame) {
        self.slot.store(Some(Arc::new(frame)));
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// JPEG bytes of the current frame.
    ///
    /// `None` when nothing was published yet or the codec failed.
    pub fn encoded_snapshot(&self) -> Option<Vec<u8>> {
        let frame = self.latest()?;
        match codec::encode_jpeg(&frame, self.jpeg_quality) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                log::warn!("frame store: {}", err);
                None
            }
        }
    }

    /// Private copy of the current frame, `None` when the store is empty.
    pub fn raw_snapshot(&self) -> Option<Frame> {
        self.latest().map(|frame| Frame::clone(&frame))
    }

    /// Shared pointer to the current frame.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.slot.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.load().is_none()
    }

    pub fn frames_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
