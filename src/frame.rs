//! Captured frame value type.
//!
//! - `Frame`: one decoded raster image (height x width x channels).
//!
//! Frames are immutable once constructed. The store hands out shared pointers
//! to them and readers that need ownership take a full copy via `Clone`.

use anyhow::{anyhow, Result};
use std::time::Instant;

/// Grayscale, one byte per pixel.
pub const CHANNELS_GRAY: u8 = 1;
/// Packed RGB24, three bytes per pixel.
pub const CHANNELS_RGB: u8 = 3;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One captured raster image.
///
/// The pixel buffer is private so a frame cannot be mutated after capture.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    /// Monotonic capture instant. Not part of frame equality.
    captured_at: Instant,
}

impl Frame {
    /// Build a frame, checking that the buffer matches the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Result<Self> {
        if channels != CHANNELS_GRAY && channels != CHANNELS_RGB {
            return Err(anyhow!("unsupported channel count {}", channels));
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        let expected = expected_len(width, height, channels)?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            captured_at: Instant::now(),
        })
    }

    /// Packed RGB24 frame.
    pub fn rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        Self::new(data, width, height, CHANNELS_RGB)
    }

    /// Frame filled with a single value in every byte.
    pub fn filled(width: u32, height: u32, channels: u8, value: u8) -> Result<Self> {
        let len = expected_len(width, height, channels)?;
        Self::new(vec![value; len], width, height, channels)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Age of this frame since capture.
    pub fn age(&self) -> std::time::Duration {
        self.captured_at.elapsed()
    }

    /// Pixel at (x, y), one slice of `channels` bytes.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let stride = self.channels as usize;
        let offset = (y as usize * self.width as usize + x as usize) * stride;
        self.data.get(offset..offset + stride)
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.channels == other.channels
            && self.data == other.data
    }
}

impl Eq for Frame {}

fn expected_len(width: u32, height: u32, channels: u8) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(channels as usize))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_length_mismatch() {
        let err = Frame::rgb(vec![0u8; 10], 4, 4).unwrap_err();
        assert!(err.to_string().contains("length mismatch"));
    }

    #[test]
    fn rejects_unsupported_channels() {
        assert!(Frame::new(vec![0u8; 32], 4, 4, 2).is_err());
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert!(Frame::rgb(Vec::new(), 0, 480).is_err());
    }

    #[test]
    fn pixel_addresses_row_major() -> Result<()> {
        let mut data = vec![0u8; 2 * 2 * 3];
        data[9..12].copy_from_slice(&[1, 2, 3]);
        let frame = Frame::rgb(data, 2, 2)?;
        assert_eq!(frame.pixel(1, 1), Some(&[1u8, 2, 3][..]));
        assert_eq!(frame.pixel(2, 0), None);
        Ok(())
    }

    #[test]
    fn clone_is_equal_and_independent() -> Result<()> {
        let frame = Frame::filled(8, 8, CHANNELS_GRAY, 42)?;
        let copy = frame.clone();
        assert_eq!(frame, copy);
        assert_ne!(frame.pixels().as_ptr(), copy.pixels().as_ptr());
        Ok(())
    }
}
