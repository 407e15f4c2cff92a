//! JPEG codec boundary.
//!
//! The rest of the crate treats compression as a black box: a `Frame` goes in,
//! JPEG bytes come out, and the reverse for reading snapshots back.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageFormat};

use crate::error::CameraError;
use crate::frame::{Frame, CHANNELS_GRAY};

/// Quality used when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Encode a frame to JPEG at the given quality (1..=100).
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, CameraError> {
    let color = if frame.channels == CHANNELS_GRAY {
        ExtendedColorType::L8
    } else {
        ExtendedColorType::Rgb8
    };
    // Rough guess; JPEG at high quality lands well under raw size.
    let mut buf = Vec::with_capacity(frame.byte_len() / 4);
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode(frame.pixels(), frame.width, frame.height, color)
        .map_err(|err| CameraError::EncodeFailure(err.to_string()))?;
    Ok(buf)
}

/// Decode JPEG bytes into a frame. Grayscale stays grayscale, everything else
/// becomes RGB24.
pub fn decode_jpeg(bytes: &[u8]) -> Result<Frame> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .context("decode jpeg")?;
    match image {
        DynamicImage::ImageLuma8(gray) => {
            let (width, height) = gray.dimensions();
            Frame::new(gray.into_raw(), width, height, CHANNELS_GRAY)
        }
        other => {
            let rgb = other.to_rgb8();
            let (width, height) = rgb.dimensions();
            Frame::rgb(rgb.into_raw(), width, height)
        }
    }
}

/// Cheap check for a JPEG start-of-image marker.
pub fn looks_like_jpeg(bytes: &[u8]) -> bool {
    bytes.starts_with(&JPEG_SOI)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CHANNELS_RGB;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, 128]);
            }
        }
        Frame::rgb(data, width, height).expect("gradient frame")
    }

    #[test]
    fn encodes_rgb_frame() -> Result<()> {
        let jpeg = encode_jpeg(&gradient(64, 48), DEFAULT_JPEG_QUALITY)?;
        assert!(looks_like_jpeg(&jpeg));
        let decoded = decode_jpeg(&jpeg)?;
        assert_eq!((decoded.width, decoded.height), (64, 48));
        assert_eq!(decoded.channels, CHANNELS_RGB);
        Ok(())
    }

    #[test]
    fn grayscale_survives_decode() -> Result<()> {
        let frame = Frame::filled(32, 16, CHANNELS_GRAY, 200)?;
        let decoded = decode_jpeg(&encode_jpeg(&frame, 90)?)?;
        assert_eq!(decoded.channels, CHANNELS_GRAY);
        // Flat fields compress almost exactly.
        assert!(decoded.pixels().iter().all(|&p| p.abs_diff(200) <= 2));
        Ok(())
    }

    #[test]
    fn lower_quality_is_smaller() -> Result<()> {
        let frame = gradient(128, 96);
        let high = encode_jpeg(&frame, 95)?;
        let low = encode_jpeg(&frame, 20)?;
        assert!(low.len() < high.len());
        Ok(())
    }

    #[test]
    fn rejects_non_jpeg() {
        assert!(decode_jpeg(b"not a jpeg").is_err());
        assert!(!looks_like_jpeg(b"GIF89a"));
    }
}
