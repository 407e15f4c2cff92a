use anyhow::{anyhow, Result};

use crate::frame::{Frame, CHANNELS_GRAY};

/// Pixel layouts the V4L2 source knows how to turn into a `Frame`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Yuyv,
    Grey,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(Self::Rgb24),
            b"YUYV" => Some(Self::Yuyv),
            b"GREY" => Some(Self::Grey),
            _ => None,
        }
    }
}

pub(crate) fn normalize_frame(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Frame> {
    match format {
        PixelFormat::Rgb24 => {
            let expected = plane_len(width, height, 3)?;
            let data = pixels
                .get(..expected)
                .ok_or_else(|| length_mismatch("RGB", expected, pixels.len()))?;
            Frame::rgb(data.to_vec(), width, height)
        }
        PixelFormat::Grey => {
            let expected = plane_len(width, height, 1)?;
            let data = pixels
                .get(..expected)
                .ok_or_else(|| length_mismatch("GREY", expected, pixels.len()))?;
            Frame::new(data.to_vec(), width, height, CHANNELS_GRAY)
        }
        PixelFormat::Yuyv => Frame::rgb(yuyv_to_rgb(pixels, width, height)?, width, height),
    }
}

// Drivers may hand back buffers padded past the image; only short buffers fail.
fn length_mismatch(kind: &str, expected: usize, got: usize) -> anyhow::Error {
    anyhow!(
        "{} frame length mismatch: expected at least {}, got {}",
        kind,
        expected,
        got
    )
}

fn plane_len(width: u32, height: u32, bytes_per_pixel: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(bytes_per_pixel))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frame width must be even, got {}", width));
    }
    let expected = plane_len(width, height, 2)?;
    if pixels.len() < expected {
        return Err(length_mismatch("YUYV", expected, pixels.len()));
    }

    let mut rgb = Vec::with_capacity(plane_len(width, height, 3)?);
    for macro_px in pixels[..expected].chunks_exact(4) {
        let u = macro_px[1] as f32 - 128.0;
        let v = macro_px[3] as f32 - 128.0;
        for y in [macro_px[0], macro_px[2]] {
            rgb.extend_from_slice(&yuv_to_rgb(y as f32, u, v));
        }
    }
    Ok(rgb)
}

fn yuv_to_rgb(y: f32, u: f32, v: f32) -> [u8; 3] {
    let r = y + 1.402_f32 * v;
    let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
    let b = y + 1.772_f32 * u;
    [clamp_to_u8(r), clamp_to_u8(g), clamp_to_u8(b)]
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
