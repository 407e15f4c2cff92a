//! V4L2 frame source.
//!
//! `V4l2Source` owns one local device node (e.g. /dev/video0) and a memory
//! mapped capture stream on it. The device is opened in `open` and closed when
//! the source is dropped.
//!
//! Buffers are converted to RGB (or kept grayscale) before leaving this module;
//! the capture loop only ever sees `Frame`s.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_frame, PixelFormat};
use super::{DeviceConfig, FrameSource};
use crate::error::ReadError;
use crate::frame::Frame;

const MMAP_BUFFERS: u32 = 4;

/// Device-backed frame source.
pub struct V4l2Source {
    config: DeviceConfig,
    state: DeviceV4l2State,
    format: PixelFormat,
    active_width: u32,
    active_height: u32,
    frame_count: u64,
}

#[self_referencing]
struct DeviceV4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    /// Open the device node and start streaming.
    pub fn open(config: DeviceConfig) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&config.device)
            .with_context(|| format!("open v4l2 device {}", config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"YUYV");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "unsupported pixel format {} on {}",
                format.fourcc,
                config.device
            )
        })?;

        if config.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    config.device,
                    err
                );
            }
        }

        let state = DeviceV4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, MMAP_BUFFERS)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            config.device,
            format.width,
            format.height,
            pixel_format
        );
        Ok(Self {
            active_width: format.width,
            active_height: format.height,
            format: pixel_format,
            config,
            state,
            frame_count: 0,
        })
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

impl FrameSource for V4l2Source {
    fn next_frame(&mut self) -> Result<Frame, ReadError> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.active_width, self.active_height, self.format);
        let frame = self
            .state
            .with_mut(|fields| match fields.stream.next() {
                Ok((buf, _meta)) => normalize_frame(buf, width, height, format)
                    .map_err(|err| ReadError::Transient(format!("{:#}", err))),
                Err(err) => Err(classify_io_error(err)),
            })?;
        self.frame_count += 1;
        Ok(frame)
    }

    fn describe(&self) -> String {
        self.config.device.clone()
    }
}

impl Drop for V4l2Source {
    fn drop(&mut self) {
        log::info!(
            "V4l2Source: releasing {} after {} frames",
            self.config.device,
            self.frame_count
        );
    }
}

/// Unplugged devices report ENODEV (or ENXIO on some drivers); anything else
/// is worth another read.
fn classify_io_error(err: std::io::Error) -> ReadError {
    match err.raw_os_error() {
        Some(code) if code == libc::ENODEV || code == libc::ENXIO => {
            ReadError::Disconnected(err.to_string())
        }
        _ => ReadError::Transient(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unplugged_device_is_a_disconnect() {
        let err = std::io::Error::from_raw_os_error(libc::ENODEV);
        assert!(classify_io_error(err).is_disconnect());
    }

    #[test]
    fn timeouts_are_transient() {
        let err = std::io::Error::from_raw_os_error(libc::EAGAIN);
        assert!(!classify_io_error(err).is_disconnect());
    }

    #[test]
    fn missing_device_fails_to_open() {
        let config = DeviceConfig {
            device: "/nonexistent/video9".to_string(),
            ..DeviceConfig::default()
        };
        assert!(V4l2Source::open(config).is_err());
    }
}
