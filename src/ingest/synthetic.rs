//! Synthetic frame source for `stub://` devices.
//!
//! Produces a moving RGB gradient at the configured frame rate, so the rest
//! of the pipeline behaves as it would against a real camera.

use std::time::{Duration, Instant};

use super::{DeviceConfig, FrameSource};
use crate::error::ReadError;
use crate::frame::Frame;

pub struct SyntheticSource {
    config: DeviceConfig,
    frame_count: u64,
    interval: Duration,
    next_due: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: DeviceConfig) -> Self {
        let interval = if config.fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(1_000_000 / config.fps as u64)
        };
        Self {
            config,
            frame_count: 0,
            interval,
            next_due: None,
        }
    }

    pub fn frames_generated(&self) -> u64 {
        self.frame_count
    }

    /// Sleep until the next frame would arrive from a device at `fps`.
    fn wait_for_next(&mut self) {
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(Instant::now() + self.interval);
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let shift = self.frame_count as usize;
        let mut pixels = vec![0u8; width * height * 3];
        for (i, px) in pixels.chunks_exact_mut(3).enumerate() {
            let x = i % width;
            let y = i / width;
            px[0] = ((x + shift) % 256) as u8;
            px[1] = ((y + shift / 2) % 256) as u8;
            px[2] = ((x ^ y) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Frame, ReadError> {
        self.wait_for_next();
        let pixels = self.generate_pixels();
        let frame = Frame::rgb(pixels, self.config.width, self.config.height)
            .map_err(|err| ReadError::Transient(err.to_string()))?;
        self.frame_count += 1;
        Ok(frame)
    }

    fn describe(&self) -> String {
        self.config.device.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(fps: u32) -> DeviceConfig {
        DeviceConfig {
            device: "stub://test".to_string(),
            width: 32,
            height: 24,
            fps,
        }
    }

    #[test]
    fn produces_frames_at_configured_size() {
        let mut source = SyntheticSource::new(stub_config(0));
        let frame = source.next_frame().expect("synthetic frame");
        assert_eq!((frame.width, frame.height, frame.channels), (32, 24, 3));
        assert_eq!(source.frames_generated(), 1);
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut source = SyntheticSource::new(stub_config(0));
        let first = source.next_frame().expect("first frame");
        let second = source.next_frame().expect("second frame");
        assert_ne!(first, second);
    }

    #[test]
    fn paces_reads_like_a_device() {
        let mut source = SyntheticSource::new(stub_config(50));
        let start = Instant::now();
        for _ in 0..3 {
            source.next_frame().expect("paced frame");
        }
        // First read is immediate, the next two wait ~20ms each.
        assert!(start.elapsed() >= Duration::from_millis(35));
    }

    #[test]
    fn zero_sized_config_reports_transient_failure() {
        let mut source = SyntheticSource::new(DeviceConfig {
            width: 0,
            ..stub_config(0)
        });
        assert!(matches!(source.next_frame(), Err(ReadError::Transient(_))));
    }
}
