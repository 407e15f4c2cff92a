//! Background capture loop.
//!
//! One dedicated thread owns the device handle and publishes every frame it
//! reads into the shared `FrameStore`. Consumers never signal or slow this
//! loop; it only blocks on the device read.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::CameraError;
use crate::ingest::{self, DeviceConfig, FrameSource};
use crate::store::FrameStore;

/// Read failure policy for the capture loop.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Pause after a failed read before trying again.
    pub retry_delay: Duration,
    /// Stop after this many failed reads in a row. 0 retries forever.
    pub max_consecutive_failures: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(50),
            max_consecutive_failures: 0,
        }
    }
}

/// Counters shared between the capture thread and observers.
#[derive(Debug, Default)]
pub struct CaptureStats {
    frames_captured: AtomicU64,
    read_failures: AtomicU64,
    running: AtomicBool,
}

impl CaptureStats {
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    pub fn read_failures(&self) -> u64 {
        self.read_failures.load(Ordering::Relaxed)
    }

    /// False once the loop has exited, for any reason.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Why the capture loop exited.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureExit {
    Stopped,
    Disconnected(String),
    TooManyFailures(u32),
}

/// Builds and starts the capture loop.
pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    store: Arc<FrameStore>,
    cfg: CaptureConfig,
}

impl CaptureLoop {
    /// Acquire the device. Fails with `DeviceUnavailable` if it cannot be opened.
    pub fn open(
        device: &DeviceConfig,
        store: Arc<FrameStore>,
        cfg: CaptureConfig,
    ) -> Result<Self, CameraError> {
        let source = ingest::open_source(device)?;
        Ok(Self::with_source(source, store, cfg))
    }

    /// Use an already opened device handle.
    pub fn with_source(
        source: Box<dyn FrameSource>,
        store: Arc<FrameStore>,
        cfg: CaptureConfig,
    ) -> Self {
        Self { source, store, cfg }
    }

    /// Move the device onto a dedicated thread and start publishing.
    pub fn spawn(self) -> Result<CaptureHandle> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(CaptureStats::default());
        stats.running.store(true, Ordering::SeqCst);
        let CaptureLoop { source, store, cfg } = self;
        let device = source.describe();

        let shutdown_thread = shutdown.clone();
        let stats_thread = stats.clone();
        let join = std::thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                let exit = run_capture(source, &store, &cfg, &shutdown_thread, &stats_thread);
                stats_thread.running.store(false, Ordering::SeqCst);
                exit
            })?;

        log::info!("capture: started on {}", device);
        Ok(CaptureHandle {
            device,
            shutdown,
            stats,
            join: Some(join),
        })
    }
}

/// Owner of the running capture thread.
///
/// `stop` (or dropping the handle) signals the loop and waits for it; the
/// device is released when the loop returns, exactly once.
#[derive(Debug)]
pub struct CaptureHandle {
    device: String,
    shutdown: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
    join: Option<JoinHandle<CaptureExit>>,
}

impl CaptureHandle {
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        self.stats.is_running()
    }

    pub fn stop(mut self) -> Result<CaptureExit> {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> Result<CaptureExit> {
        self.shutdown.store(true, Ordering::SeqCst);
        let Some(join) = self.join.take() else {
            return Ok(CaptureExit::Stopped);
        };
        let exit = join
            .join()
            .map_err(|_| anyhow!("capture thread panicked"))?;
        log::info!("capture: {} released ({:?})", self.device, exit);
        Ok(exit)
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown_and_join() {
            log::error!("capture: {}", err);
        }
    }
}

fn run_capture(
    mut source: Box<dyn FrameSource>,
    store: &FrameStore,
    cfg: &CaptureConfig,
    shutdown: &AtomicBool,
    stats: &CaptureStats,
) -> CaptureExit {
    let mut consecutive_failures = 0u32;
    let exit = loop {
        if shutdown.load(Ordering::SeqCst) {
            break CaptureExit::Stopped;
        }
        match source.next_frame() {
            Ok(frame) => {
                consecutive_failures = 0;
                store.publish(frame);
                stats.frames_captured.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) if err.is_disconnect() => {
                log::error!("capture: {}; keeping last frame", err);
                break CaptureExit::Disconnected(err.to_string());
            }
            Err(err) => {
                stats.read_failures.fetch_add(1, Ordering::Relaxed);
                consecutive_failures = consecutive_failures.saturating_add(1);
                log::debug!("capture: {} (failure #{})", err, consecutive_failures);
                if cfg.max_consecutive_failures > 0
                    && consecutive_failures >= cfg.max_consecutive_failures
                {
                    log::error!(
                        "capture: giving up after {} failed reads",
                        consecutive_failures
                    );
                    break CaptureExit::TooManyFailures(consecutive_failures);
                }
                if !cfg.retry_delay.is_zero() {
                    std::thread::sleep(cfg.retry_delay);
                }
            }
        }
    };
    drop(source);
    exit
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
