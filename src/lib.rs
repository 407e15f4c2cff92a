//! Camera Relay
//!
//! Captures frames from one local video device and serves the newest frame to
//! any number of HTTP clients, as a live MJPEG stream or as JPEG snapshots
//! written to disk.
//!
//! # Architecture
//!
//! One producer, many consumers, one shared slot:
//!
//! 1. **Capture loop** (`capture`): a dedicated thread owns the device and
//!    publishes every frame it reads. It never waits on consumers.
//! 2. **Frame store** (`store`): the latest frame behind an atomically swapped
//!    pointer. Readers copy or encode from their own reference and never
//!    observe a half-written frame.
//! 3. **Consumers**: per-client MJPEG sessions (`stream`) and one-shot
//!    snapshots (`snapshot`), served by the HTTP layer (`api`).
//!
//! # Module Structure
//!
//! - `frame`: the `Frame` value type
//! - `ingest`: device handles (V4L2, synthetic `stub://`)
//! - `codec`: JPEG encode/decode
//! - `service`: the owning component, with degraded mode and shutdown
//! - `config`: file + environment configuration

pub mod api;
pub mod capture;
pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod stream;

pub use capture::{CaptureConfig, CaptureExit, CaptureHandle, CaptureLoop, CaptureStats};
pub use error::{CameraError, ReadError};
pub use frame::Frame;
pub use ingest::{DeviceConfig, FrameSource, SyntheticSource};
pub use service::{CameraService, ServiceConfig};
pub use snapshot::SnapshotWriter;
pub use store::FrameStore;
pub use stream::{MjpegSession, SessionEnd, SessionSummary};
