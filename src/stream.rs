//! MJPEG push stream for one HTTP client.
//!
//! Each session repeatedly pulls the newest JPEG from the store and writes it
//! as one `multipart/x-mixed-replace` part. A session ends when the store has
//! nothing to give, the client goes away (write error), or the server shuts
//! down. Sessions never signal the capture loop.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::store::FrameStore;

/// Multipart boundary token.
pub const BOUNDARY: &str = "frame";

/// `Content-Type` of the streaming response.
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Write one multipart part carrying a JPEG.
pub fn write_part<W: Write>(out: &mut W, jpeg: &[u8]) -> io::Result<()> {
    out.write_all(b"--")?;
    out.write_all(BOUNDARY.as_bytes())?;
    out.write_all(b"\r\nContent-Type: image/jpeg\r\n\r\n")?;
    out.write_all(jpeg)?;
    out.write_all(b"\r\n")?;
    out.flush()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The store was empty, or the frame could not be encoded.
    NoFrame,
    /// Writing to the client failed; the connection is gone.
    ClientGone,
    /// The server is shutting down.
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub parts_sent: u64,
    pub end: SessionEnd,
}

/// One client's streaming loop.
pub struct MjpegSession<'a> {
    store: &'a FrameStore,
    cancel: &'a AtomicBool,
    min_frame_interval: Option<Duration>,
}

impl<'a> MjpegSession<'a> {
    pub fn new(store: &'a FrameStore, cancel: &'a AtomicBool) -> Self {
        Self {
            store,
            cancel,
            min_frame_interval: None,
        }
    }

    /// Lower bound on time between parts. Unset means as fast as the client
    /// reads.
    pub fn with_min_frame_interval(mut self, interval: Option<Duration>) -> Self {
        self.min_frame_interval = interval.filter(|d| !d.is_zero());
        self
    }

    pub fn run<W: Write>(&self, out: &mut W) -> SessionSummary {
        let mut parts_sent = 0u64;
        let mut last_sent: Option<Instant> = None;
        let end = loop {
            if self.cancel.load(Ordering::SeqCst) {
                break SessionEnd::Cancelled;
            }
            if let (Some(interval), Some(last)) = (self.min_frame_interval, last_sent) {
                let elapsed = last.elapsed();
                if elapsed < interval {
                    std::thread::sleep(interval - elapsed);
                }
            }
            let Some(jpeg) = self.store.encoded_snapshot() else {
                break SessionEnd::NoFrame;
            };
            if let Err(err) = write_part(out, &jpeg) {
                log::debug!("stream: client write failed: {}", err);
                break SessionEnd::ClientGone;
            }
            parts_sent += 1;
            last_sent = Some(Instant::now());
        };
        SessionSummary { parts_sent, end }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, CHANNELS_RGB};

    /// Accepts a fixed number of writes, then fails like a closed socket.
    struct ClosingWriter {
        writes_left: usize,
        buf: Vec<u8>,
    }

    impl Write for ClosingWriter {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            if self.writes_left == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer closed"));
            }
            self.writes_left -= 1;
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn store_with_frame() -> FrameStore {
        let store = FrameStore::new();
        store.publish(Frame::filled(16, 16, CHANNELS_RGB, 77).expect("frame"));
        store
    }

    #[test]
    fn part_layout_matches_multipart_framing() -> io::Result<()> {
        let mut out = Vec::new();
        write_part(&mut out, b"JPEGDATA")?;
        assert_eq!(
            out,
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\nJPEGDATA\r\n".to_vec()
        );
        Ok(())
    }

    #[test]
    fn empty_store_ends_session_immediately() {
        let store = FrameStore::new();
        let cancel = AtomicBool::new(false);
        let mut out = Vec::new();
        let summary = MjpegSession::new(&store, &cancel).run(&mut out);
        assert_eq!(
            summary,
            SessionSummary {
                parts_sent: 0,
                end: SessionEnd::NoFrame
            }
        );
        assert!(out.is_empty());
    }

    #[test]
    fn client_disconnect_ends_session() {
        let store = store_with_frame();
        let cancel = AtomicBool::new(false);
        // Five writes make one complete part.
        let mut out = ClosingWriter {
            writes_left: 12,
            buf: Vec::new(),
        };
        let summary = MjpegSession::new(&store, &cancel).run(&mut out);
        assert_eq!(summary.end, SessionEnd::ClientGone);
        assert_eq!(summary.parts_sent, 2);
        assert!(out.buf.starts_with(b"--frame\r\n"));
    }

    #[test]
    fn cancelled_session_sends_nothing() {
        let store = store_with_frame();
        let cancel = AtomicBool::new(true);
        let mut out = Vec::new();
        let summary = MjpegSession::new(&store, &cancel).run(&mut out);
        assert_eq!(summary.end, SessionEnd::Cancelled);
        assert_eq!(summary.parts_sent, 0);
    }

    #[test]
    fn min_interval_spaces_parts() {
        let store = store_with_frame();
        let cancel = AtomicBool::new(false);
        let mut out = ClosingWriter {
            writes_left: 15,
            buf: Vec::new(),
        };
        let start = Instant::now();
        let summary = MjpegSession::new(&store, &cancel)
            .with_min_frame_interval(Some(Duration::from_millis(20)))
            .run(&mut out);
        assert_eq!(summary.parts_sent, 3);
        // Parts two and three, plus the failed fourth, each wait first.
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
