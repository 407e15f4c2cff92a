//! HTTP front end.
//!
//! A small HTTP/1.1 server on a std `TcpListener`. The accept loop runs on its
//! own thread and hands every connection to a fresh thread, so long-lived
//! `/video_feed` streams never hold up other clients.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::io::{BufWriter, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::CameraError;
use crate::service::CameraService;
use crate::stream::{MjpegSession, STREAM_CONTENT_TYPE};

const MAX_REQUEST_BYTES: usize = 8192;
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);
const INDEX_HTML: &str = include_str!("index.html");

pub const MSG_CAMERA_NOT_FOUND: &str = "Camera not found.";
pub const MSG_NO_FRAME: &str = "No frame captured.";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    /// Optional minimum spacing between stream parts.
    pub min_frame_interval: Option<Duration>,
    /// A client that stops reading for this long is dropped.
    pub write_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:5001".to_string(),
            min_frame_interval: None,
            write_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    /// Stop accepting connections and end every open stream at its next part.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    service: Arc<CameraService>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, service: Arc<CameraService>) -> Self {
        Self { cfg, service }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let ApiServer { cfg, service } = self;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::Builder::new()
            .name("http-accept".to_string())
            .spawn(move || {
                if let Err(err) = run_api(listener, cfg, service, shutdown_thread) {
                    log::error!("camera api stopped: {}", err);
                }
            })?;

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    cfg: ApiConfig,
    service: Arc<CameraService>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let cfg = Arc::new(cfg);
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                let cfg = cfg.clone();
                let service = service.clone();
                let shutdown = shutdown.clone();
                let spawned = std::thread::Builder::new()
                    .name("http-conn".to_string())
                    .spawn(move || {
                        if let Err(err) = handle_connection(stream, &cfg, &service, &shutdown) {
                            log::warn!("camera api request from {} failed: {}", peer, err);
                        }
                    });
                if let Err(err) = spawned {
                    log::error!("camera api: cannot spawn connection thread: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) if accept_error_is_transient(&err) => {
                log::warn!("camera api: accept failed, retrying: {}", err);
                std::thread::sleep(ACCEPT_RETRY_DELAY);
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Accept failures that leave the listener usable: descriptor exhaustion while
/// streams are open, and connections the peer dropped before we got to them.
fn accept_error_is_transient(err: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    if matches!(
        err.kind(),
        ErrorKind::Interrupted
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::TimedOut
            | ErrorKind::OutOfMemory
    ) {
        return true;
    }
    #[cfg(target_os = "linux")]
    {
        if let Some(code) = err.raw_os_error() {
            return matches!(
                code,
                libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM | libc::EPROTO
            );
        }
    }
    false
}

fn handle_connection(
    mut stream: TcpStream,
    cfg: &ApiConfig,
    service: &CameraService,
    shutdown: &AtomicBool,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_write_timeout(Some(cfg.write_timeout))?;

    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            write_json_response(&mut stream, 400, r#"{"error":"bad_request"}"#)?;
            return Err(err);
        }
    };
    if request.method != "GET" {
        write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)?;
        return Ok(());
    }
    log::debug!("camera api: GET {}", request.path);

    match request.path.as_str() {
        "/" | "/index.html" => {
            write_response(&mut stream, 200, "text/html; charset=utf-8", INDEX_HTML.as_bytes())
        }
        "/video_feed" => serve_video_feed(stream, cfg, service, shutdown),
        "/capture_snapshot" => {
            let body = serde_json::to_vec(&snapshot_response(service))?;
            write_response(&mut stream, 200, "application/json", &body)
        }
        "/health" => {
            let body = serde_json::to_vec(&serde_json::json!({
                "status": "ok",
                "camera": service.camera_available(),
                "capturing": service.capturing(),
                "frames_published": service.frames_published(),
            }))?;
            write_response(&mut stream, 200, "application/json", &body)
        }
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

fn serve_video_feed(
    stream: TcpStream,
    cfg: &ApiConfig,
    service: &CameraService,
    shutdown: &AtomicBool,
) -> Result<()> {
    let peer = stream.peer_addr()?;
    let mut out = BufWriter::new(stream);
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        STREAM_CONTENT_TYPE
    );
    out.write_all(header.as_bytes())?;
    out.flush()?;

    let Some(store) = service.store() else {
        log::warn!("camera api: no camera, closing stream for {}", peer);
        return Ok(());
    };
    log::info!("camera api: stream opened for {}", peer);
    let summary = MjpegSession::new(store, shutdown)
        .with_min_frame_interval(cfg.min_frame_interval)
        .run(&mut out);
    log::info!(
        "camera api: stream closed for {} after {} frames ({:?})",
        peer,
        summary.parts_sent,
        summary.end
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct SnapshotResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl SnapshotResponse {
    fn saved(path: String) -> Self {
        Self {
            success: true,
            path: Some(path),
            message: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            path: None,
            message: Some(message.into()),
        }
    }
}

fn snapshot_response(service: &CameraService) -> SnapshotResponse {
    match service.capture_snapshot() {
        Ok(Some(path)) => SnapshotResponse::saved(path.display().to_string()),
        Ok(None) => SnapshotResponse::failed(MSG_CAMERA_NOT_FOUND),
        Err(CameraError::NoFrameYet) => SnapshotResponse::failed(MSG_NO_FRAME),
        Err(err) => {
            log::error!("camera api: snapshot failed: {}", err);
            SnapshotResponse::failed(err.to_string())
        }
    }
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8_lossy(&data);
    let request_line = text.split("\r\n").next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
}
