use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use camera_relay::config::RelayConfig;
use camera_relay::ingest::DEFAULT_DEVICE;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CAMERA_RELAY_CONFIG",
        "CAMERA_RELAY_ADDR",
        "CAMERA_RELAY_DEVICE",
        "CAMERA_RELAY_SNAPSHOT_DIR",
        "CAMERA_RELAY_JPEG_QUALITY",
        "CAMERA_RELAY_MAX_READ_FAILURES",
        "CAMERA_RELAY_FRAME_INTERVAL_MS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = RelayConfig::load().expect("load defaults");
    assert_eq!(cfg.addr, "0.0.0.0:5001");
    assert_eq!(cfg.device.device, DEFAULT_DEVICE);
    assert_eq!((cfg.device.width, cfg.device.height), (640, 480));
    assert_eq!(cfg.snapshot_dir.to_str(), Some("snapshots"));
    assert_eq!(cfg.jpeg_quality, 95);
    assert_eq!(cfg.capture.max_consecutive_failures, 0);
    assert_eq!(cfg.min_frame_interval, None);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "http": { "addr": "127.0.0.1:8080" },
        "device": { "path": "1", "width": 1280, "height": 720, "fps": 15 },
        "capture": { "retry_delay_ms": 10, "max_consecutive_failures": 5 },
        "snapshots": { "dir": "/var/lib/camera-relay/snapshots" },
        "stream": { "jpeg_quality": 70, "min_frame_interval_ms": 40 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("CAMERA_RELAY_CONFIG", file.path());
    std::env::set_var("CAMERA_RELAY_DEVICE", "stub://lab");
    std::env::set_var("CAMERA_RELAY_JPEG_QUALITY", "85");

    let cfg = RelayConfig::load().expect("load config");

    assert_eq!(cfg.addr, "127.0.0.1:8080");
    assert_eq!(cfg.device.device, "stub://lab");
    assert_eq!((cfg.device.width, cfg.device.height), (1280, 720));
    assert_eq!(cfg.device.fps, 15);
    assert_eq!(cfg.capture.retry_delay, Duration::from_millis(10));
    assert_eq!(cfg.capture.max_consecutive_failures, 5);
    assert_eq!(
        cfg.snapshot_dir.to_str(),
        Some("/var/lib/camera-relay/snapshots")
    );
    assert_eq!(cfg.jpeg_quality, 85);
    assert_eq!(cfg.min_frame_interval, Some(Duration::from_millis(40)));

    let service_cfg = cfg.service_config();
    assert_eq!(service_cfg.jpeg_quality, 85);
    assert_eq!(service_cfg.device.resolved_device(), "stub://lab");

    clear_env();
}

#[test]
fn rejects_out_of_range_quality() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CAMERA_RELAY_JPEG_QUALITY", "0");
    let err = RelayConfig::load().unwrap_err();
    assert!(err.to_string().contains("jpeg quality"));

    clear_env();
}

#[test]
fn rejects_bad_address_and_malformed_numbers() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CAMERA_RELAY_ADDR", "not-an-address");
    assert!(RelayConfig::load().is_err());
    clear_env();

    std::env::set_var("CAMERA_RELAY_MAX_READ_FAILURES", "many");
    let err = RelayConfig::load().unwrap_err();
    assert!(err.to_string().contains("CAMERA_RELAY_MAX_READ_FAILURES"));

    clear_env();
}

#[test]
fn zero_frame_interval_means_unthrottled() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CAMERA_RELAY_FRAME_INTERVAL_MS", "0");
    let cfg = RelayConfig::load().expect("load config");
    assert_eq!(cfg.min_frame_interval, None);

    clear_env();
}
