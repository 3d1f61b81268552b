use std::path::Path;
use std::sync::{Arc, Mutex};
use thermae::config::{Config, MeterFormat};
use thermae::contactor::ContactorOutput;
use thermae::driver::{DiverterDriver, DriverCommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

/// Contactor that records every driven state
#[derive(Clone, Default)]
struct RecordingContactor {
    driven: Arc<Mutex<Vec<bool>>>,
}

impl ContactorOutput for RecordingContactor {
    fn drive(&mut self, energized: bool) -> thermae::Result<()> {
        self.driven.lock().unwrap().push(energized);
        Ok(())
    }
}

/// Serve one canned HTTP response per received request, repeating the last
/// one. Connections that send no bytes (the reachability probe) consume
/// nothing.
async fn spawn_meter(responses: Vec<String>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut next = 0usize;
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            let mut buf = [0u8; 1024];
            let n = sock.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                continue;
            }
            let response = &responses[next.min(responses.len() - 1)];
            next += 1;
            let _ = sock.write_all(response.as_bytes()).await;
        }
    });
    format!("http://{}/query", addr)
}

fn ok_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn error_response() -> String {
    "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        .to_string()
}

fn test_config(meter_url: String, dir: &Path) -> Config {
    let mut config = Config::default();
    config.meter.url = meter_url;
    config.meter.format = MeterFormat::Csv;
    config.meter.timeout_secs = 2;
    config.settings_file = dir
        .join("settings.bin")
        .to_string_lossy()
        .into_owned();
    config.telemetry.enabled = false;
    config.updater.enabled = false;
    config
}

fn build_driver(config: Config, contactor: RecordingContactor) -> DiverterDriver {
    let (tx, _rx) = mpsc::unbounded_channel::<DriverCommand>();
    // Keep the receiver alive for the test duration
    std::mem::forget(_rx);
    DiverterDriver::with_parts(config, Box::new(contactor), tx).unwrap()
}

#[tokio::test]
async fn strong_export_closes_contactor() {
    let dir = tempfile::tempdir().unwrap();
    let url = spawn_meter(vec![ok_response("2026-08-24T10:00:00,-2500")]).await;
    let contactor = RecordingContactor::default();
    let mut driver = build_driver(test_config(url, dir.path()), contactor.clone());

    driver.poll_cycle().await;

    assert_eq!(driver.grid_watts(), -2500);
    assert!(driver.contactor_energized());
    assert_eq!(*contactor.driven.lock().unwrap(), vec![true]);
}

#[tokio::test]
async fn weak_export_keeps_contactor_open() {
    let dir = tempfile::tempdir().unwrap();
    let url = spawn_meter(vec![ok_response("2026-08-24T10:00:00,-1800")]).await;
    let contactor = RecordingContactor::default();
    let mut driver = build_driver(test_config(url, dir.path()), contactor.clone());

    driver.poll_cycle().await;

    assert_eq!(driver.grid_watts(), -1800);
    assert!(!driver.contactor_energized());
    assert_eq!(*contactor.driven.lock().unwrap(), vec![false]);
}

#[tokio::test]
async fn failed_poll_reuses_stale_reading() {
    let dir = tempfile::tempdir().unwrap();
    let url = spawn_meter(vec![
        ok_response("2026-08-24T10:00:00,-2500"),
        error_response(),
    ])
    .await;
    let contactor = RecordingContactor::default();
    let mut driver = build_driver(test_config(url, dir.path()), contactor.clone());

    driver.poll_cycle().await;
    assert!(driver.contactor_energized());

    // Second cycle gets a 500; the stale -2500 W reading still energizes
    driver.poll_cycle().await;
    assert_eq!(driver.grid_watts(), -2500);
    assert!(driver.contactor_energized());
    assert_eq!(*contactor.driven.lock().unwrap(), vec![true, true]);
}

#[tokio::test]
async fn malformed_payload_reads_zero_and_opens() {
    let dir = tempfile::tempdir().unwrap();
    let url = spawn_meter(vec![ok_response("garbage")]).await;
    let contactor = RecordingContactor::default();
    let mut driver = build_driver(test_config(url, dir.path()), contactor.clone());

    driver.poll_cycle().await;

    assert_eq!(driver.grid_watts(), 0);
    assert!(!driver.contactor_energized());
}

#[tokio::test]
async fn unreachable_network_skips_cycle() {
    let dir = tempfile::tempdir().unwrap();
    // Bind then drop to get a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let contactor = RecordingContactor::default();
    let mut driver = build_driver(
        test_config(format!("http://{}/query", addr), dir.path()),
        contactor.clone(),
    );

    driver.poll_cycle().await;

    // Cycle skipped entirely: nothing driven, reading untouched
    assert!(contactor.driven.lock().unwrap().is_empty());
    assert_eq!(driver.grid_watts(), 0);
}

#[tokio::test]
async fn object_format_truncates_fractional_watts() {
    let dir = tempfile::tempdir().unwrap();
    let body = r#"{"power":-3000.76,"reactive":105.32,"pf":-0.49}"#;
    let url = spawn_meter(vec![ok_response(body)]).await;
    let contactor = RecordingContactor::default();
    let mut config = test_config(url, dir.path());
    config.meter.format = MeterFormat::Object;
    let mut driver = build_driver(config, contactor.clone());

    driver.poll_cycle().await;

    assert_eq!(driver.grid_watts(), -3000);
    assert!(driver.contactor_energized());
}

#[tokio::test]
async fn admin_updates_persist_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let url = spawn_meter(vec![ok_response("t,0")]).await;
    let contactor = RecordingContactor::default();
    let config = test_config(url, dir.path());
    let settings_path = config.settings_file.clone();
    let mut driver = build_driver(config, contactor);

    driver.set_threshold_watts(1800);
    driver.set_interval_seconds(120);

    assert_eq!(driver.threshold_watts(), 1800);
    assert_eq!(driver.interval_ms(), 120_000);

    let bytes = std::fs::read(&settings_path).unwrap();
    assert_eq!(&bytes[0..4], &1800i32.to_le_bytes());
    assert_eq!(&bytes[4..8], &120_000i32.to_le_bytes());

    // Repeating the same update leaves the file byte-identical
    let before = std::fs::read(&settings_path).unwrap();
    driver.set_threshold_watts(1800);
    assert_eq!(before, std::fs::read(&settings_path).unwrap());
}

#[tokio::test]
async fn zero_interval_floors_at_one_second() {
    let dir = tempfile::tempdir().unwrap();
    let url = spawn_meter(vec![ok_response("t,0")]).await;
    let mut driver = build_driver(test_config(url, dir.path()), RecordingContactor::default());

    driver.set_interval_seconds(0);

    assert_eq!(driver.interval_ms(), 1000);
}

#[tokio::test]
async fn persisted_settings_survive_driver_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = spawn_meter(vec![ok_response("t,0")]).await;
    let config = test_config(url, dir.path());

    {
        let mut driver = build_driver(config.clone(), RecordingContactor::default());
        driver.set_threshold_watts(3300);
        driver.set_interval_seconds(60);
    }

    let driver = build_driver(config, RecordingContactor::default());
    assert_eq!(driver.threshold_watts(), 3300);
    assert_eq!(driver.interval_ms(), 60_000);
}
