//! Telemetry push to an EmonCMS-style collector
//!
//! Fire-and-forget: one raw-socket GET-style request per decision cycle,
//! carrying the contactor state under the node name. Failures are logged and
//! dropped; the next cycle reports fresh state anyway, so there is no retry.

use crate::config::TelemetryConfig;
use crate::logging::get_logger;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Collector client for contactor state reports
#[derive(Clone)]
pub struct TelemetryReporter {
    enabled: bool,
    host: String,
    port: u16,
    node: String,
    api_key: String,
    logger: crate::logging::StructuredLogger,
}

impl TelemetryReporter {
    /// Create a reporter for the configured collector
    pub fn new(config: &TelemetryConfig, node: &str) -> Self {
        Self {
            enabled: config.enabled,
            host: config.host.clone(),
            port: config.port,
            node: node.to_string(),
            api_key: config.api_key.clone(),
            logger: get_logger("telemetry"),
        }
    }

    /// Whether reports will actually be sent
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Push the contactor state. Best-effort: connection or transmission
    /// failures are logged and otherwise ignored.
    pub async fn report(&self, energized: bool) {
        if !self.enabled {
            return;
        }

        let request = build_request(&self.node, &self.api_key, energized);
        let addr = (self.host.as_str(), self.port);

        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.logger
                    .warn(&format!("Telemetry connect to {} failed: {}", self.host, e));
                return;
            }
            Err(_) => {
                self.logger
                    .warn(&format!("Telemetry connect to {} timed out", self.host));
                return;
            }
        };

        let mut stream = stream;
        if let Err(e) = stream.write_all(request.as_bytes()).await {
            self.logger.warn(&format!("Telemetry send failed: {}", e));
            return;
        }

        // Log the first response line if the collector answers in time
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        match tokio::time::timeout(CONNECT_TIMEOUT, reader.read_line(&mut line)).await {
            Ok(Ok(_)) => self
                .logger
                .debug(&format!("Collector response: {}", line.trim_end())),
            Ok(Err(e)) => self.logger.warn(&format!("Telemetry read failed: {}", e)),
            Err(_) => self.logger.debug("Collector response timed out"),
        }
    }
}

/// Build the collector request line.
///
/// The wire value is inverse-coded: 0 when energized, 1 when open. The
/// collector side has always recorded it this way, so the convention stays.
pub fn build_request(node: &str, api_key: &str, energized: bool) -> String {
    format!(
        "GET /input/post?node={}&fulljson={{\"{}\":{}}}&apikey={}\r\n",
        node,
        node,
        wire_code(energized),
        api_key
    )
}

/// Inverse-coded contactor state for the collector
pub fn wire_code(energized: bool) -> u8 {
    if energized { 0 } else { 1 }
}
