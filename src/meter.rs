//! Grid meter client
//!
//! Polls the site energy monitor (IotaWatt CSV query or Shelly EM style
//! object payload) for the current grid power. One GET per poll, no retries
//! here; a failed poll simply waits for the next scheduled cycle.

use crate::config::{MeterConfig, MeterFormat};
use crate::error::{Result, ThermaeError};
use crate::logging::get_logger;
use std::time::Duration;

/// HTTP client for the grid meter endpoint
pub struct MeterClient {
    url: String,
    format: MeterFormat,
    http: reqwest::Client,
    logger: crate::logging::StructuredLogger,
}

impl MeterClient {
    /// Create a new meter client from configuration
    pub fn new(config: &MeterConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            url: config.url.clone(),
            format: config.format,
            http,
            logger: get_logger("meter"),
        })
    }

    /// Fetch the current grid power in watts (negative = export).
    ///
    /// Returns a network error on connect failure or non-success status. The
    /// response body is fully consumed so the connection is released whatever
    /// the outcome.
    pub async fn poll(&self) -> Result<i32> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ThermaeError::network(format!("Meter request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            // Drain the body before reporting so the connection can be reused
            let _ = response.text().await;
            return Err(ThermaeError::network(format!(
                "Meter returned status {}",
                status
            )));
        }

        let payload = response.text().await?;
        let watts = parse_watts(&payload, self.format);
        self.logger.debug(&format!("Grid value: {} W", watts));
        Ok(watts)
    }
}

/// Extract the grid watts from a meter response body.
///
/// CSV payloads carry the value after the first comma, object payloads after
/// the first colon. The integer parse is deliberately tolerant: a malformed
/// field (or a body with no delimiter at all) yields 0 rather than an error,
/// so a 200 response with garbage reads as 0 W.
pub fn parse_watts(payload: &str, format: MeterFormat) -> i32 {
    let delimiter = match format {
        MeterFormat::Csv => ',',
        MeterFormat::Object => ':',
    };
    let field = match payload.split_once(delimiter) {
        Some((_, rest)) => rest,
        None => payload,
    };
    leading_int(field)
}

/// Parse the leading integer of a string: optional sign, then digits,
/// truncating at the first non-digit. Anything else is 0.
fn leading_int(s: &str) -> i32 {
    let t = s.trim_start();
    let mut end = 0;
    for (i, c) in t.char_indices() {
        if i == 0 && (c == '-' || c == '+') {
            end = i + 1;
            continue;
        }
        if c.is_ascii_digit() {
            end = i + 1;
        } else {
            break;
        }
    }
    let digits = &t[..end];
    match digits.parse::<i64>() {
        Ok(v) => v.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        Err(_) => 0,
    }
}
