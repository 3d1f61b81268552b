//! Release update checks
//!
//! Periodically fetches a plain-text version manifest and compares it with
//! the running build. Check results only surface in the log and on the
//! status page; fetching and applying a new binary is the supervisor's job.

use crate::config::UpdaterConfig;
use crate::error::{Result, ThermaeError};
use crate::logging::get_logger;
use std::time::Duration;

/// Version of the running build (includes the nightly suffix when set)
pub const APP_VERSION: &str = env!("APP_VERSION");

/// Update check result
#[derive(Debug, Clone)]
pub struct UpdateStatus {
    pub current_version: String,
    pub latest_version: Option<String>,
    pub update_available: bool,
    pub last_check: Option<u64>,
    pub error: Option<String>,
}

impl Default for UpdateStatus {
    fn default() -> Self {
        Self {
            current_version: APP_VERSION.to_string(),
            latest_version: None,
            update_available: false,
            last_check: None,
            error: None,
        }
    }
}

/// Manifest-based update checker
pub struct UpdateChecker {
    manifest_url: String,
    http: reqwest::Client,
    status: UpdateStatus,
    logger: crate::logging::StructuredLogger,
}

impl UpdateChecker {
    /// Create a new update checker
    pub fn new(config: &UpdaterConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            manifest_url: config.manifest_url.clone(),
            http,
            status: UpdateStatus::default(),
            logger: get_logger("updater"),
        })
    }

    /// Fetch the manifest and compare versions
    pub async fn check_for_updates(&mut self) -> Result<UpdateStatus> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.status.last_check = Some(now);

        let latest = match self.fetch_manifest_version().await {
            Ok(v) => v,
            Err(e) => {
                self.status.error = Some(e.to_string());
                self.logger.warn(&format!("Update check failed: {}", e));
                return Err(e);
            }
        };

        self.status.error = None;
        self.status.update_available = latest != APP_VERSION;
        self.status.latest_version = Some(latest.clone());

        if self.status.update_available {
            self.logger.info(&format!(
                "Update available: {} (running {})",
                latest, APP_VERSION
            ));
        } else {
            self.logger.debug("Running the latest release");
        }

        Ok(self.status.clone())
    }

    /// Last known status snapshot
    pub fn status(&self) -> UpdateStatus {
        self.status.clone()
    }

    async fn fetch_manifest_version(&self) -> Result<String> {
        let response = self.http.get(&self.manifest_url).send().await?;
        if !response.status().is_success() {
            return Err(ThermaeError::update(format!(
                "Manifest returned status {}",
                response.status()
            )));
        }
        let body = response.text().await?;
        let version = body.lines().next().unwrap_or("").trim().to_string();
        if version.is_empty() {
            return Err(ThermaeError::update("Manifest is empty"));
        }
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_reports_running_version() {
        let status = UpdateStatus::default();
        assert_eq!(status.current_version, APP_VERSION);
        assert!(!status.update_available);
        assert!(status.last_check.is_none());
    }
}
