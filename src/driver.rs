//! Core diverter driver
//!
//! This module contains the control-loop orchestration: a single task that
//! multiplexes the scheduler tick, administrative commands, and periodic
//! update checks, and runs the poll/decide/drive cycle whenever the
//! re-trigger interval has elapsed.

use crate::config::Config;
use crate::contactor::{ContactorOutput, GpioContactor};
use crate::controls::ControllerState;
use crate::error::Result;
use crate::logging::get_logger;
use crate::meter::MeterClient;
use crate::settings::{SettingsStore, Slot};
use crate::telemetry::TelemetryReporter;
use crate::updater::{UpdateChecker, UpdateStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Duration, interval};

/// Granularity of the due-tick check
const SCHEDULER_TICK: Duration = Duration::from_millis(250);

/// Connectivity probe timeout
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Commands accepted by the driver from external components (web, etc.).
/// Setting updates go through the driver methods directly; the channel
/// carries only lifecycle requests.
#[derive(Debug, Clone)]
pub enum DriverCommand {
    /// Restart the process
    Reboot,
    /// Stop the process
    Shutdown,
}

/// How the driver loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Shutdown,
    Reboot,
}

/// Reachability check against the meter host. The board is useless without
/// the network, so a cycle whose probe fails is skipped outright.
pub struct ConnectivityProbe {
    target: String,
    logger: crate::logging::StructuredLogger,
}

impl ConnectivityProbe {
    /// Probe the host/port a meter URL points at
    pub fn for_meter_url(url: &str) -> Self {
        Self {
            target: probe_target(url),
            logger: get_logger("connectivity"),
        }
    }

    /// Whether the target accepts a TCP connection within the probe timeout
    pub async fn is_available(&self) -> bool {
        match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(&self.target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                self.logger
                    .debug(&format!("Probe of {} failed: {}", self.target, e));
                false
            }
            Err(_) => {
                self.logger
                    .debug(&format!("Probe of {} timed out", self.target));
                false
            }
        }
    }
}

/// Extract `host:port` from an HTTP URL, defaulting to port 80
fn probe_target(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, r)| r);
    let authority = rest.split(['/', '?']).next().unwrap_or(rest);
    if authority.contains(':') {
        authority.to_string()
    } else {
        format!("{}:80", authority)
    }
}

/// Main driver for Thermae
pub struct DiverterDriver {
    /// Configuration
    config: Config,

    /// Control-loop state (reading, decision, threshold, interval, cadence)
    state: ControllerState,

    /// Persistent settings slots
    settings: SettingsStore,

    /// Grid meter client
    meter: MeterClient,

    /// Contactor output line
    contactor: Box<dyn ContactorOutput>,

    /// Meter-host reachability probe
    connectivity: ConnectivityProbe,

    /// Collector push client
    telemetry: TelemetryReporter,

    /// Release update checker, when enabled
    updater: Option<UpdateChecker>,

    /// Logger with context
    logger: crate::logging::StructuredLogger,

    /// Lifecycle command sender handed to the web layer
    commands_tx: mpsc::UnboundedSender<DriverCommand>,

    /// Process start, for the uptime display
    started_instant: Instant,
    started_at: DateTime<Utc>,
}

impl DiverterDriver {
    /// Create a driver with real hardware collaborators. Loads configuration
    /// and initializes logging.
    pub async fn new(commands_tx: mpsc::UnboundedSender<DriverCommand>) -> Result<Self> {
        let config = Config::load().map_err(|e| {
            eprintln!("Failed to load configuration: {}", e);
            e
        })?;

        crate::logging::init_logging(&config.logging)?;
        config.validate()?;

        let contactor = GpioContactor::new(&config.contactor.chip, config.contactor.line)?;
        Self::with_parts(config, Box::new(contactor), commands_tx)
    }

    /// Create a driver around an externally supplied contactor output.
    /// Everything else is built from the configuration.
    pub fn with_parts(
        config: Config,
        contactor: Box<dyn ContactorOutput>,
        commands_tx: mpsc::UnboundedSender<DriverCommand>,
    ) -> Result<Self> {
        let logger = get_logger("driver");
        logger.info("Initializing hot-water diverter driver");

        let settings = SettingsStore::new(&config.settings_file, config.defaults.clone());
        let (threshold, interval_ms) = settings.load();
        logger.info(&format!(
            "Loaded settings: threshold {} W, interval {} ms",
            threshold, interval_ms
        ));

        let meter = MeterClient::new(&config.meter)?;
        let connectivity = ConnectivityProbe::for_meter_url(&config.meter.url);
        let telemetry = TelemetryReporter::new(&config.telemetry, &config.node_name);
        let updater = if config.updater.enabled {
            Some(UpdateChecker::new(&config.updater)?)
        } else {
            None
        };

        Ok(Self {
            config,
            state: ControllerState::new(threshold, interval_ms),
            settings,
            meter,
            contactor,
            connectivity,
            telemetry,
            updater,
            logger,
            commands_tx,
            started_instant: Instant::now(),
            started_at: Utc::now(),
        })
    }

    /// Run the driver main loop until shutdown or reboot is requested.
    ///
    /// The driver mutex is taken per select arm, never across awaiting the
    /// scheduler, so the web layer stays responsive between cycles. A cycle
    /// in flight does hold the lock for the duration of its meter request;
    /// that happens once per interval and is an accepted delay.
    pub async fn run(
        driver: Arc<Mutex<Self>>,
        mut commands_rx: mpsc::UnboundedReceiver<DriverCommand>,
    ) -> Result<RunOutcome> {
        let (check_interval_secs, has_updater) = {
            let mut drv = driver.lock().await;
            drv.logger.info("Starting diverter control loop");
            // The line was requested at the open level; drive it once so the
            // logged state and the hardware agree before the first decision.
            drv.contactor.drive(false)?;
            (
                drv.config.updater.check_interval_secs.max(60),
                drv.updater.is_some(),
            )
        };

        let mut scheduler = interval(SCHEDULER_TICK);
        let mut update_check = interval(Duration::from_secs(check_interval_secs));

        loop {
            tokio::select! {
                _ = scheduler.tick() => {
                    let mut drv = driver.lock().await;
                    if drv.state.is_due(Instant::now()) {
                        drv.poll_cycle().await;
                    }
                }
                _ = update_check.tick(), if has_updater => {
                    let mut drv = driver.lock().await;
                    if let Some(updater) = &mut drv.updater {
                        let _ = updater.check_for_updates().await;
                    }
                }
                cmd = commands_rx.recv() => {
                    let drv = driver.lock().await;
                    match cmd {
                        Some(DriverCommand::Reboot) => {
                            drv.logger.info("Reboot requested");
                            return Ok(RunOutcome::Reboot);
                        }
                        Some(DriverCommand::Shutdown) | None => {
                            drv.logger.info("Shutdown requested");
                            return Ok(RunOutcome::Shutdown);
                        }
                    }
                }
            }
        }
    }

    /// One poll/decide/drive cycle. Every outcome, including a skipped
    /// cycle, consumes the current interval slot.
    pub async fn poll_cycle(&mut self) {
        if !self.connectivity.is_available().await {
            self.logger
                .warn("Network unavailable, skipping cycle with stale state");
            self.state.mark_decided(Instant::now());
            return;
        }

        match self.meter.poll().await {
            Ok(watts) => self.state.apply_reading(watts),
            Err(e) => {
                // Keep the stale reading and decide with it
                self.logger.warn(&format!(
                    "Meter poll failed ({}), reusing last reading {} W",
                    e,
                    self.state.grid_watts()
                ));
            }
        }

        let energized = self.state.decide();
        self.logger.info(&format!(
            "Grid {} W, threshold {} W, contactor {}",
            self.state.grid_watts(),
            self.state.threshold_watts(),
            if energized { "on" } else { "off" }
        ));

        if let Err(e) = self.contactor.drive(energized) {
            self.logger
                .error(&format!("Failed to drive contactor: {}", e));
            self.state.mark_decided(Instant::now());
            return;
        }

        if self.telemetry.is_enabled() {
            let reporter = self.telemetry.clone();
            tokio::spawn(async move {
                reporter.report(energized).await;
            });
        }

        self.state.mark_decided(Instant::now());
    }

    /// Update and persist the threshold magnitude. Takes effect at the next
    /// due tick.
    pub fn set_threshold_watts(&mut self, watts: i32) {
        self.state.set_threshold_watts(watts);
        let stored = self.state.threshold_watts();
        if let Err(e) = self.settings.save(Slot::Threshold, stored) {
            self.logger
                .error(&format!("Failed to persist threshold: {}", e));
        }
        self.logger
            .info(&format!("Threshold updated to {} W", stored));
    }

    /// Update and persist the interval, given in seconds (stored as ms,
    /// floored at one second)
    pub fn set_interval_seconds(&mut self, seconds: u32) {
        let interval_ms = seconds
            .max(1)
            .saturating_mul(1000)
            .min(i32::MAX as u32);
        self.state.set_interval_ms(interval_ms);
        if let Err(e) = self.settings.save(Slot::Interval, interval_ms as i32) {
            self.logger
                .error(&format!("Failed to persist interval: {}", e));
        }
        self.logger
            .info(&format!("Interval updated to {} ms", interval_ms));
    }

    /// Ask the driver loop to restart the process
    pub fn request_reboot(&self) {
        self.commands_tx.send(DriverCommand::Reboot).ok();
    }

    /// Accessors for the web layer
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn node_name(&self) -> &str {
        &self.config.node_name
    }

    pub fn grid_watts(&self) -> i32 {
        self.state.grid_watts()
    }

    pub fn contactor_energized(&self) -> bool {
        self.state.energized()
    }

    pub fn threshold_watts(&self) -> i32 {
        self.state.threshold_watts()
    }

    pub fn interval_ms(&self) -> u64 {
        self.state.interval_ms()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_instant.elapsed().as_secs()
    }

    pub fn update_status(&self) -> Option<UpdateStatus> {
        self.updater.as_ref().map(UpdateChecker::status)
    }
}
