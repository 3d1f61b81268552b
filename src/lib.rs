//! # Thermae - Solar Export Hot-Water Diverter
//!
//! A controller daemon for single-board Linux computers that switches a
//! resistive hot-water load onto grid power once local solar is exporting
//! enough, by energizing a high-current contactor through a GPIO-driven
//! relay.
//!
//! ## How it works
//!
//! A timer-gated control loop polls a local energy monitor (IotaWatt or
//! Shelly EM style endpoint) for the grid power, energizes the contactor
//! while export exceeds the configured threshold magnitude, pushes the
//! resulting state to an EmonCMS-style collector, and persists the two
//! operator-adjustable settings (threshold and re-trigger interval) across
//! power cycles. A small web page shows the current state and takes setting
//! updates.
//!
//! ## Architecture
//!
//! - `config`: YAML configuration with validation
//! - `logging`: structured logging and tracing
//! - `settings`: the two persisted setting slots
//! - `meter`: grid meter HTTP client and tolerant payload parsing
//! - `controls`: threshold decision and interval cadence
//! - `contactor`: GPIO output line (energize-on-low relay)
//! - `telemetry`: best-effort collector pushes
//! - `driver`: control-loop orchestration
//! - `updater`: release update checks
//! - `web`: administrative HTTP surface

pub mod config;
pub mod contactor;
pub mod controls;
pub mod driver;
pub mod error;
pub mod logging;
pub mod meter;
pub mod settings;
pub mod telemetry;
pub mod updater;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use driver::DiverterDriver;
pub use error::{Result, ThermaeError};
