//! Persistent operator settings
//!
//! Two fixed-offset 4-byte little-endian slots in a small settings file:
//! offset 0 holds the export threshold magnitude in watts, offset 4 the
//! re-trigger interval in milliseconds. Writes are committed immediately so a
//! power loss cannot revert a just-applied administrative change.

use crate::config::DefaultsConfig;
use crate::error::Result;
use crate::logging::get_logger;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Upper plausibility bound for a stored threshold magnitude (watts).
/// Anything above this is taken as uninitialized or corrupted storage.
const THRESHOLD_PLAUSIBLE_MAX: i32 = 50_000;

/// Erased or never-written storage reads as all-ones bytes.
const ERASED_SLOT: i32 = -1;

/// The two persisted setting slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Export threshold magnitude, watts
    Threshold,
    /// Re-trigger interval, milliseconds
    Interval,
}

impl Slot {
    fn offset(self) -> u64 {
        match self {
            Slot::Threshold => 0,
            Slot::Interval => 4,
        }
    }
}

/// Settings slot-file manager
pub struct SettingsStore {
    path: PathBuf,
    defaults: DefaultsConfig,
    logger: crate::logging::StructuredLogger,
}

impl SettingsStore {
    /// Create a new settings store backed by `path`
    pub fn new<P: AsRef<Path>>(path: P, defaults: DefaultsConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            defaults,
            logger: get_logger("settings"),
        }
    }

    /// Load both settings, repairing any slot that is missing or implausible.
    ///
    /// A short or absent file, an erased slot, a negative threshold, a
    /// threshold beyond the plausibility bound, or a non-positive interval
    /// are all treated identically: the compiled default replaces the slot
    /// and the corrected value is committed before returning. A threshold of
    /// exactly 0 is a valid operator setting (energize on any export) and is
    /// kept. Storage errors degrade to the defaults.
    pub fn load(&self) -> (i32, u32) {
        let raw = self.read_slots();

        let (raw_threshold, raw_interval) = match raw {
            Some(slots) => slots,
            None => {
                self.logger
                    .info("No settings file found, initializing with defaults");
                (ERASED_SLOT, ERASED_SLOT)
            }
        };

        let threshold_ok = (0..=THRESHOLD_PLAUSIBLE_MAX).contains(&raw_threshold);
        let interval_ok = raw_interval > 0;

        let threshold = if threshold_ok {
            raw_threshold
        } else {
            self.defaults.threshold_watts
        };
        let interval = if interval_ok {
            raw_interval
        } else {
            self.defaults.interval_ms as i32
        };

        if !threshold_ok || !interval_ok {
            self.logger.warn(&format!(
                "Settings slots invalid (threshold={}, interval={}), repairing with defaults",
                raw_threshold, raw_interval
            ));
            if let Err(e) = self.write_slots(threshold, interval) {
                // Non-critical by design; keep running on in-memory values
                self.logger
                    .error(&format!("Failed to repair settings file: {}", e));
            }
        }

        (threshold, interval as u32)
    }

    /// Write one slot and commit immediately
    pub fn save(&self, slot: Slot, value: i32) -> Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        if file.metadata()?.len() < 8 {
            // Extend short files so both slot offsets exist
            file.set_len(8)?;
        }
        file.seek(SeekFrom::Start(slot.offset()))?;
        file.write_all(&value.to_le_bytes())?;
        file.sync_all()?;
        self.logger
            .debug(&format!("Saved {:?} slot = {}", slot, value));
        Ok(())
    }

    fn read_slots(&self) -> Option<(i32, i32)> {
        let mut file = OpenOptions::new().read(true).open(&self.path).ok()?;
        let mut buf = [0u8; 8];
        file.read_exact(&mut buf).ok()?;
        let threshold = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let interval = i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Some((threshold, interval))
    }

    fn write_slots(&self, threshold: i32, interval: i32) -> Result<()> {
        self.save(Slot::Threshold, threshold)?;
        self.save(Slot::Interval, interval)?;
        Ok(())
    }
}
