//! Contactor decision logic
//!
//! [`ControllerState`] owns all mutable control-loop state: the last grid
//! reading, the contactor decision, the operator-adjustable threshold and
//! interval, and the due-tick timestamp. It is driven only by the diverter
//! driver task, so no locking is needed here.

use std::time::{Duration, Instant};

/// Decide whether the contactor should be energized for a grid reading.
///
/// Export readings are negative; the threshold is an administrator-facing
/// magnitude. The contactor closes only when export exceeds the magnitude,
/// so the boundary `reading == -threshold` stays open.
pub fn should_energize(reading_watts: i32, threshold_magnitude: i32) -> bool {
    reading_watts < -threshold_magnitude
}

/// Control-loop state for the diverter
#[derive(Debug)]
pub struct ControllerState {
    /// Last successfully polled grid power (negative = export). Retained,
    /// not cleared, when a poll fails.
    grid_watts: i32,

    /// Contactor decision from the most recent cycle
    energized: bool,

    /// Export threshold magnitude in watts
    threshold_watts: i32,

    /// Minimum spacing between decisions
    interval: Duration,

    /// When the last decision ran; `None` forces a decision on startup
    last_decision: Option<Instant>,
}

impl ControllerState {
    /// Create state with the persisted threshold and interval
    pub fn new(threshold_watts: i32, interval_ms: u32) -> Self {
        Self {
            grid_watts: 0,
            energized: false,
            threshold_watts: threshold_watts.max(0),
            interval: Duration::from_millis(u64::from(interval_ms)),
            last_decision: None,
        }
    }

    /// Whether the re-trigger interval has elapsed since the last decision
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_decision {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        }
    }

    /// Consume the current slot. Also called for skipped cycles so a failed
    /// attempt still preserves the interval cadence.
    pub fn mark_decided(&mut self, now: Instant) {
        self.last_decision = Some(now);
    }

    /// Record a fresh grid reading
    pub fn apply_reading(&mut self, watts: i32) {
        self.grid_watts = watts;
    }

    /// Decide the contactor state from the current reading and threshold
    pub fn decide(&mut self) -> bool {
        self.energized = should_energize(self.grid_watts, self.threshold_watts);
        self.energized
    }

    /// Last grid reading in watts
    pub fn grid_watts(&self) -> i32 {
        self.grid_watts
    }

    /// Contactor state from the last decision
    pub fn energized(&self) -> bool {
        self.energized
    }

    /// Current threshold magnitude in watts
    pub fn threshold_watts(&self) -> i32 {
        self.threshold_watts
    }

    /// Current interval in milliseconds
    pub fn interval_ms(&self) -> u64 {
        self.interval.as_millis() as u64
    }

    /// Update the threshold magnitude; negative magnitudes clamp to zero
    pub fn set_threshold_watts(&mut self, watts: i32) {
        self.threshold_watts = watts.max(0);
    }

    /// Update the interval; takes effect at the next due-tick check
    pub fn set_interval_ms(&mut self, interval_ms: u32) {
        self.interval = Duration::from_millis(u64::from(interval_ms.max(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energize_only_beyond_threshold_magnitude() {
        // Scenario A: strong export closes the contactor
        assert!(should_energize(-2500, 2200));
        // Scenario B: insufficient export keeps it open
        assert!(!should_energize(-1800, 2200));
        // Boundary stays open
        assert!(!should_energize(-2200, 2200));
        // Import never energizes
        assert!(!should_energize(500, 2200));
    }

    #[test]
    fn zero_threshold_requires_actual_export() {
        assert!(should_energize(-1, 0));
        assert!(!should_energize(0, 0));
    }

    #[test]
    fn first_tick_is_due_immediately() {
        let state = ControllerState::new(2200, 300_000);
        assert!(state.is_due(Instant::now()));
    }

    #[test]
    fn due_only_after_interval_elapses() {
        let mut state = ControllerState::new(2200, 60_000);
        let start = Instant::now();
        state.mark_decided(start);
        assert!(!state.is_due(start + Duration::from_millis(59_999)));
        assert!(state.is_due(start + Duration::from_millis(60_000)));
    }

    #[test]
    fn interval_update_changes_spacing() {
        // Scenario D: 300000 ms -> 120000 ms
        let mut state = ControllerState::new(2200, 300_000);
        let start = Instant::now();
        state.mark_decided(start);
        state.set_interval_ms(120_000);
        assert!(!state.is_due(start + Duration::from_millis(119_000)));
        assert!(state.is_due(start + Duration::from_millis(120_000)));
    }

    #[test]
    fn stale_reading_drives_decision() {
        // Scenario C: previous export reading is reused after a failed poll
        let mut state = ControllerState::new(2200, 300_000);
        state.apply_reading(-2500);
        assert!(state.decide());
        // No new reading applied; decision stays energized
        assert!(state.decide());
        assert_eq!(state.grid_watts(), -2500);
    }

    #[test]
    fn threshold_clamps_negative_magnitudes() {
        let mut state = ControllerState::new(-50, 1000);
        assert_eq!(state.threshold_watts(), 0);
        state.set_threshold_watts(-10);
        assert_eq!(state.threshold_watts(), 0);
    }
}
