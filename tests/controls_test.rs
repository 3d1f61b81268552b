use std::time::{Duration, Instant};
use thermae::config::MeterFormat;
use thermae::controls::{ControllerState, should_energize};
use thermae::meter::parse_watts;

#[test]
fn strong_export_energizes() {
    // Threshold magnitude 2200 W, reading -2500 W
    let mut state = ControllerState::new(2200, 300_000);
    state.apply_reading(-2500);
    assert!(state.decide());
    assert!(state.energized());
}

#[test]
fn weak_export_stays_open() {
    // Threshold magnitude 2200 W, reading -1800 W
    let mut state = ControllerState::new(2200, 300_000);
    state.apply_reading(-1800);
    assert!(!state.decide());
    assert!(!state.energized());
}

#[test]
fn boundary_reading_stays_open() {
    assert!(!should_energize(-2200, 2200));
    assert!(should_energize(-2201, 2200));
}

#[test]
fn import_never_energizes_for_any_threshold() {
    for threshold in [0, 1, 100, 2200, 50_000] {
        assert!(!should_energize(0, threshold));
        assert!(!should_energize(3000, threshold));
    }
}

#[test]
fn malformed_payload_decides_off() {
    // A 200 response with garbage parses as 0 W, which can never energize
    let watts = parse_watts("garbage", MeterFormat::Csv);
    assert_eq!(watts, 0);
    let mut state = ControllerState::new(2200, 300_000);
    state.apply_reading(watts);
    assert!(!state.decide());
}

#[test]
fn decisions_never_closer_than_interval() {
    let mut state = ControllerState::new(2200, 60_000);
    let start = Instant::now();

    assert!(state.is_due(start));
    state.mark_decided(start);

    let mut last = start;
    for step in 1..=5u64 {
        let now = start + Duration::from_millis(step * 60_000);
        // A moment earlier than the interval must not be due
        assert!(!state.is_due(now - Duration::from_millis(1)));
        assert!(state.is_due(now));
        assert!(now.duration_since(last) >= Duration::from_millis(60_000));
        state.mark_decided(now);
        last = now;
    }
}

#[test]
fn skipped_cycle_consumes_its_slot() {
    let mut state = ControllerState::new(2200, 60_000);
    let start = Instant::now();
    state.mark_decided(start);

    // A failed attempt advances the timestamp without a decision
    let failed_at = start + Duration::from_millis(60_000);
    assert!(state.is_due(failed_at));
    state.mark_decided(failed_at);
    assert!(!state.is_due(failed_at + Duration::from_millis(59_999)));
}

#[test]
fn interval_update_applies_to_next_tick() {
    let mut state = ControllerState::new(2200, 300_000);
    let start = Instant::now();
    state.mark_decided(start);

    // Operator submits 120 seconds; driver stores 120000 ms
    state.set_interval_ms(120_000);
    assert_eq!(state.interval_ms(), 120_000);
    assert!(!state.is_due(start + Duration::from_millis(119_999)));
    assert!(state.is_due(start + Duration::from_millis(120_000)));
}

#[test]
fn threshold_update_does_not_change_state_until_decided() {
    let mut state = ControllerState::new(2200, 300_000);
    state.apply_reading(-2500);
    assert!(state.decide());

    // Raising the threshold leaves the driven state alone until a new cycle
    state.set_threshold_watts(3000);
    assert!(state.energized());
    assert!(!state.decide());
}
