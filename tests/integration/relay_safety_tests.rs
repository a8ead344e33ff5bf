//! Relay safety-controller scenarios driven by an injected clock.

use relayguard::adapters::time::ManualClock;
use relayguard::app::ports::{Clock, RelayPort};
use relayguard::config::RelayConfig;
use relayguard::error::RelayError;
use relayguard::relay::{ForcedOffKind, RelayController, SwitchReason};

use crate::mock_hw::MockRelayPin;

fn default_controller() -> (RelayController, MockRelayPin) {
    (
        RelayController::new(&RelayConfig::default(), None),
        MockRelayPin::new(),
    )
}

#[test]
fn physical_output_tracks_logical_state_through_command_sequence() {
    let (mut relay, mut pin) = default_controller();
    let clock = ManualClock::new(0);

    // Arbitrary command sequence respecting min_switch_interval.
    let script = [true, false, true, true, false, true];
    for desired in script {
        clock.advance(1_500);
        let _ = relay.set(&mut pin, desired, SwitchReason::User, clock.now_millis());
        assert_eq!(
            relay.is_on(),
            pin.is_energized(),
            "logical and physical state diverged"
        );
    }
}

#[test]
fn safety_timeout_forces_off_at_first_tick_past_boundary() {
    let (mut relay, mut pin) = default_controller();
    let clock = ManualClock::new(5_000);

    relay
        .set(&mut pin, true, SwitchReason::User, clock.now_millis())
        .unwrap();

    // Tick every second; default safety timeout is 300s.
    let mut forced = None;
    for _ in 0..400 {
        clock.advance(1_000);
        if let Some(f) = relay.tick(&mut pin, clock.now_millis()) {
            forced = Some((f, clock.now_millis()));
            break;
        }
    }
    let (transition, at) = forced.expect("safety timeout must fire");
    assert_eq!(transition.kind, ForcedOffKind::SafetyTimeout);
    assert_eq!(at, 305_000, "first tick at/past the 300s boundary");
    assert_eq!(transition.on_for_ms, 300_000);
    assert!(!pin.is_energized());
}

#[test]
fn max_on_time_boundary_fires_exactly_once() {
    // Spec scenario: relay ON, max_on_time = 86400s under an injected
    // clock, safety timeout disabled to isolate the ceiling.
    let mut cfg = RelayConfig::default();
    cfg.safety_timeout_secs = 0;
    cfg.max_on_time_secs = 86_400;

    let mut relay = RelayController::new(&cfg, None);
    let mut pin = MockRelayPin::new();
    let clock = ManualClock::new(0);

    relay
        .set(&mut pin, true, SwitchReason::User, clock.now_millis())
        .unwrap();

    let mut forced_count = 0;
    // Hour-long strides up to a day, then a few extra ticks past it.
    for _ in 0..30 {
        clock.advance(3_600_000);
        if relay.tick(&mut pin, clock.now_millis()).is_some() {
            forced_count += 1;
        }
    }
    assert_eq!(forced_count, 1, "forced OFF recorded exactly once");
    assert!(!relay.is_on());
}

#[test]
fn stalled_then_resumed_loop_still_forces_off() {
    // The loop stalls for an hour past the deadline; the first tick after
    // resuming must still fail safe.
    let (mut relay, mut pin) = default_controller();
    let clock = ManualClock::new(0);

    relay
        .set(&mut pin, true, SwitchReason::User, clock.now_millis())
        .unwrap();
    clock.advance(3_600_000);
    let forced = relay.tick(&mut pin, clock.now_millis()).unwrap();
    assert_eq!(forced.kind, ForcedOffKind::SafetyTimeout);
    assert!(!pin.is_energized());
}

#[test]
fn counters_accumulate_across_cycles_and_survive_restore() {
    let (mut relay, mut pin) = default_controller();
    let clock = ManualClock::new(0);

    for _ in 0..3 {
        clock.advance(2_000);
        relay
            .set(&mut pin, true, SwitchReason::User, clock.now_millis())
            .unwrap();
        clock.advance(10_000);
        relay
            .set(&mut pin, false, SwitchReason::User, clock.now_millis())
            .unwrap();
    }
    assert_eq!(relay.stats().total_cycles, 3);
    assert_eq!(relay.stats().total_runtime_ms, 30_000);
    assert_eq!(relay.stats().power_on_count, 3);

    // Reboot: counters restored, runtime state fresh.
    let restored = RelayController::new(&RelayConfig::default(), Some(*relay.stats()));
    assert_eq!(restored.stats().total_cycles, 3);
    assert!(!restored.is_on());
}

#[test]
fn gpio_fault_during_forced_off_still_degrades_safely() {
    let (mut relay, mut pin) = default_controller();
    let clock = ManualClock::new(0);

    relay
        .set(&mut pin, true, SwitchReason::User, clock.now_millis())
        .unwrap();

    // The output stage dies while ON; the timeout path must still resolve
    // to logical OFF with the degraded flag latched.
    pin.fail_writes = true;
    clock.advance(400_000);
    let forced = relay.tick(&mut pin, clock.now_millis());
    assert!(forced.is_some());
    assert!(!relay.is_on());
    assert!(relay.is_degraded());

    // Degraded system refuses to energise again.
    pin.fail_writes = false;
    clock.advance(10_000);
    assert_eq!(
        relay.set(&mut pin, true, SwitchReason::User, clock.now_millis()),
        Err(RelayError::HardwareFault)
    );
}
