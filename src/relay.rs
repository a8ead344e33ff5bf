//! Relay safety controller.
//!
//! Owns the relay's logical state, both safety timers, and the usage
//! counters. Every state change goes through [`RelayController::set`];
//! the physical output and the logical state can never diverge for longer
//! than the caller's loop iteration.
//!
//! ## Fail-safe model
//!
//! The relay can only be *kept* ON by a live control loop: the dispatcher
//! calls [`RelayController::tick`] once per iteration, and the first tick at
//! or past a timer boundary forces the relay OFF. There is no background
//! timer to cancel or re-arm — a stalled loop stops serving HTTP *and* stops
//! extending nothing, because the timers are evaluated against the monotonic
//! clock, anchored at the ON edge.
//!
//! A GPIO write failure is fatal: the controller drives OFF best-effort and
//! latches the `degraded` flag, which status reads surface until reboot.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{RelayPort, StatsStore};
use crate::config::RelayConfig;
use crate::error::RelayError;

// ---------------------------------------------------------------------------
// Transition labels
// ---------------------------------------------------------------------------

/// Who asked for a transition. Timer- and emergency-initiated transitions
/// bypass the rapid-switch guard; user commands do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchReason {
    User,
    Timeout,
    Emergency,
}

/// Which safety timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedOffKind {
    /// `safety_timeout` elapsed since the ON edge.
    SafetyTimeout,
    /// The single-session ceiling (`max_on_time`) was reached.
    MaxOnTime,
}

impl core::fmt::Display for ForcedOffKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SafetyTimeout => write!(f, "safety timeout"),
            Self::MaxOnTime => write!(f, "maximum on-time reached"),
        }
    }
}

/// Returned by [`RelayController::tick`] when a timer forced the relay OFF,
/// so the dispatcher can log/emit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForcedTransition {
    pub kind: ForcedOffKind,
    /// How long the relay had been ON when the timer fired.
    pub on_for_ms: u64,
}

// ---------------------------------------------------------------------------
// Safety timers
// ---------------------------------------------------------------------------

/// Timer configuration, frozen at boot. A value of 0 disables that timer.
#[derive(Debug, Clone, Copy)]
struct SafetyTimers {
    safety_timeout_ms: u64,
    max_on_time_ms: u64,
    min_switch_interval_ms: u64,
}

impl SafetyTimers {
    fn from_config(cfg: &RelayConfig) -> Self {
        Self {
            safety_timeout_ms: u64::from(cfg.safety_timeout_secs) * 1000,
            max_on_time_ms: u64::from(cfg.max_on_time_secs) * 1000,
            min_switch_interval_ms: u64::from(cfg.min_switch_interval_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Usage counters
// ---------------------------------------------------------------------------

/// Counters that survive reboot (persisted as a postcard blob via
/// [`StatsStore`]). Everything else in the controller is reconstructed
/// at boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    /// Completed ON→OFF cycles.
    pub total_cycles: u32,
    /// Accumulated ON time across completed sessions (milliseconds).
    pub total_runtime_ms: u64,
    /// Number of ON events.
    pub power_on_count: u32,
}

/// Point-in-time status snapshot for `/api/status`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RelayStatus {
    pub on: bool,
    pub pin: i32,
    /// Length of the current ON session, 0 when OFF (milliseconds).
    pub session_on_ms: u64,
    pub total_runtime_ms: u64,
    pub total_cycles: u32,
    pub power_on_count: u32,
    /// Fail-safe engaged: a GPIO fault occurred since boot.
    pub degraded: bool,
}

/// Derived statistics for `/api/stats`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RelayStatistics {
    pub total_cycles: u32,
    pub total_runtime_ms: u64,
    pub power_on_count: u32,
    pub current_session_ms: u64,
    pub runtime_including_current_ms: u64,
    pub average_session_ms: u64,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// The relay safety controller. Exclusive owner of the relay's logical
/// state; the HTTP layer only ever calls the operations below.
pub struct RelayController {
    on: bool,
    /// Monotonic instant of the last real transition.
    last_transition_ms: u64,
    /// Monotonic instant of the current ON edge (valid while `on`).
    session_start_ms: u64,
    timers: SafetyTimers,
    stats: RelayStats,
    stats_dirty: bool,
    degraded: bool,
}

impl RelayController {
    /// Construct from configuration and (optionally) counters restored
    /// from persistent storage.
    pub fn new(cfg: &RelayConfig, restored: Option<RelayStats>) -> Self {
        Self {
            on: false,
            last_transition_ms: 0,
            session_start_ms: 0,
            timers: SafetyTimers::from_config(cfg),
            stats: restored.unwrap_or_default(),
            stats_dirty: false,
            degraded: false,
        }
    }

    /// Drive the configured initial state. Bypasses all guards — boot is
    /// not a user action.
    pub fn init(
        &mut self,
        gpio: &mut impl RelayPort,
        initial_on: bool,
        now: u64,
    ) -> Result<(), RelayError> {
        if gpio.set_energized(initial_on).is_err() {
            self.hardware_fault(gpio, now);
            return Err(RelayError::HardwareFault);
        }
        self.on = initial_on;
        self.last_transition_ms = now;
        if initial_on {
            self.session_start_ms = now;
            self.stats.power_on_count += 1;
        }
        info!(
            "relay initialised on GPIO{} ({})",
            gpio.pin(),
            if initial_on { "ON" } else { "OFF" }
        );
        Ok(())
    }

    // ── Operations ────────────────────────────────────────────

    /// Request a transition to `desired`.
    ///
    /// User-initiated requests inside the minimum switch interval fail with
    /// [`RelayError::RapidSwitchRejected`]. A request for the current state
    /// is an idempotent success and does **not** refresh any timing state,
    /// so the safety timers stay anchored at the real ON edge.
    pub fn set(
        &mut self,
        gpio: &mut impl RelayPort,
        desired: bool,
        reason: SwitchReason,
        now: u64,
    ) -> Result<(), RelayError> {
        if reason == SwitchReason::User
            && now.saturating_sub(self.last_transition_ms) < self.timers.min_switch_interval_ms
        {
            warn!("relay switching too rapidly, ignoring command");
            return Err(RelayError::RapidSwitchRejected);
        }

        if self.degraded && desired {
            // Output stage is unreliable; only OFF is honoured until reboot.
            return Err(RelayError::HardwareFault);
        }

        if desired == self.on {
            return Ok(());
        }

        if gpio.set_energized(desired).is_err() {
            self.hardware_fault(gpio, now);
            return Err(RelayError::HardwareFault);
        }

        self.last_transition_ms = now;
        if desired {
            self.session_start_ms = now;
            self.stats.power_on_count += 1;
            info!("relay turned ON ({reason:?})");
        } else {
            let session_ms = self.close_session(now);
            info!(
                "relay turned OFF ({reason:?}) — session duration {}s",
                session_ms / 1000
            );
        }
        self.on = desired;
        Ok(())
    }

    /// Convenience wrapper: transition to the opposite of the current state.
    pub fn toggle(
        &mut self,
        gpio: &mut impl RelayPort,
        reason: SwitchReason,
        now: u64,
    ) -> Result<bool, RelayError> {
        let desired = !self.on;
        self.set(gpio, desired, reason, now)?;
        Ok(desired)
    }

    /// Evaluate the safety timers. Call exactly once per dispatcher
    /// iteration; the first call at or past a boundary forces OFF and
    /// reports the transition.
    pub fn tick(&mut self, gpio: &mut impl RelayPort, now: u64) -> Option<ForcedTransition> {
        if !self.on {
            return None;
        }
        let on_for_ms = now.saturating_sub(self.last_transition_ms);

        let kind = if self.timers.safety_timeout_ms > 0 && on_for_ms >= self.timers.safety_timeout_ms
        {
            ForcedOffKind::SafetyTimeout
        } else if self.timers.max_on_time_ms > 0 && on_for_ms >= self.timers.max_on_time_ms {
            ForcedOffKind::MaxOnTime
        } else {
            return None;
        };

        warn!("{kind} — automatically turning OFF relay");
        // Timeout-initiated transitions cannot be refused; a GPIO fault here
        // lands in the fail-safe path and the flag is surfaced via status.
        let _ = self.set(gpio, false, SwitchReason::Timeout, now);
        Some(ForcedTransition { kind, on_for_ms })
    }

    /// Unconditionally force OFF, bypassing every guard. Never fails: a
    /// GPIO fault is absorbed into the degraded latch.
    pub fn emergency_stop(&mut self, gpio: &mut impl RelayPort, now: u64) {
        warn!("EMERGENCY STOP — relay forced OFF");
        if gpio.set_energized(false).is_err() {
            self.latch_degraded();
        }
        if self.on {
            self.close_session(now);
            self.on = false;
            self.last_transition_ms = now;
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Fail-safe engaged since boot (GPIO fault observed).
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Length of the current ON session; 0 when OFF.
    pub fn session_on_ms(&self, now: u64) -> u64 {
        if self.on {
            now.saturating_sub(self.session_start_ms)
        } else {
            0
        }
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// Snapshot for `/api/status`.
    pub fn status(&self, now: u64, pin: i32) -> RelayStatus {
        RelayStatus {
            on: self.on,
            pin,
            session_on_ms: self.session_on_ms(now),
            total_runtime_ms: self.stats.total_runtime_ms,
            total_cycles: self.stats.total_cycles,
            power_on_count: self.stats.power_on_count,
            degraded: self.degraded,
        }
    }

    /// Derived statistics for `/api/stats`.
    pub fn statistics(&self, now: u64) -> RelayStatistics {
        let current = self.session_on_ms(now);
        let average = if self.stats.total_cycles > 0 {
            self.stats.total_runtime_ms / u64::from(self.stats.total_cycles)
        } else {
            0
        };
        RelayStatistics {
            total_cycles: self.stats.total_cycles,
            total_runtime_ms: self.stats.total_runtime_ms,
            power_on_count: self.stats.power_on_count,
            current_session_ms: current,
            runtime_including_current_ms: self.stats.total_runtime_ms + current,
            average_session_ms: average,
        }
    }

    /// Zero the persisted counters.
    pub fn reset_statistics(&mut self) {
        self.stats = RelayStats::default();
        self.stats_dirty = true;
        info!("relay statistics reset");
    }

    // ── Persistence ───────────────────────────────────────────

    /// Flush counters to storage if they changed since the last flush.
    /// Returns `true` if a write happened.
    pub fn persist_if_dirty(&mut self, store: &mut impl StatsStore) -> bool {
        if !self.stats_dirty {
            return false;
        }
        match store.save(&self.stats) {
            Ok(()) => {
                self.stats_dirty = false;
                true
            }
            Err(e) => {
                warn!("failed to save relay statistics: {e}");
                false
            }
        }
    }

    // ── Internal ──────────────────────────────────────────────

    /// Accumulate the finished session into the counters.
    fn close_session(&mut self, now: u64) -> u64 {
        let session_ms = now.saturating_sub(self.session_start_ms);
        self.stats.total_runtime_ms += session_ms;
        self.stats.total_cycles += 1;
        self.stats_dirty = true;
        session_ms
    }

    /// GPIO fault path: best-effort OFF, close the books, latch degraded.
    fn hardware_fault(&mut self, gpio: &mut impl RelayPort, now: u64) {
        let _ = gpio.set_energized(false);
        if self.on {
            self.close_session(now);
            self.on = false;
            self.last_transition_ms = now;
        }
        self.latch_degraded();
    }

    fn latch_degraded(&mut self) {
        if !self.degraded {
            self.degraded = true;
            error!("GPIO fault — fail-safe engaged, system degraded");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
