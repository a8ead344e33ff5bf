//! Port traits — the boundary between the core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ core (relay controller / dispatcher)
//! ```
//!
//! Driven adapters (GPIO, clock, storage, event sinks) implement these
//! traits. The core consumes them via generics, so the safety-critical
//! logic never touches hardware directly and every test runs against mocks.

use crate::error::RelayError;
use crate::relay::RelayStats;

// ───────────────────────────────────────────────────────────────
// Clock port (monotonic time source)
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond counter. Immune to wall-clock adjustment and
/// never fails — every timing decision in the core keys off this.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Relay output port (core → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the relay output stage.
///
/// Implementations own the active-low translation: `energized = true`
/// always means "load powered", whatever the pin polarity.
pub trait RelayPort {
    /// Drive the output stage. A failure here is treated as fatal by the
    /// controller (fail-safe engages).
    fn set_energized(&mut self, on: bool) -> Result<(), RelayError>;

    /// Last level successfully driven (for status reporting and tests).
    fn is_energized(&self) -> bool;

    /// GPIO number this port drives (surfaced in status reads).
    fn pin(&self) -> i32;
}

// ───────────────────────────────────────────────────────────────
// Stats storage port (core ↔ persisted counters)
// ───────────────────────────────────────────────────────────────

/// Persistence for the relay's usage counters.
///
/// Counters are the only state that survives reboot. Implementations
/// must tolerate a missing or corrupt blob by returning `None` — the
/// controller then starts from zeroed counters.
pub trait StatsStore {
    fn load(&self) -> Option<RelayStats>;
    /// Best-effort write; the caller logs failures and carries on.
    fn save(&mut self, stats: &RelayStats) -> Result<(), StorageError>;
}

/// Errors from [`StatsStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Storage partition is full.
    Full,
    /// Generic I/O error from the backend.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (core → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s through
/// this port. Adapters decide where they go (serial log today; an MQTT or
/// syslog adapter would implement the same trait). Implementations must be
/// fire-and-forget — the dispatch loop never waits on a sink.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
