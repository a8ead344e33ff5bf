//! GPIO pin assignments for the relayguard main board.
//!
//! Single source of truth — drivers and config validation reference this
//! module rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Relay output
// ---------------------------------------------------------------------------

/// Default relay coil drive pin. Overridable via `relay.pin` in config.
pub const RELAY_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// On-board status LED: solid when the system is up and WiFi-associated.
pub const STATUS_LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// GPIO range validation
// ---------------------------------------------------------------------------

/// Highest user-assignable GPIO on the target board.
pub const MAX_GPIO: i32 = 28;

/// Pins reserved for the on-board radio module — never valid relay outputs.
pub const RESERVED_GPIOS: [i32; 3] = [23, 24, 25];

/// Whether `pin` may drive the relay output stage.
pub fn is_valid_relay_gpio(pin: i32) -> bool {
    (0..=MAX_GPIO).contains(&pin) && !RESERVED_GPIOS.contains(&pin)
}
