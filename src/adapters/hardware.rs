//! Relay output driver.
//!
//! Generic over any `embedded-hal` [`OutputPin`], which covers the real
//! `esp-idf-hal` GPIO driver on the device and a trivial in-memory pin on
//! the host. The driver owns the one piece of polarity knowledge in the
//! system: `active_low` relays energise on a LOW output.
//!
//! A pin-level write error surfaces as [`RelayError::HardwareFault`] — the
//! controller treats that as fatal and engages the fail-safe path.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::RelayPort;
use crate::config::RelayConfig;
use crate::error::RelayError;

/// Drives the relay coil through an `OutputPin`.
pub struct RelayDriver<P: OutputPin> {
    pin: P,
    pin_no: i32,
    active_low: bool,
    energized: bool,
}

impl<P: OutputPin> RelayDriver<P> {
    pub fn new(pin: P, cfg: &RelayConfig) -> Self {
        Self {
            pin,
            pin_no: cfg.pin,
            active_low: cfg.active_low,
            energized: false,
        }
    }
}

impl<P: OutputPin> RelayPort for RelayDriver<P> {
    fn set_energized(&mut self, on: bool) -> Result<(), RelayError> {
        // active_low: LOW = energised, HIGH = released.
        let drive_high = on ^ self.active_low;
        let result = if drive_high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => {
                self.energized = on;
                Ok(())
            }
            Err(_) => {
                warn!("GPIO{} write failed", self.pin_no);
                Err(RelayError::HardwareFault)
            }
        }
    }

    fn is_energized(&self) -> bool {
        self.energized
    }

    fn pin(&self) -> i32 {
        self.pin_no
    }
}

// ---------------------------------------------------------------------------
// Host simulation pin
// ---------------------------------------------------------------------------

/// In-memory pin for host builds and tests. Records the driven level.
#[derive(Debug, Default)]
pub struct SimPin {
    /// Last electrical level driven (true = HIGH).
    pub level_high: bool,
}

impl embedded_hal::digital::ErrorType for SimPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level_high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level_high = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ESP-IDF construction
// ---------------------------------------------------------------------------

/// Build the production driver on the configured GPIO.
#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub fn esp_relay_driver(
    cfg: &RelayConfig,
) -> anyhow::Result<RelayDriver<esp_idf_hal::gpio::PinDriver<'static, esp_idf_hal::gpio::AnyOutputPin, esp_idf_hal::gpio::Output>>>
{
    use esp_idf_hal::gpio::{AnyOutputPin, PinDriver};

    // SAFETY: the relay pin is claimed exactly once, at boot, from the
    // validated config; no other driver touches it.
    let pin = unsafe { AnyOutputPin::new(cfg.pin) };
    let driver = PinDriver::output(pin)?;
    Ok(RelayDriver::new(driver, cfg))
}
