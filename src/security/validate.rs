//! Whitelist-based input validation.
//!
//! Every externally-supplied field passes through one of these validators
//! before it reaches the relay controller or configuration. Failures carry
//! only the [`Field`] name — the offending value itself never travels into
//! error text or responses.

use crate::error::SecurityError;
use crate::pins;

/// Names of validated request fields, as surfaced in `InvalidInput` errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    RelayCommand,
    PinNumber,
    Timeout,
    Port,
    Ssid,
    DeviceName,
    Username,
    Password,
}

impl core::fmt::Display for Field {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::RelayCommand => "relay_command",
            Self::PinNumber => "pin_number",
            Self::Timeout => "timeout",
            Self::Port => "port",
            Self::Ssid => "ssid",
            Self::DeviceName => "device_name",
            Self::Username => "username",
            Self::Password => "password",
        };
        f.write_str(name)
    }
}

fn reject(field: Field) -> SecurityError {
    SecurityError::InvalidInput(field)
}

/// Parse a relay command. Accepted spellings (case-insensitive):
/// `on`, `off`, `true`, `false`, `1`, `0` → a target state; `toggle` → None.
pub fn relay_command(raw: &str) -> Result<Option<bool>, SecurityError> {
    // Bounded before lowercasing; a relay command is never longer than this.
    if raw.len() > 8 {
        return Err(reject(Field::RelayCommand));
    }
    let mut lowered = heapless::String::<8>::new();
    for c in raw.trim().chars() {
        lowered
            .push(c.to_ascii_lowercase())
            .map_err(|()| reject(Field::RelayCommand))?;
    }
    match lowered.as_str() {
        "on" | "true" | "1" => Ok(Some(true)),
        "off" | "false" | "0" => Ok(Some(false)),
        "toggle" => Ok(None),
        _ => Err(reject(Field::RelayCommand)),
    }
}

/// GPIO pin number, bounded to the board's usable range.
pub fn pin_number(raw: &str) -> Result<i32, SecurityError> {
    let pin: i32 = raw.trim().parse().map_err(|_| reject(Field::PinNumber))?;
    if pins::is_valid_relay_gpio(pin) {
        Ok(pin)
    } else {
        Err(reject(Field::PinNumber))
    }
}

/// Timeout in seconds: positive, at most 7 days.
pub fn timeout_secs(raw: &str) -> Result<u32, SecurityError> {
    const MAX_TIMEOUT_SECS: u32 = 604_800;
    let t: u32 = raw.trim().parse().map_err(|_| reject(Field::Timeout))?;
    if t > 0 && t <= MAX_TIMEOUT_SECS {
        Ok(t)
    } else {
        Err(reject(Field::Timeout))
    }
}

/// TCP port number (1–65535).
pub fn port(raw: &str) -> Result<u16, SecurityError> {
    match raw.trim().parse::<u16>() {
        Ok(p) if p >= 1 => Ok(p),
        _ => Err(reject(Field::Port)),
    }
}

/// WiFi SSID: 1–32 printable-ASCII characters.
pub fn ssid(raw: &str) -> Result<&str, SecurityError> {
    if (1..=32).contains(&raw.len()) && raw.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        Ok(raw)
    } else {
        Err(reject(Field::Ssid))
    }
}

/// Device name: 1–50 characters from `[A-Za-z0-9_-]`.
pub fn device_name(raw: &str) -> Result<&str, SecurityError> {
    if (1..=50).contains(&raw.len())
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        Ok(raw)
    } else {
        Err(reject(Field::DeviceName))
    }
}

/// Login username: 1–32 characters, printable ASCII.
pub fn username(raw: &str) -> Result<&str, SecurityError> {
    if (1..=32).contains(&raw.len()) && raw.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        Ok(raw)
    } else {
        Err(reject(Field::Username))
    }
}

/// Login password: 1–64 bytes (content unrestricted, never logged).
pub fn password(raw: &str) -> Result<&str, SecurityError> {
    if (1..=64).contains(&raw.len()) {
        Ok(raw)
    } else {
        Err(reject(Field::Password))
    }
}
