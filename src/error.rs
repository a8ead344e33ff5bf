//! Unified error types for the relayguard firmware.
//!
//! Follows embedded best practice: a single `Error` enum that every subsystem
//! can convert into, keeping the top-level dispatch loop's error handling
//! uniform. All variants are `Copy` so they can be cheaply passed between the
//! relay controller, the security manager, and the HTTP dispatcher without
//! allocation — and without dragging attacker-supplied data along with them
//! (error text never echoes raw input).

use core::fmt;

use crate::security::validate::Field;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A relay operation was refused or the output stage failed.
    Relay(RelayError),
    /// A security gate (auth, session, CSRF, rate limit, input) rejected.
    Security(SecurityError),
    /// The HTTP layer could not accept or parse a request.
    Http(HttpError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// Peripheral or network initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relay(e) => write!(f, "relay: {e}"),
            Self::Security(e) => write!(f, "security: {e}"),
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Relay errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// A user-initiated switch arrived inside the minimum switch interval.
    RapidSwitchRejected,
    /// The GPIO output stage failed. Fatal: the controller engages the
    /// fail-safe path and latches the degraded flag.
    HardwareFault,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RapidSwitchRejected => write!(f, "switching too rapidly"),
            Self::HardwareFault => write!(f, "hardware fault"),
        }
    }
}

impl From<RelayError> for Error {
    fn from(e: RelayError) -> Self {
        Self::Relay(e)
    }
}

// ---------------------------------------------------------------------------
// Security errors
// ---------------------------------------------------------------------------

/// Rejections from the security manager's gating chain.
///
/// Each variant maps 1:1 to a fixed HTTP status and a generic user-facing
/// message in `http::response`. `InvalidInput` carries only the *name* of
/// the offending field, never its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityError {
    InvalidCredentials,
    /// Too many failed logins; rejected until the lockout expires.
    LockedOut,
    SessionExpired,
    /// Session presented from a different address than it was issued to.
    OwnerMismatch,
    /// CSRF token missing, wrong, expired, or already consumed.
    CsrfMismatch,
    RateLimited,
    /// A request field failed whitelist validation.
    InvalidInput(Field),
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::LockedOut => write!(f, "account locked"),
            Self::SessionExpired => write!(f, "session expired"),
            Self::OwnerMismatch => write!(f, "session owner mismatch"),
            Self::CsrfMismatch => write!(f, "CSRF token invalid"),
            Self::RateLimited => write!(f, "rate limit exceeded"),
            Self::InvalidInput(field) => write!(f, "invalid input: {field}"),
        }
    }
}

impl From<SecurityError> for Error {
    fn from(e: SecurityError) -> Self {
        Self::Security(e)
    }
}

// ---------------------------------------------------------------------------
// HTTP errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// Request exceeded the fixed per-connection buffer.
    PayloadTooLarge,
    /// Malformed request line, headers, or body.
    BadRequest,
    NotFound,
    MethodNotAllowed,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge => write!(f, "payload too large"),
            Self::BadRequest => write!(f, "bad request"),
            Self::NotFound => write!(f, "not found"),
            Self::MethodNotAllowed => write!(f, "method not allowed"),
        }
    }
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
