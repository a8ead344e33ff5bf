//! Outbound application events.
//!
//! The core emits these through the [`EventSink`](super::ports::EventSink)
//! port. Adapters on the other side decide what to do with them — log to
//! serial, publish over the network, etc. Events carry enough to reconstruct
//! what happened, but never credentials or raw request bytes.

use core::net::Ipv4Addr;

use crate::relay::{ForcedOffKind, SwitchReason};

/// Structured events emitted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// System came up; carries the initial relay state.
    Started { relay_on: bool },

    /// The relay transitioned between states.
    RelaySwitched { on: bool, reason: SwitchReason },

    /// A safety timer forced the relay OFF.
    ForcedOff { kind: ForcedOffKind, on_for_ms: u64 },

    /// The output stage failed; fail-safe engaged, system degraded.
    FailSafeEngaged,

    /// A login attempt failed.
    LoginFailed { ip: Ipv4Addr },

    /// A client hit the login lockout.
    LockedOut { ip: Ipv4Addr },

    /// A session was issued.
    SessionCreated { ip: Ipv4Addr },

    /// A client exceeded the rate-limit ceiling.
    RateLimited { ip: Ipv4Addr },

    /// A request was answered (status code as sent on the wire).
    RequestServed { ip: Ipv4Addr, status: u16 },
}
