//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to the
//! logger (UART / USB-CDC in production). Fire-and-forget by construction —
//! `log` macros never block the dispatch loop. A future MQTT or syslog
//! adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { relay_on } => {
                info!("START | relay={}", if *relay_on { "ON" } else { "OFF" });
            }
            AppEvent::RelaySwitched { on, reason } => {
                info!(
                    "RELAY | {} ({:?})",
                    if *on { "ON" } else { "OFF" },
                    reason
                );
            }
            AppEvent::ForcedOff { kind, on_for_ms } => {
                warn!("RELAY | forced OFF: {} after {}s", kind, on_for_ms / 1000);
            }
            AppEvent::FailSafeEngaged => {
                warn!("RELAY | fail-safe engaged — output stage degraded");
            }
            AppEvent::LoginFailed { ip } => {
                warn!("AUTH  | login failed from {ip}");
            }
            AppEvent::LockedOut { ip } => {
                warn!("AUTH  | lockout active for {ip}");
            }
            AppEvent::SessionCreated { ip } => {
                info!("AUTH  | session created for {ip}");
            }
            AppEvent::RateLimited { ip } => {
                warn!("HTTP  | rate limited {ip}");
            }
            AppEvent::RequestServed { ip, status } => {
                info!("HTTP  | {ip} -> {status}");
            }
        }
    }
}
