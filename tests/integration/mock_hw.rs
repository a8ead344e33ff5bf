//! Mock adapters for integration tests.
//!
//! Records every actuator call and transports bytes through scripted
//! in-memory channels, so the full dispatcher loop runs without sockets,
//! GPIO, or wall-clock time.

use core::net::Ipv4Addr;
use std::collections::VecDeque;

use relayguard::app::events::AppEvent;
use relayguard::app::ports::{EventSink, RelayPort};
use relayguard::error::RelayError;
use relayguard::http::transport::{Listener, Transport, TransportError};

// ── Relay pin mock ────────────────────────────────────────────

/// Records the level history so tests can assert on the exact sequence of
/// physical writes.
pub struct MockRelayPin {
    pub levels: Vec<bool>,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockRelayPin {
    pub fn new() -> Self {
        Self {
            levels: Vec::new(),
            fail_writes: false,
        }
    }

    pub fn last_level(&self) -> Option<bool> {
        self.levels.last().copied()
    }
}

impl Default for MockRelayPin {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayPort for MockRelayPin {
    fn set_energized(&mut self, on: bool) -> Result<(), RelayError> {
        if self.fail_writes {
            return Err(RelayError::HardwareFault);
        }
        self.levels.push(on);
        Ok(())
    }

    fn is_energized(&self) -> bool {
        self.last_level().unwrap_or(false)
    }

    fn pin(&self) -> i32 {
        18
    }
}

// ── Event sink mock ───────────────────────────────────────────

/// Collects emitted events for assertion.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_forced_off(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::ForcedOff { .. }))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}

// ── Scripted transport + listener ─────────────────────────────

/// A transport whose reads follow a script (one entry per chunk) and whose
/// writes are captured for inspection.
pub struct ScriptedConn {
    reads: VecDeque<Vec<u8>>,
    pub written: std::rc::Rc<std::cell::RefCell<Vec<u8>>>,
}

#[allow(dead_code)]
impl ScriptedConn {
    pub fn new(reads: Vec<Vec<u8>>) -> Self {
        Self {
            reads: reads.into(),
            written: std::rc::Rc::new(std::cell::RefCell::new(Vec::new())),
        }
    }

    /// Handle to the captured response bytes, usable after the dispatcher
    /// has consumed the connection.
    pub fn output(&self) -> std::rc::Rc<std::cell::RefCell<Vec<u8>>> {
        self.written.clone()
    }
}

impl Transport for ScriptedConn {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.reads.pop_front() {
            Some(mut data) => {
                let n = data.len().min(buf.len());
                let rest = data.split_off(n);
                buf[..n].copy_from_slice(&data);
                if !rest.is_empty() {
                    self.reads.push_front(rest);
                }
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.written.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Hands out scripted connections one per poll, like a non-blocking accept.
pub struct ScriptedListener {
    pending: VecDeque<(ScriptedConn, Ipv4Addr)>,
}

#[allow(dead_code)]
impl ScriptedListener {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    pub fn push(&mut self, conn: ScriptedConn, peer: Ipv4Addr) {
        self.pending.push_back((conn, peer));
    }
}

impl Default for ScriptedListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Listener for ScriptedListener {
    type Conn = ScriptedConn;

    fn poll_accept(&mut self) -> Option<(ScriptedConn, Ipv4Addr)> {
        self.pending.pop_front()
    }
}

// ── Response helpers ──────────────────────────────────────────

/// Split captured wire bytes into (status code, body text).
#[allow(dead_code)]
pub fn parse_response(raw: &[u8]) -> (u16, String) {
    let text = String::from_utf8_lossy(raw);
    let status = text
        .split(' ')
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("status line");
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_default();
    (status, body)
}

/// Pull the `session_id` cookie out of a captured response.
#[allow(dead_code)]
pub fn extract_session_cookie(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let after = text.split("Set-Cookie: session_id=").nth(1)?;
    Some(after.split(';').next()?.to_string())
}
