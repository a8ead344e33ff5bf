//! Cooperative HTTP dispatcher.
//!
//! A single-threaded poll loop: one call to
//! [`HttpDispatcher::poll_iteration`] is one unit of work. No threads, no
//! locks, no executor — "concurrency" is interleaved partial I/O across a
//! fixed arena of connection slots, each advanced one step per iteration
//! from its saved parse state.
//!
//! Ordering guarantee: the relay safety timers are evaluated **first** in
//! every iteration, before any connection I/O, so a forced OFF always
//! happens-before any response written in the same iteration and the
//! worst-case gap between two safety checks is one iteration.
//!
//! A slow or hostile client cannot stall the loop: reads are non-blocking,
//! per-connection buffers are fixed, and a connection that exceeds
//! `request_timeout` is dropped with its partial state — relay and session
//! state are never touched by connection teardown.

use core::net::Ipv4Addr;

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, RelayPort};
use crate::config::SystemConfig;
use crate::relay::RelayController;
use crate::security::SecurityManager;

use super::request::RequestBuffer;
use super::response::Response;
use super::routes::{self, HandlerEnv};
use super::transport::{Listener, Transport};

/// Size of the connection-slot arena. `server.max_connections` may be
/// configured lower, never higher.
pub const MAX_CONNECTIONS: usize = 4;

/// Table-eviction sweep cadence, in loop iterations.
const SWEEP_EVERY_ITERS: u64 = 256;

/// Bytes pulled from a transport per iteration step.
const READ_CHUNK: usize = 512;

// ---------------------------------------------------------------------------
// Per-connection state
// ---------------------------------------------------------------------------

/// Explicit per-connection phase, advanced one step per iteration.
/// "Processing" is not a stored state: a request is routed in the same
/// step that completes it, and the slot moves straight to `Writing`.
enum ConnPhase {
    Reading(RequestBuffer),
    Writing { bytes: Vec<u8>, written: usize },
}

struct ConnSlot<T> {
    transport: T,
    peer: Ipv4Addr,
    phase: ConnPhase,
    opened_at_ms: u64,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// The root request dispatcher. Owns the listener, the connection arena,
/// and the security manager; borrows the relay controller and hardware
/// ports per iteration.
pub struct HttpDispatcher<L: Listener> {
    listener: L,
    slots: [Option<ConnSlot<L::Conn>>; MAX_CONNECTIONS],
    security: SecurityManager,
    config: SystemConfig,
    request_timeout_ms: u64,
    max_connections: usize,
    iterations: u64,
    request_count: u64,
    boot_ms: u64,
}

impl<L: Listener> HttpDispatcher<L> {
    pub fn new(listener: L, config: SystemConfig, security: SecurityManager, boot_ms: u64) -> Self {
        let request_timeout_ms = u64::from(config.server.request_timeout_secs) * 1000;
        let max_connections = config.server.max_connections.min(MAX_CONNECTIONS);
        Self {
            listener,
            slots: core::array::from_fn(|_| None),
            security,
            config,
            request_timeout_ms,
            max_connections,
            iterations: 0,
            request_count: 0,
            boot_ms,
        }
    }

    /// Run one unit of work: safety tick → accept → advance connections →
    /// periodic sweep.
    pub fn poll_iteration(
        &mut self,
        relay: &mut RelayController,
        gpio: &mut impl RelayPort,
        sink: &mut impl EventSink,
        now: u64,
    ) {
        self.iterations += 1;

        // 1. Safety first: the relay timers are checked before any I/O, so
        //    a forced OFF precedes every response written this iteration.
        if let Some(forced) = relay.tick(gpio, now) {
            sink.emit(&AppEvent::ForcedOff {
                kind: forced.kind,
                on_for_ms: forced.on_for_ms,
            });
        }

        // 2. At most one new connection per iteration.
        if let Some((conn, peer)) = self.listener.poll_accept() {
            self.admit(conn, peer, now);
        }

        // 3. Advance every open connection one step.
        for i in 0..MAX_CONNECTIONS {
            self.advance_slot(i, relay, gpio, sink, now);
        }

        // 4. Periodic table maintenance.
        if self.iterations % SWEEP_EVERY_ITERS == 0 {
            self.security.sweep(now);
        }
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn open_connections(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn security(&mut self) -> &mut SecurityManager {
        &mut self.security
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    // ── Internal ──────────────────────────────────────────────

    fn admit(&mut self, conn: L::Conn, peer: Ipv4Addr, now: u64) {
        let in_use = self.open_connections();
        if in_use >= self.max_connections {
            // Over capacity: close immediately, discard nothing else.
            warn!("connection from {peer} refused (capacity)");
            drop(conn);
            return;
        }
        if let Some(free) = self.slots.iter().position(Option::is_none) {
            debug!("connection from {peer}");
            self.slots[free] = Some(ConnSlot {
                transport: conn,
                peer,
                phase: ConnPhase::Reading(RequestBuffer::new()),
                opened_at_ms: now,
            });
        }
    }

    /// Advance one slot a single step. The slot is taken out of the arena
    /// while it is worked on so the handler can borrow the dispatcher's
    /// security manager without aliasing.
    fn advance_slot(
        &mut self,
        index: usize,
        relay: &mut RelayController,
        gpio: &mut impl RelayPort,
        sink: &mut impl EventSink,
        now: u64,
    ) {
        let Some(mut slot) = self.slots[index].take() else {
            return;
        };

        // Timeout applies to the whole exchange, both phases.
        if now.saturating_sub(slot.opened_at_ms) >= self.request_timeout_ms {
            debug!("connection from {} timed out", slot.peer);
            return; // Slot stays empty; partial state is discarded.
        }

        let keep = match &mut slot.phase {
            ConnPhase::Reading(buf) => {
                match self.step_read(&mut slot.transport, buf, slot.peer, relay, gpio, sink, now) {
                    ReadOutcome::Pending => true,
                    ReadOutcome::Respond(response) => {
                        sink.emit(&AppEvent::RequestServed {
                            ip: slot.peer,
                            status: response.status,
                        });
                        slot.phase = ConnPhase::Writing {
                            bytes: response.to_bytes(),
                            written: 0,
                        };
                        true
                    }
                    ReadOutcome::Drop => false,
                }
            }
            ConnPhase::Writing { bytes, written } => {
                match slot.transport.write(&bytes[*written..]) {
                    Ok(n) => {
                        *written += n;
                        if *written == bytes.len() {
                            let _ = slot.transport.flush();
                            false // Response fully sent; connection closes.
                        } else {
                            true
                        }
                    }
                    Err(_) => false,
                }
            }
        };

        if keep {
            self.slots[index] = Some(slot);
        }
    }

    fn step_read(
        &mut self,
        transport: &mut L::Conn,
        buf: &mut RequestBuffer,
        peer: Ipv4Addr,
        relay: &mut RelayController,
        gpio: &mut impl RelayPort,
        sink: &mut impl EventSink,
        now: u64,
    ) -> ReadOutcome {
        let mut chunk = [0u8; READ_CHUNK];
        let n = match transport.read(&mut chunk) {
            Ok(0) => return ReadOutcome::Pending,
            Ok(n) => n,
            Err(_) => return ReadOutcome::Drop,
        };

        match buf.feed(&chunk[..n]) {
            Ok(false) => ReadOutcome::Pending,
            Ok(true) => {
                self.request_count += 1;
                let response = match buf.parse() {
                    Ok(req) => {
                        let mut env = HandlerEnv {
                            config: &self.config,
                            security: &mut self.security,
                            relay,
                            gpio,
                            sink,
                            now,
                            uptime_ms: now.saturating_sub(self.boot_ms),
                            request_count: self.request_count,
                        };
                        routes::dispatch(&req, peer, &mut env)
                    }
                    Err(e) => Response::from_error(e.into()),
                };
                ReadOutcome::Respond(response)
            }
            Err(e) => {
                // Oversized request: answer 413 and close after writing.
                info!("request from {peer} rejected: {e}");
                ReadOutcome::Respond(Response::from_error(e.into()))
            }
        }
    }
}

enum ReadOutcome {
    Pending,
    Respond(Response),
    Drop,
}
