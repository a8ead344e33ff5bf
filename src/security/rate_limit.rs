//! Per-client rate limiting and login lockout.
//!
//! Two *independent* fixed-capacity tables keyed by client address
//! (deliberately not merged — see DESIGN.md):
//!
//! - [`RateLimiter`] — fixed-window request counter applied to every
//!   request, authenticated or not.
//! - [`LoginGuard`] — consecutive-failure counter that locks an address
//!   out of the login endpoint entirely.
//!
//! Both tables are `heapless` index maps: insertion under full capacity
//! evicts the oldest-expiring entry, never blocks, never allocates.

use core::net::Ipv4Addr;

use log::warn;

use crate::error::SecurityError;

/// Capacity of each per-client table (must be a power of two for
/// `FnvIndexMap`).
pub const MAX_CLIENTS: usize = 16;

// ---------------------------------------------------------------------------
// Fixed-window rate limiter
// ---------------------------------------------------------------------------

/// One client's window. The count includes rejected requests, so sustained
/// abuse does not earn a fresh allowance mid-window.
#[derive(Debug, Clone, Copy)]
struct Window {
    window_start_ms: u64,
    count: u32,
}

/// Fixed-window request limiter, one window per client address.
pub struct RateLimiter {
    windows: heapless::FnvIndexMap<u32, Window, MAX_CLIENTS>,
    ceiling: u32,
    window_ms: u64,
}

impl RateLimiter {
    pub fn new(ceiling: u32, window_secs: u32) -> Self {
        Self {
            windows: heapless::FnvIndexMap::new(),
            ceiling,
            window_ms: u64::from(window_secs) * 1000,
        }
    }

    /// Count one request from `ip`. Admits exactly `ceiling` requests per
    /// window; the next one fails with `RateLimited`.
    pub fn check(&mut self, ip: Ipv4Addr, now: u64) -> Result<(), SecurityError> {
        let key = u32::from(ip);

        if let Some(w) = self.windows.get_mut(&key) {
            if now.saturating_sub(w.window_start_ms) >= self.window_ms {
                // Window elapsed — start a fresh one.
                w.window_start_ms = now;
                w.count = 0;
            }
            w.count = w.count.saturating_add(1);
            if w.count > self.ceiling {
                warn!("rate limit exceeded for {ip}");
                return Err(SecurityError::RateLimited);
            }
            return Ok(());
        }

        self.insert(
            key,
            Window {
                window_start_ms: now,
                count: 1,
            },
        );
        Ok(())
    }

    /// Drop windows that have fully elapsed. Called from the periodic sweep.
    pub fn sweep(&mut self, now: u64) {
        let mut stale: heapless::Vec<u32, MAX_CLIENTS> = heapless::Vec::new();
        for (key, w) in &self.windows {
            if now.saturating_sub(w.window_start_ms) >= self.window_ms {
                let _ = stale.push(*key);
            }
        }
        for key in &stale {
            let _ = self.windows.remove(key);
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Insert, evicting the entry with the oldest window when full.
    fn insert(&mut self, key: u32, window: Window) {
        if self.windows.len() == MAX_CLIENTS {
            if let Some(victim) = self
                .windows
                .iter()
                .min_by_key(|(_, w)| w.window_start_ms)
                .map(|(k, _)| *k)
            {
                let _ = self.windows.remove(&victim);
            }
        }
        // Cannot fail: a slot was just freed if the map was full.
        let _ = self.windows.insert(key, window);
    }
}

// ---------------------------------------------------------------------------
// Login lockout
// ---------------------------------------------------------------------------

/// Per-client login failure record.
#[derive(Debug, Clone, Copy)]
struct AttemptRecord {
    failures: u8,
    /// 0 = not locked.
    locked_until_ms: u64,
    last_failure_ms: u64,
}

/// Tracks failed logins per client address and enforces lockout.
pub struct LoginGuard {
    records: heapless::FnvIndexMap<u32, AttemptRecord, MAX_CLIENTS>,
    max_attempts: u8,
    lockout_ms: u64,
}

impl LoginGuard {
    pub fn new(max_attempts: u8, lockout_secs: u32) -> Self {
        Self {
            records: heapless::FnvIndexMap::new(),
            max_attempts,
            lockout_ms: u64::from(lockout_secs) * 1000,
        }
    }

    /// Gate a login attempt *before* checking credentials. While locked,
    /// even correct credentials are rejected.
    pub fn check(&self, ip: Ipv4Addr, now: u64) -> Result<(), SecurityError> {
        if let Some(r) = self.records.get(&u32::from(ip)) {
            if r.locked_until_ms > now {
                return Err(SecurityError::LockedOut);
            }
        }
        Ok(())
    }

    /// Record a failed credential check. Reaching `max_attempts` starts
    /// the lockout.
    pub fn record_failure(&mut self, ip: Ipv4Addr, now: u64) {
        let key = u32::from(ip);
        let mut record = self.records.get(&key).copied().unwrap_or(AttemptRecord {
            failures: 0,
            locked_until_ms: 0,
            last_failure_ms: 0,
        });

        record.failures = record.failures.saturating_add(1);
        record.last_failure_ms = now;
        if record.failures >= self.max_attempts {
            record.locked_until_ms = now + self.lockout_ms;
            warn!("login lockout engaged for {ip}");
        }
        self.insert(key, record);
    }

    /// A successful login clears the failure history.
    pub fn record_success(&mut self, ip: Ipv4Addr) {
        let _ = self.records.remove(&u32::from(ip));
    }

    /// Drop records whose lockout has expired and whose failures are stale
    /// (older than one lockout period).
    pub fn sweep(&mut self, now: u64) {
        let mut stale: heapless::Vec<u32, MAX_CLIENTS> = heapless::Vec::new();
        for (key, r) in &self.records {
            let locked = r.locked_until_ms > now;
            let recent = now.saturating_sub(r.last_failure_ms) < self.lockout_ms;
            if !locked && !recent {
                let _ = stale.push(*key);
            }
        }
        for key in &stale {
            let _ = self.records.remove(key);
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.records.len()
    }

    /// Insert, evicting the oldest-expiring record when full.
    fn insert(&mut self, key: u32, record: AttemptRecord) {
        if self.records.len() == MAX_CLIENTS && !self.records.contains_key(&key) {
            if let Some(victim) = self
                .records
                .iter()
                .min_by_key(|(_, r)| r.locked_until_ms.max(r.last_failure_ms))
                .map(|(k, _)| *k)
            {
                let _ = self.records.remove(&victim);
            }
        }
        let _ = self.records.insert(key, record);
    }
}
