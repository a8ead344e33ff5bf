//! Security manager — authentication, sessions, CSRF, rate limiting.
//!
//! Owns every security table (all fixed-capacity) and exposes the gates the
//! dispatcher applies to each request. For a state-mutating request the
//! ordering is strict:
//!
//! 1. rate limit (every request, authenticated or not)
//! 2. session validation
//! 3. CSRF validation (single-use, rotated)
//! 4. input sanitation
//! 5. relay operation
//!
//! Any failure short-circuits before the relay is touched.

pub mod rate_limit;
pub mod session;
pub mod validate;

use core::net::Ipv4Addr;

use log::warn;

use crate::config::SystemConfig;
use crate::error::SecurityError;
use rate_limit::{LoginGuard, RateLimiter};
use session::{LoginGrant, SessionTable, TokenGenerator, TokenText};

/// Facade over the security tables. One instance per boot, owned by the
/// dispatcher; nothing here is shared or locked.
pub struct SecurityManager {
    sessions: SessionTable,
    tokens: TokenGenerator,
    limiter: RateLimiter,
    logins: LoginGuard,
    username: heapless::String<32>,
    password: heapless::String<64>,
}

impl SecurityManager {
    pub fn from_config(cfg: &SystemConfig) -> Self {
        Self {
            sessions: SessionTable::new(
                cfg.security.session_timeout_secs,
                cfg.security.csrf_lifetime_secs,
            ),
            tokens: TokenGenerator::new(),
            limiter: RateLimiter::new(cfg.security.rate_limit, cfg.security.rate_window_secs),
            logins: LoginGuard::new(cfg.security.max_login_attempts, cfg.security.lockout_secs),
            username: cfg.server.auth_username.clone(),
            password: cfg.server.auth_password.clone(),
        }
    }

    /// Gate 1: fixed-window rate limit, applied to every request.
    pub fn check_rate_limit(&mut self, ip: Ipv4Addr, now: u64) -> Result<(), SecurityError> {
        self.limiter.check(ip, now)
    }

    /// Full login path: lockout gate → input sanitation → constant-time
    /// credential check → session + CSRF issuance.
    pub fn authenticate(
        &mut self,
        ip: Ipv4Addr,
        username: &str,
        password: &str,
        now: u64,
    ) -> Result<LoginGrant, SecurityError> {
        self.logins.check(ip, now)?;

        let username = validate::username(username)?;
        let password = validate::password(password)?;

        // Single combined flag: a username miss and a password miss are
        // indistinguishable, in result and in timing.
        let ok = ct_eq(username.as_bytes(), self.username.as_bytes())
            & ct_eq(password.as_bytes(), self.password.as_bytes());
        if !ok {
            warn!("authentication failed from {ip}");
            self.logins.record_failure(ip, now);
            return Err(SecurityError::InvalidCredentials);
        }

        self.logins.record_success(ip);
        Ok(self.sessions.create(&mut self.tokens, ip, now))
    }

    /// Gate 2: session validity + owner binding; refreshes expiry.
    pub fn validate_session(
        &mut self,
        token: &str,
        ip: Ipv4Addr,
        now: u64,
    ) -> Result<(), SecurityError> {
        self.sessions.validate(token, ip, now)
    }

    /// Gate 3: consume the session's single-use CSRF token; returns the
    /// rotated replacement for the response body.
    pub fn consume_csrf(
        &mut self,
        session_token: &str,
        supplied: &str,
        now: u64,
    ) -> Result<TokenText, SecurityError> {
        self.sessions
            .consume_csrf(&mut self.tokens, session_token, supplied, now)
    }

    /// Explicit logout. Returns whether a session was destroyed.
    pub fn logout(&mut self, token: &str) -> bool {
        self.sessions.remove(token)
    }

    /// Periodic table maintenance: drop expired sessions, elapsed rate
    /// windows, and stale lockout records.
    pub fn sweep(&mut self, now: u64) {
        self.sessions.sweep(now);
        self.limiter.sweep(now);
        self.logins.sweep(now);
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions.live_count()
    }
}

/// Constant-time byte-slice comparison. Length mismatch short-circuits —
/// lengths are not secret, contents are.
fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
