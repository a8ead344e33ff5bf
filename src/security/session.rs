//! Session and CSRF token tables.
//!
//! Fixed-capacity, statically-sized state: a session is one slot in an
//! array of [`MAX_SESSIONS`]. Inserting into a full table evicts the
//! oldest-expiring slot — the table never grows and never blocks.
//!
//! Tokens are 16 opaque bytes (32 hex chars on the wire), derived by
//! HMAC-SHA256 over device-random input so they are unguessable even when
//! the host RNG is weak. Comparison is constant-time. One CSRF token lives
//! per session and is single-use: every successful validation consumes it
//! and issues a replacement.

use core::net::Ipv4Addr;

use log::{info, warn};

use crate::error::SecurityError;

// ── Constants ────────────────────────────────────────────────

/// Maximum number of concurrently live sessions.
pub const MAX_SESSIONS: usize = 8;

/// Raw token length in bytes. Hex-encoded to twice this on the wire.
pub const TOKEN_LEN: usize = 16;

/// Wire form of a token.
pub type TokenText = heapless::String<32>;

// ── Token ────────────────────────────────────────────────────

/// Opaque fixed-length token (session or CSRF).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token([u8; TOKEN_LEN]);

impl Token {
    pub fn to_hex(self) -> TokenText {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut out = TokenText::new();
        for b in self.0 {
            // Capacity is exactly 2 * TOKEN_LEN; pushes cannot fail.
            let _ = out.push(HEX[(b >> 4) as usize] as char);
            let _ = out.push(HEX[(b & 0x0f) as usize] as char);
        }
        out
    }

    pub fn from_hex(raw: &str) -> Option<Self> {
        if raw.len() != TOKEN_LEN * 2 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let mut bytes = [0u8; TOKEN_LEN];
        for (i, chunk) in raw.as_bytes().chunks_exact(2).enumerate() {
            let hi = (chunk[0] as char).to_digit(16)?;
            let lo = (chunk[1] as char).to_digit(16)?;
            bytes[i] = ((hi << 4) | lo) as u8;
        }
        Some(Self(bytes))
    }

    /// Constant-time equality — token comparison must not leak a prefix
    /// length through timing.
    pub fn ct_eq(&self, other: &Self) -> bool {
        let mut diff = 0u8;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

// ── Token generation ─────────────────────────────────────────

/// Derives fresh tokens from a boot-time random key, a per-token random
/// nonce, the monotonic clock, and a counter. Any one source repeating
/// still yields a unique, unguessable token.
pub struct TokenGenerator {
    key: [u8; 32],
    counter: u32,
}

impl TokenGenerator {
    pub fn new() -> Self {
        Self {
            key: fill_random_nonce(),
            counter: 0,
        }
    }

    /// Deterministic construction for tests.
    #[doc(hidden)]
    pub fn with_key(key: [u8; 32]) -> Self {
        Self { key, counter: 0 }
    }

    pub fn next(&mut self, now: u64) -> Token {
        self.counter = self.counter.wrapping_add(1);
        let mut msg = [0u8; 44];
        msg[..32].copy_from_slice(&fill_random_nonce());
        msg[32..40].copy_from_slice(&now.to_le_bytes());
        msg[40..44].copy_from_slice(&self.counter.to_le_bytes());
        let mac = hmac_sha256::HMAC::mac(msg, self.key);
        let mut token = [0u8; TOKEN_LEN];
        token.copy_from_slice(&mac[..TOKEN_LEN]);
        Token(token)
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ── Session ──────────────────────────────────────────────────

/// One authenticated session, bound to the address it was issued to.
#[derive(Debug, Clone, Copy)]
struct Session {
    token: Token,
    owner_ip: Ipv4Addr,
    last_seen_ms: u64,
    expires_at_ms: u64,
    csrf: CsrfToken,
}

/// The single live CSRF token bound to a session.
#[derive(Debug, Clone, Copy)]
struct CsrfToken {
    token: Token,
    expires_at_ms: u64,
}

/// Both tokens issued by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub session_token: TokenText,
    pub csrf_token: TokenText,
}

// ── Session table ────────────────────────────────────────────

/// Fixed-size table of live sessions.
pub struct SessionTable {
    slots: [Option<Session>; MAX_SESSIONS],
    session_lifetime_ms: u64,
    csrf_lifetime_ms: u64,
}

impl SessionTable {
    pub fn new(session_timeout_secs: u32, csrf_lifetime_secs: u32) -> Self {
        Self {
            slots: [None; MAX_SESSIONS],
            session_lifetime_ms: u64::from(session_timeout_secs) * 1000,
            csrf_lifetime_ms: u64::from(csrf_lifetime_secs) * 1000,
        }
    }

    /// Create a session for `ip`, evicting the oldest-expiring slot if the
    /// table is full. Returns the session and CSRF token pair.
    pub fn create(&mut self, tokens: &mut TokenGenerator, ip: Ipv4Addr, now: u64) -> LoginGrant {
        let token = self.unique_token(tokens, now);
        let csrf = CsrfToken {
            token: tokens.next(now),
            expires_at_ms: now + self.csrf_lifetime_ms,
        };
        let session = Session {
            token,
            owner_ip: ip,
            last_seen_ms: now,
            expires_at_ms: now + self.session_lifetime_ms,
            csrf,
        };

        let slot = self.free_or_evicted_slot(now);
        self.slots[slot] = Some(session);
        info!("session created for {ip}");

        LoginGrant {
            session_token: token.to_hex(),
            csrf_token: csrf.token.to_hex(),
        }
    }

    /// Validate a presented session token against `ip` and refresh its
    /// expiry. Unknown and expired tokens are indistinguishable to the
    /// caller.
    pub fn validate(
        &mut self,
        token_hex: &str,
        ip: Ipv4Addr,
        now: u64,
    ) -> Result<(), SecurityError> {
        let token = Token::from_hex(token_hex).ok_or(SecurityError::SessionExpired)?;
        let slot = self
            .find(&token)
            .ok_or(SecurityError::SessionExpired)?;

        // `find` only returns occupied slots; the else arm is unreachable.
        let Some(session) = self.slots[slot].as_mut() else {
            return Err(SecurityError::SessionExpired);
        };
        if now > session.expires_at_ms {
            self.slots[slot] = None;
            return Err(SecurityError::SessionExpired);
        }
        if session.owner_ip != ip {
            warn!("session owner mismatch from {ip}");
            return Err(SecurityError::OwnerMismatch);
        }
        session.last_seen_ms = now;
        session.expires_at_ms = now + self.session_lifetime_ms;
        Ok(())
    }

    /// Validate and consume the session's CSRF token. On success the token
    /// is rotated and the replacement returned for inclusion in the
    /// response; the consumed token will never validate again.
    pub fn consume_csrf(
        &mut self,
        tokens: &mut TokenGenerator,
        session_token_hex: &str,
        supplied_hex: &str,
        now: u64,
    ) -> Result<TokenText, SecurityError> {
        let token =
            Token::from_hex(session_token_hex).ok_or(SecurityError::SessionExpired)?;
        let slot = self.find(&token).ok_or(SecurityError::SessionExpired)?;
        let csrf_lifetime_ms = self.csrf_lifetime_ms;
        let Some(session) = self.slots[slot].as_mut() else {
            return Err(SecurityError::SessionExpired);
        };

        let supplied = Token::from_hex(supplied_hex).ok_or(SecurityError::CsrfMismatch)?;
        if now > session.csrf.expires_at_ms || !session.csrf.token.ct_eq(&supplied) {
            return Err(SecurityError::CsrfMismatch);
        }

        // Single-use: rotate on success.
        let fresh = tokens.next(now);
        session.csrf = CsrfToken {
            token: fresh,
            expires_at_ms: now + csrf_lifetime_ms,
        };
        Ok(fresh.to_hex())
    }

    /// Destroy a session (logout). Returns whether one was removed.
    pub fn remove(&mut self, token_hex: &str) -> bool {
        let Some(token) = Token::from_hex(token_hex) else {
            return false;
        };
        match self.find(&token) {
            Some(slot) => {
                self.slots[slot] = None;
                info!("session destroyed");
                true
            }
            None => false,
        }
    }

    /// Drop every expired session. Called from the dispatcher's periodic
    /// sweep.
    pub fn sweep(&mut self, now: u64) {
        for slot in &mut self.slots {
            if let Some(s) = slot {
                if now > s.expires_at_ms {
                    info!("expired session cleaned up");
                    *slot = None;
                }
            }
        }
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    // ── Internal ──────────────────────────────────────────────

    fn find(&self, token: &Token) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.token.ct_eq(token)))
    }

    /// Generate a token not colliding with any live session.
    fn unique_token(&self, tokens: &mut TokenGenerator, now: u64) -> Token {
        loop {
            let candidate = tokens.next(now);
            if self.find(&candidate).is_none() {
                return candidate;
            }
        }
    }

    /// First free slot, or the slot of the oldest-expiring session.
    fn free_or_evicted_slot(&mut self, _now: u64) -> usize {
        if let Some(free) = self.slots.iter().position(Option::is_none) {
            return free;
        }
        let victim = self
            .slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.as_ref().map_or(0, |s| s.expires_at_ms))
            .map_or(0, |(i, _)| i);
        warn!("session table full — evicting oldest-expiring session");
        victim
    }
}


// ── Platform-specific nonce generation ───────────────────────

/// Fill a 32-byte nonce with cryptographically random data.
///
/// ESP-IDF: delegates to the hardware RNG via `esp_fill_random`.
#[cfg(target_os = "espidf")]
fn fill_random_nonce() -> [u8; 32] {
    let mut buf = [0u8; 32];
    // SAFETY: esp_fill_random writes to the provided buffer using
    // the hardware RNG. Buffer is valid and exclusively owned.
    unsafe {
        esp_idf_sys::esp_fill_random(buf.as_mut_ptr().cast(), buf.len());
    }
    buf
}

/// Host stub — uses `RandomState` to produce entropy, hardened by the
/// HMAC derivation in [`TokenGenerator::next`].
#[cfg(not(target_os = "espidf"))]
fn fill_random_nonce() -> [u8; 32] {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut buf = [0u8; 32];
    for chunk in buf.chunks_mut(8) {
        let s = RandomState::new();
        let val = s.build_hasher().finish().to_le_bytes();
        let len = chunk.len().min(val.len());
        chunk[..len].copy_from_slice(&val[..len]);
    }
    buf
}
