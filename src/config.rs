//! System configuration parameters.
//!
//! All tunable parameters for the relayguard system, grouped the way the
//! on-flash `config.json` is laid out. The struct is produced once at boot
//! (`from_json` or `Default`), validated fail-fast with [`SystemConfig::validate`],
//! and never mutated afterwards — the dispatcher, relay controller, and
//! security manager all borrow from this single instance.

use serde::{Deserialize, Serialize};

use crate::pins;

/// Top-level system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub wifi: WifiConfig,
    pub relay: RelayConfig,
    pub server: ServerConfig,
    pub security: SecurityConfig,
    /// Human-readable device name shown on the control page.
    pub device_name: heapless::String<50>,
}

/// WiFi station credentials and retry policy (consumed by the wifi adapter).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
    /// Connection attempts before giving up at boot.
    pub max_connect_attempts: u8,
    /// Delay between reconnect attempts (seconds).
    pub reconnect_delay_secs: u16,
}

/// Relay hardware and safety-timer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// GPIO driving the relay coil.
    pub pin: i32,
    /// True when a LOW output energises the relay.
    pub active_low: bool,
    /// State driven at boot, before any command arrives.
    pub initial_state: bool,
    /// Safety timeout: forced OFF after this many seconds ON. 0 disables.
    pub safety_timeout_secs: u32,
    /// Absolute ceiling on a single ON session (seconds). 0 disables.
    pub max_on_time_secs: u32,
    /// Minimum interval between user-initiated switches (milliseconds).
    pub min_switch_interval_ms: u32,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Concurrent connection slots (bounded by the dispatcher's arena).
    pub max_connections: usize,
    /// A connection idle longer than this is dropped (seconds).
    pub request_timeout_secs: u32,
    /// When false, session and CSRF gates are bypassed (LAN-trusted mode).
    pub auth_enabled: bool,
    pub auth_username: heapless::String<32>,
    pub auth_password: heapless::String<64>,
    /// Whether `GET /api/status` is readable without a session.
    pub open_status: bool,
}

/// Security-table lifetimes and ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Session idle lifetime (seconds); refreshed on each validated request.
    pub session_timeout_secs: u32,
    /// CSRF token lifetime (seconds).
    pub csrf_lifetime_secs: u32,
    /// Requests admitted per client per window.
    pub rate_limit: u32,
    /// Fixed rate-limit window length (seconds).
    pub rate_window_secs: u32,
    /// Failed logins before lockout.
    pub max_login_attempts: u8,
    /// Lockout duration after too many failures (seconds).
    pub lockout_secs: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            wifi: WifiConfig::default(),
            relay: RelayConfig::default(),
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            device_name: heapless::String::try_from("relayguard").unwrap_or_default(),
        }
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            max_connect_attempts: 10,
            reconnect_delay_secs: 5,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            pin: pins::RELAY_GPIO,
            active_low: true,
            initial_state: false,
            safety_timeout_secs: 300,     // 5 minutes
            max_on_time_secs: 86_400,     // 24 hours
            min_switch_interval_ms: 1000, // 1 Hz switching ceiling
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 80,
            max_connections: 4,
            request_timeout_secs: 10,
            // Matches the long-standing shipped default: LAN-trusted mode
            // until credentials are provisioned.
            auth_enabled: false,
            auth_username: heapless::String::try_from("admin").unwrap_or_default(),
            auth_password: heapless::String::new(),
            open_status: true,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 1800, // 30 minutes
            csrf_lifetime_secs: 3600,   // 1 hour
            rate_limit: 60,             // requests per window
            rate_window_secs: 60,
            max_login_attempts: 5,
            lockout_secs: 300,
        }
    }
}

impl SystemConfig {
    /// Parse configuration from a JSON document (the on-flash `config.json`).
    /// Unknown keys are ignored; missing keys take defaults.
    pub fn from_json(raw: &str) -> Result<Self, &'static str> {
        let cfg: Self = serde_json::from_str(raw).map_err(|_| "config JSON malformed")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range-check every field that could put the system in an unsafe or
    /// unserviceable state. Called once at boot; an `Err` here aborts
    /// startup before the dispatcher runs.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !pins::is_valid_relay_gpio(self.relay.pin) {
            return Err("relay.pin outside usable GPIO range");
        }
        if self.relay.safety_timeout_secs > 0
            && self.relay.max_on_time_secs > 0
            && self.relay.safety_timeout_secs > self.relay.max_on_time_secs
        {
            return Err("relay.safety_timeout_secs exceeds relay.max_on_time_secs");
        }
        if self.server.port == 0 {
            return Err("server.port must be nonzero");
        }
        if self.server.max_connections == 0
            || self.server.max_connections > crate::http::server::MAX_CONNECTIONS
        {
            return Err("server.max_connections outside supported range");
        }
        if self.server.request_timeout_secs == 0 {
            return Err("server.request_timeout_secs must be nonzero");
        }
        if self.server.auth_enabled
            && (self.server.auth_username.is_empty() || self.server.auth_password.is_empty())
        {
            return Err("auth enabled but credentials not configured");
        }
        if self.security.rate_limit == 0 || self.security.rate_window_secs == 0 {
            return Err("security.rate_limit and rate_window_secs must be nonzero");
        }
        if self.security.max_login_attempts == 0 {
            return Err("security.max_login_attempts must be nonzero");
        }
        if self.security.session_timeout_secs == 0 || self.security.csrf_lifetime_secs == 0 {
            return Err("security lifetimes must be nonzero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testable() -> SystemConfig {
        SystemConfig::default()
    }

    #[test]
    fn default_config_is_sane() {
        let c = testable();
        assert!(c.validate().is_ok());
        assert!(c.relay.safety_timeout_secs <= c.relay.max_on_time_secs);
        assert!(c.relay.min_switch_interval_ms > 0);
        assert!(c.security.rate_limit > 0);
    }

    #[test]
    fn auth_without_password_fails_validation() {
        // Turning auth on without provisioning a password must fail fast
        // rather than boot an unauthenticatable relay.
        let mut c = SystemConfig::default();
        c.server.auth_enabled = true;
        assert!(c.validate().is_err());
        c.server.auth_password = heapless::String::try_from("hunter2-hunter2").unwrap();
        assert!(c.validate().is_ok());
    }

    #[test]
    fn safety_timeout_must_not_exceed_max_on_time() {
        let mut c = testable();
        c.relay.safety_timeout_secs = 100_000;
        c.relay.max_on_time_secs = 86_400;
        assert!(c.validate().is_err());

        // 0 disables the ceiling, so any safety timeout is fine.
        c.relay.max_on_time_secs = 0;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn reserved_relay_pin_rejected() {
        let mut c = testable();
        c.relay.pin = 24;
        assert!(c.validate().is_err());
    }

    #[test]
    fn max_connections_bounded_by_arena() {
        let mut c = testable();
        c.server.max_connections = crate::http::server::MAX_CONNECTIONS + 1;
        assert!(c.validate().is_err());
        c.server.max_connections = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let c = testable();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.relay.pin, c2.relay.pin);
        assert_eq!(c.relay.safety_timeout_secs, c2.relay.safety_timeout_secs);
        assert_eq!(c.security.rate_limit, c2.security.rate_limit);
        assert_eq!(c.server.auth_username, c2.server.auth_username);
    }

    #[test]
    fn from_json_fills_missing_sections_with_defaults() {
        let c = SystemConfig::from_json(
            r#"{"server": {"auth_enabled": false}, "relay": {"pin": 5}}"#,
        )
        .unwrap();
        assert_eq!(c.relay.pin, 5);
        assert!(!c.server.auth_enabled);
        assert_eq!(c.security.rate_limit, 60);
    }

    #[test]
    fn from_json_rejects_invalid_values() {
        assert!(SystemConfig::from_json(r#"{"relay": {"pin": 24}}"#).is_err());
        assert!(SystemConfig::from_json("not json").is_err());
    }
}
