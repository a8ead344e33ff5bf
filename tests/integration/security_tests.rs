//! Security-manager scenarios: sessions, CSRF, rate limiting, lockout.

use core::net::Ipv4Addr;

use relayguard::config::SystemConfig;
use relayguard::error::SecurityError;
use relayguard::security::SecurityManager;

const ALICE: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
const MALLORY: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 66);

fn secured_config() -> SystemConfig {
    let mut cfg = SystemConfig::default();
    cfg.server.auth_enabled = true;
    cfg.server.auth_username = heapless::String::try_from("admin").unwrap();
    cfg.server.auth_password = heapless::String::try_from("correct-horse-battery").unwrap();
    cfg
}

fn manager() -> SecurityManager {
    SecurityManager::from_config(&secured_config())
}

#[test]
fn authenticate_validate_roundtrip_until_expiry() {
    let mut sec = manager();
    let grant = sec
        .authenticate(ALICE, "admin", "correct-horse-battery", 0)
        .unwrap();

    // Valid all the way to the deadline...
    assert!(sec.validate_session(&grant.session_token, ALICE, 900_000).is_ok());
    // ...which the touch above refreshed to 900s + 1800s.
    assert!(sec
        .validate_session(&grant.session_token, ALICE, 2_700_000)
        .is_ok());
    // Left untouched past the refreshed deadline: expired.
    assert_eq!(
        sec.validate_session(&grant.session_token, ALICE, 4_500_001),
        Err(SecurityError::SessionExpired)
    );
}

#[test]
fn hijacked_token_rejected_by_owner_binding() {
    let mut sec = manager();
    let grant = sec
        .authenticate(ALICE, "admin", "correct-horse-battery", 0)
        .unwrap();

    assert_eq!(
        sec.validate_session(&grant.session_token, MALLORY, 1_000),
        Err(SecurityError::OwnerMismatch)
    );
    assert!(sec.validate_session(&grant.session_token, ALICE, 1_000).is_ok());
}

#[test]
fn session_tokens_never_reused_across_live_sessions() {
    let mut sec = manager();
    let mut tokens = Vec::new();
    for i in 0..8 {
        let grant = sec
            .authenticate(ALICE, "admin", "correct-horse-battery", i * 1_000)
            .unwrap();
        assert!(
            !tokens.contains(&grant.session_token),
            "token issued twice among live sessions"
        );
        tokens.push(grant.session_token);
    }
}

#[test]
fn csrf_tokens_are_single_use() {
    let mut sec = manager();
    let grant = sec
        .authenticate(ALICE, "admin", "correct-horse-battery", 0)
        .unwrap();

    let second = sec
        .consume_csrf(&grant.session_token, &grant.csrf_token, 100)
        .unwrap();
    // Replays of the consumed token always fail, any number of times.
    for t in 0..5 {
        assert_eq!(
            sec.consume_csrf(&grant.session_token, &grant.csrf_token, 200 + t),
            Err(SecurityError::CsrfMismatch)
        );
    }
    let third = sec
        .consume_csrf(&grant.session_token, &second, 300)
        .unwrap();
    assert_ne!(second, third);
}

#[test]
fn rate_limiter_admits_ceiling_rejects_next() {
    let mut sec = manager();
    // Default ceiling: 60 per rolling 60s window.
    for i in 0..60 {
        assert!(
            sec.check_rate_limit(ALICE, 10_000 + i).is_ok(),
            "request {i} within ceiling"
        );
    }
    assert_eq!(
        sec.check_rate_limit(ALICE, 10_100),
        Err(SecurityError::RateLimited)
    );

    // Next window: allowance restored.
    assert!(sec.check_rate_limit(ALICE, 70_001).is_ok());
}

#[test]
fn lockout_scenario_five_failures_then_correct_password() {
    let mut sec = manager();

    for i in 0..5u64 {
        assert_eq!(
            sec.authenticate(MALLORY, "admin", "guess", i),
            Err(SecurityError::InvalidCredentials)
        );
    }
    // 6th attempt with the *correct* password: still locked out.
    assert_eq!(
        sec.authenticate(MALLORY, "admin", "correct-horse-battery", 10),
        Err(SecurityError::LockedOut)
    );
    // Lockout lasts 300s from the locking failure; afterwards it works.
    assert!(sec
        .authenticate(MALLORY, "admin", "correct-horse-battery", 300_005)
        .is_ok());
}

#[test]
fn lockout_does_not_leak_across_identities() {
    let mut sec = manager();
    for i in 0..5u64 {
        let _ = sec.authenticate(MALLORY, "admin", "guess", i);
    }
    assert_eq!(
        sec.authenticate(MALLORY, "admin", "correct-horse-battery", 10),
        Err(SecurityError::LockedOut)
    );
    // Alice is unaffected by Mallory's lockout.
    assert!(sec
        .authenticate(ALICE, "admin", "correct-horse-battery", 10)
        .is_ok());
}

#[test]
fn sweep_bounds_all_tables() {
    let mut sec = manager();
    let _ = sec.authenticate(ALICE, "admin", "correct-horse-battery", 0);
    for n in 0..10u8 {
        let ip = Ipv4Addr::new(10, 0, 0, n);
        let _ = sec.check_rate_limit(ip, 0);
        let _ = sec.authenticate(ip, "admin", "nope", 0);
    }
    assert!(sec.live_sessions() >= 1);

    // Far future: everything expired, every table drained.
    sec.sweep(100_000_000);
    assert_eq!(sec.live_sessions(), 0);
}
