//! End-to-end dispatcher scenarios over scripted in-memory transports.

use core::net::Ipv4Addr;

use relayguard::app::events::AppEvent;
use relayguard::app::ports::RelayPort;
use relayguard::config::SystemConfig;
use relayguard::http::server::HttpDispatcher;
use relayguard::relay::{RelayController, SwitchReason};
use relayguard::security::SecurityManager;

use crate::mock_hw::{
    extract_session_cookie, parse_response, MockRelayPin, RecordingSink, ScriptedConn,
    ScriptedListener,
};

const CLIENT: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 20);

struct Harness {
    dispatcher: HttpDispatcher<ScriptedListener>,
    relay: RelayController,
    pin: MockRelayPin,
    sink: RecordingSink,
    now: u64,
}

impl Harness {
    fn new(cfg: SystemConfig) -> Self {
        let security = SecurityManager::from_config(&cfg);
        let relay = RelayController::new(&cfg.relay, None);
        Self {
            dispatcher: HttpDispatcher::new(ScriptedListener::new(), cfg, security, 0),
            relay,
            pin: MockRelayPin::new(),
            sink: RecordingSink::new(),
            now: 0,
        }
    }

    fn open(auth: bool) -> Self {
        let mut cfg = SystemConfig::default();
        cfg.server.auth_enabled = auth;
        cfg.server.auth_username = heapless::String::try_from("admin").unwrap();
        cfg.server.auth_password = heapless::String::try_from("super-secret-pw").unwrap();
        Self::new(cfg)
    }

    /// Queue a request and run the loop until the connection completes.
    /// Returns (status, body).
    fn exchange(&mut self, raw: &[u8]) -> (u16, String) {
        let raw_response = self.exchange_raw(raw);
        parse_response(&raw_response)
    }

    fn exchange_raw(&mut self, raw: &[u8]) -> Vec<u8> {
        let conn = ScriptedConn::new(vec![raw.to_vec()]);
        let output = conn.output();
        self.push(conn);
        for _ in 0..32 {
            self.step(10);
            if self.dispatcher.open_connections() == 0 {
                break;
            }
        }
        let bytes = output.borrow().clone();
        assert!(!bytes.is_empty(), "no response captured");
        bytes
    }

    fn push(&mut self, conn: ScriptedConn) {
        // Listener is owned by the dispatcher; route new connections in
        // through a fresh scripted listener entry.
        self.dispatcher.listener_mut().push(conn, CLIENT);
    }

    fn step(&mut self, advance_ms: u64) {
        self.now += advance_ms;
        self.dispatcher
            .poll_iteration(&mut self.relay, &mut self.pin, &mut self.sink, self.now);
    }
}

#[test]
fn status_roundtrip_reports_relay_fields() {
    let mut h = Harness::open(false);
    h.relay
        .set(&mut h.pin, true, SwitchReason::User, 0)
        .unwrap();

    let (status, body) = h.exchange(b"GET /api/status HTTP/1.1\r\n\r\n");
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["state"], true);
    assert_eq!(json["cycle_count"], 0);
    assert_eq!(json["degraded"], false);
    assert!(json["session_on_duration"].is_u64());
    assert!(json["cumulative_on_time"].is_u64());
}

#[test]
fn full_secured_mutation_flow() {
    let mut h = Harness::open(true);

    // 1. Login issues a session cookie and CSRF token.
    let login_raw = h.exchange_raw(
        b"POST /api/login HTTP/1.1\r\nContent-Length: 49\r\n\r\n\
          {\"username\":\"admin\",\"password\":\"super-secret-pw\"}",
    );
    let (status, body) = parse_response(&login_raw);
    assert_eq!(status, 200);
    let session = extract_session_cookie(&login_raw).expect("session cookie");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let csrf = json["csrf_token"].as_str().unwrap().to_string();

    // 2. Mutation with session + CSRF succeeds and rotates the token.
    let set_raw = format!(
        "POST /api/relay/set HTTP/1.1\r\nCookie: session_id={session}\r\n\
         X-CSRF-Token: {csrf}\r\nContent-Length: 14\r\n\r\n{{\"state\":true}}"
    );
    let (status, body) = h.exchange(set_raw.as_bytes());
    assert_eq!(status, 200);
    assert!(h.relay.is_on());
    assert!(h.pin.is_energized());
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let rotated = json["csrf_token"].as_str().unwrap().to_string();
    assert_ne!(rotated, csrf);

    // 3. Replaying the consumed CSRF token fails and leaves the relay alone.
    let replay = format!(
        "POST /api/relay/toggle HTTP/1.1\r\nCookie: session_id={session}\r\n\
         X-CSRF-Token: {csrf}\r\n\r\n"
    );
    let (status, _) = h.exchange(replay.as_bytes());
    assert_eq!(status, 403);
    assert!(h.relay.is_on());

    // 4. The rotated token works.
    let toggle = format!(
        "POST /api/relay/toggle HTTP/1.1\r\nCookie: session_id={session}\r\n\
         X-CSRF-Token: {rotated}\r\n\r\n"
    );
    let (status, _) = h.exchange(toggle.as_bytes());
    assert_eq!(status, 200);
    assert!(!h.relay.is_on());
}

#[test]
fn mutation_rejected_without_csrf_header() {
    let mut h = Harness::open(true);
    let login_raw = h.exchange_raw(
        b"POST /api/login HTTP/1.1\r\nContent-Length: 49\r\n\r\n\
          {\"username\":\"admin\",\"password\":\"super-secret-pw\"}",
    );
    let session = extract_session_cookie(&login_raw).unwrap();

    let raw = format!(
        "POST /api/relay/toggle HTTP/1.1\r\nCookie: session_id={session}\r\n\r\n"
    );
    let (status, _) = h.exchange(raw.as_bytes());
    assert_eq!(status, 403);
    assert!(!h.relay.is_on());
}

#[test]
fn safety_tick_fires_while_slow_client_holds_connection() {
    let mut cfg = SystemConfig::default();
    cfg.server.auth_enabled = false;
    cfg.server.request_timeout_secs = 3600;
    let mut h = Harness::new(cfg);

    h.relay
        .set(&mut h.pin, true, SwitchReason::User, 0)
        .unwrap();

    // A client drips a request one byte per iteration while the safety
    // timeout approaches.
    let request: &[u8] = b"GET /api/status HTTP/1.1\r\n\r\n";
    let conn = ScriptedConn::new(request.iter().map(|b| vec![*b]).collect());
    h.push(conn);

    // 20s per iteration; the 300s timeout elapses mid-read.
    for _ in 0..request.len() {
        h.step(20_000);
    }
    assert!(!h.relay.is_on(), "tick must not be starved by slow I/O");
    assert_eq!(h.sink.count_forced_off(), 1);
    let forced_logged = h.sink.events.iter().any(|e| {
        matches!(
            e,
            AppEvent::ForcedOff {
                on_for_ms: 300_000,
                ..
            }
        )
    });
    assert!(forced_logged, "forced transition reported for logging");
}

#[test]
fn oversized_request_gets_413_and_connection_closes() {
    let mut h = Harness::open(false);
    let flood = vec![b'a'; 8192];
    let conn = ScriptedConn::new(vec![flood]);
    let output = conn.output();
    h.push(conn);
    for _ in 0..32 {
        h.step(10);
    }
    let (status, _) = parse_response(&output.borrow());
    assert_eq!(status, 413);
    assert_eq!(h.dispatcher.open_connections(), 0);
}

#[test]
fn rate_limited_request_answered_429_with_event() {
    let mut h = Harness::open(false);
    for _ in 0..60 {
        let (status, _) = h.exchange(b"GET /api/relay/state HTTP/1.1\r\n\r\n");
        assert_eq!(status, 200);
    }
    let (status, _) = h.exchange(b"GET /api/relay/state HTTP/1.1\r\n\r\n");
    assert_eq!(status, 429);
    assert!(h
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::RateLimited { .. })));
}

#[test]
fn timed_out_connection_discarded_without_touching_relay() {
    let mut h = Harness::open(false);
    h.relay
        .set(&mut h.pin, true, SwitchReason::User, 0)
        .unwrap();
    let writes_before = h.pin.levels.len();

    // Partial request, then silence past the 10s request timeout.
    let conn = ScriptedConn::new(vec![b"POST /api/relay/set HTT".to_vec()]);
    h.push(conn);
    h.step(10);
    assert_eq!(h.dispatcher.open_connections(), 1);
    h.step(11_000);
    assert_eq!(h.dispatcher.open_connections(), 0);

    assert!(h.relay.is_on(), "relay untouched by connection teardown");
    assert_eq!(h.pin.levels.len(), writes_before);
    assert_eq!(h.dispatcher.request_count(), 0);
}

#[test]
fn hardware_fault_reported_as_500_and_degraded_in_status() {
    let mut h = Harness::open(false);
    h.pin.fail_writes = true;

    let (status, _) = h.exchange(
        b"POST /api/relay/set HTTP/1.1\r\nContent-Length: 14\r\n\r\n{\"state\":true}",
    );
    assert_eq!(status, 500);
    assert!(h
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::FailSafeEngaged)));

    h.pin.fail_writes = false;
    let (status, body) = h.exchange(b"GET /api/status HTTP/1.1\r\n\r\n");
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["degraded"], true);
}
