//! Request routing and the per-endpoint gating chains.
//!
//! [`dispatch`] is the single place a parsed request meets the rest of the
//! system. The rate limiter runs first for *every* request; mutating
//! endpoints then walk the full chain — session → CSRF → input sanitation —
//! before the relay controller is touched. Any failure short-circuits into
//! a fixed-status, generic-body response.

use core::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, RelayPort};
use crate::config::SystemConfig;
use crate::error::{Error, HttpError, RelayError, SecurityError};
use crate::relay::{RelayController, SwitchReason};
use crate::security::validate::{self, Field};
use crate::security::SecurityManager;
use crate::security::session::TokenText;

use super::assets;
use super::request::{Method, Request};
use super::response::Response;

/// Everything a handler may touch, borrowed for one request.
///
/// Built fresh by the dispatcher per request — no ambient state, no
/// singletons (see DESIGN.md).
pub struct HandlerEnv<'a, P: RelayPort, S: EventSink> {
    pub config: &'a SystemConfig,
    pub security: &'a mut SecurityManager,
    pub relay: &'a mut RelayController,
    pub gpio: &'a mut P,
    pub sink: &'a mut S,
    /// Monotonic now (ms).
    pub now: u64,
    /// Milliseconds since boot, for status reads.
    pub uptime_ms: u64,
    /// Requests completed since boot, for status reads.
    pub request_count: u64,
}

/// Route one complete request to its handler and translate any rejection
/// into a response.
pub fn dispatch<P: RelayPort, S: EventSink>(
    req: &Request<'_>,
    peer: Ipv4Addr,
    env: &mut HandlerEnv<'_, P, S>,
) -> Response {
    // Gate 1: rate limit, applied to every request, authenticated or not.
    if let Err(e) = env.security.check_rate_limit(peer, env.now) {
        env.sink.emit(&AppEvent::RateLimited { ip: peer });
        return Response::from_error(e.into());
    }

    let result = match (req.method, req.path) {
        (Method::Get, "/") => Ok(Response::html(200, assets::CONTROL_PAGE)),
        (Method::Get, "/api/status") => handle_status(req, peer, env),
        (Method::Get, "/api/relay/state") => handle_relay_state(req, peer, env),
        (Method::Get, "/api/stats") => handle_stats(req, peer, env),
        (Method::Post, "/api/login") => handle_login(req, peer, env),
        (Method::Post, "/api/logout") => handle_logout(req, peer, env),
        (Method::Post, "/api/relay/set") => handle_relay_command(req, peer, env, false),
        (Method::Post, "/api/relay/toggle") => handle_relay_command(req, peer, env, true),
        (_, path) if KNOWN_PATHS.contains(&path) => Err(HttpError::MethodNotAllowed.into()),
        _ => Err(HttpError::NotFound.into()),
    };

    result.unwrap_or_else(Response::from_error)
}

const KNOWN_PATHS: [&str; 8] = [
    "/",
    "/api/status",
    "/api/relay/state",
    "/api/stats",
    "/api/login",
    "/api/logout",
    "/api/relay/set",
    "/api/relay/toggle",
];

// ── Read endpoints ────────────────────────────────────────────

#[derive(Serialize)]
struct StatusBody {
    state: bool,
    /// Accumulated ON time across completed sessions (seconds).
    cumulative_on_time: u64,
    cycle_count: u32,
    /// Current ON session length (seconds), 0 when OFF.
    session_on_duration: u64,
    power_on_count: u32,
    pin: i32,
    /// Fail-safe engaged since boot.
    degraded: bool,
    uptime: u64,
    request_count: u64,
}

fn handle_status<P: RelayPort, S: EventSink>(
    req: &Request<'_>,
    peer: Ipv4Addr,
    env: &mut HandlerEnv<'_, P, S>,
) -> Result<Response, Error> {
    require_read_access(req, peer, env)?;
    let status = env.relay.status(env.now, env.gpio.pin());
    Ok(Response::json(
        200,
        &StatusBody {
            state: status.on,
            cumulative_on_time: status.total_runtime_ms / 1000,
            cycle_count: status.total_cycles,
            session_on_duration: status.session_on_ms / 1000,
            power_on_count: status.power_on_count,
            pin: status.pin,
            degraded: status.degraded,
            uptime: env.uptime_ms / 1000,
            request_count: env.request_count,
        },
    ))
}

fn handle_relay_state<P: RelayPort, S: EventSink>(
    req: &Request<'_>,
    peer: Ipv4Addr,
    env: &mut HandlerEnv<'_, P, S>,
) -> Result<Response, Error> {
    #[derive(Serialize)]
    struct StateBody {
        state: bool,
    }
    require_read_access(req, peer, env)?;
    Ok(Response::json(
        200,
        &StateBody {
            state: env.relay.is_on(),
        },
    ))
}

fn handle_stats<P: RelayPort, S: EventSink>(
    req: &Request<'_>,
    peer: Ipv4Addr,
    env: &mut HandlerEnv<'_, P, S>,
) -> Result<Response, Error> {
    require_read_access(req, peer, env)?;
    Ok(Response::json(200, &env.relay.statistics(env.now)))
}

/// Status reads are open per configuration; otherwise they need a live
/// session like everything else.
fn require_read_access<P: RelayPort, S: EventSink>(
    req: &Request<'_>,
    peer: Ipv4Addr,
    env: &mut HandlerEnv<'_, P, S>,
) -> Result<(), Error> {
    if !env.config.server.auth_enabled || env.config.server.open_status {
        return Ok(());
    }
    let token = req.session_token.ok_or(SecurityError::SessionExpired)?;
    env.security.validate_session(token, peer, env.now)?;
    Ok(())
}

// ── Login / logout ────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    success: bool,
    csrf_token: TokenText,
}

fn handle_login<P: RelayPort, S: EventSink>(
    req: &Request<'_>,
    peer: Ipv4Addr,
    env: &mut HandlerEnv<'_, P, S>,
) -> Result<Response, Error> {
    if !env.config.server.auth_enabled {
        // Nothing to log into; report success without issuing a session.
        #[derive(Serialize)]
        struct Open {
            success: bool,
        }
        return Ok(Response::json(200, &Open { success: true }));
    }

    let body: LoginBody = serde_json::from_slice(req.body)
        .map_err(|_| SecurityError::InvalidInput(Field::Username))?;

    let attempt = env
        .security
        .authenticate(peer, &body.username, &body.password, env.now);
    let grant = match attempt {
        Ok(grant) => grant,
        Err(e) => {
            env.sink.emit(&match e {
                SecurityError::LockedOut => AppEvent::LockedOut { ip: peer },
                _ => AppEvent::LoginFailed { ip: peer },
            });
            return Err(e.into());
        }
    };

    env.sink.emit(&AppEvent::SessionCreated { ip: peer });
    let cookie = format!(
        "session_id={}; HttpOnly; Path=/; Max-Age={}",
        grant.session_token, env.config.security.session_timeout_secs
    );
    Ok(Response::json(
        200,
        &LoginResponse {
            success: true,
            csrf_token: grant.csrf_token,
        },
    )
    .with_cookie(cookie))
}

fn handle_logout<P: RelayPort, S: EventSink>(
    req: &Request<'_>,
    peer: Ipv4Addr,
    env: &mut HandlerEnv<'_, P, S>,
) -> Result<Response, Error> {
    #[derive(Serialize)]
    struct LogoutBody {
        success: bool,
    }
    if env.config.server.auth_enabled {
        let token = req.session_token.ok_or(SecurityError::SessionExpired)?;
        env.security.validate_session(token, peer, env.now)?;
        let _ = env.security.logout(token);
    }
    Ok(Response::json(200, &LogoutBody { success: true }))
}

// ── Relay commands (full gating chain) ────────────────────────

#[derive(Serialize)]
struct ActionBody {
    success: bool,
    state: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    csrf_token: Option<TokenText>,
}

fn handle_relay_command<P: RelayPort, S: EventSink>(
    req: &Request<'_>,
    peer: Ipv4Addr,
    env: &mut HandlerEnv<'_, P, S>,
    toggle: bool,
) -> Result<Response, Error> {
    // Gates 2 + 3: session, then single-use CSRF.
    let rotated = authorize_mutation(req, peer, env)?;

    // Gate 4: input sanitation (set carries a body; toggle does not).
    let attempted = if toggle {
        env.relay.toggle(env.gpio, SwitchReason::User, env.now)
    } else {
        let desired = parse_set_body(req.body)?;
        env.relay
            .set(env.gpio, desired, SwitchReason::User, env.now)
            .map(|()| desired)
    };
    let new_state = match attempted {
        Ok(state) => state,
        Err(e) => return Err(on_relay_error(env, e)),
    };

    env.sink.emit(&AppEvent::RelaySwitched {
        on: new_state,
        reason: SwitchReason::User,
    });
    Ok(Response::json(
        200,
        &ActionBody {
            success: true,
            state: new_state,
            csrf_token: rotated,
        },
    ))
}

/// Session + CSRF gates. Returns the rotated CSRF token when auth is on.
fn authorize_mutation<P: RelayPort, S: EventSink>(
    req: &Request<'_>,
    peer: Ipv4Addr,
    env: &mut HandlerEnv<'_, P, S>,
) -> Result<Option<TokenText>, Error> {
    if !env.config.server.auth_enabled {
        return Ok(None);
    }
    let token = req.session_token.ok_or(SecurityError::SessionExpired)?;
    env.security.validate_session(token, peer, env.now)?;
    let supplied = req.csrf_token.ok_or(SecurityError::CsrfMismatch)?;
    let rotated = env.security.consume_csrf(token, supplied, env.now)?;
    Ok(Some(rotated))
}

/// `{"state": …}` — accepts a JSON bool or a whitelisted command string.
fn parse_set_body(body: &[u8]) -> Result<bool, Error> {
    #[derive(Deserialize)]
    struct SetBody {
        state: serde_json::Value,
    }
    let parsed: SetBody = serde_json::from_slice(body)
        .map_err(|_| SecurityError::InvalidInput(Field::RelayCommand))?;
    match parsed.state {
        serde_json::Value::Bool(b) => Ok(b),
        serde_json::Value::String(s) => validate::relay_command(&s)?
            .ok_or_else(|| SecurityError::InvalidInput(Field::RelayCommand).into()),
        _ => Err(SecurityError::InvalidInput(Field::RelayCommand).into()),
    }
}

fn on_relay_error<P: RelayPort, S: EventSink>(
    env: &mut HandlerEnv<'_, P, S>,
    e: RelayError,
) -> Error {
    if e == RelayError::HardwareFault {
        env.sink.emit(&AppEvent::FailSafeEngaged);
    }
    e.into()
}
