//! HTTP response construction and the error-kind → status mapping.
//!
//! Every error kind maps to one fixed status code and one generic message.
//! Responses never carry internal counters, stack traces, or any echo of
//! request content; `InvalidInput` names the offending field and nothing
//! more.

use serde::Serialize;

use crate::error::{Error, HttpError, RelayError, SecurityError};

/// A response ready to serialize onto the wire. Single-shot: the dispatcher
/// always closes the connection after writing it.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    content_type: &'static str,
    body: Vec<u8>,
    set_cookie: Option<String>,
}

impl Response {
    pub fn json<T: Serialize>(status: u16, payload: &T) -> Self {
        let body = serde_json::to_vec(payload).unwrap_or_else(|_| b"{}".to_vec());
        Self {
            status,
            content_type: "application/json",
            body,
            set_cookie: None,
        }
    }

    pub fn html(status: u16, body: &'static str) -> Self {
        Self {
            status,
            content_type: "text/html",
            body: body.as_bytes().to_vec(),
            set_cookie: None,
        }
    }

    /// Translate an error into its fixed status + generic JSON body.
    pub fn from_error(err: Error) -> Self {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
        }
        Self::json(
            status_for(&err),
            &ErrorBody {
                error: public_message(&err),
            },
        )
    }

    /// Attach a `Set-Cookie` header (session issuance).
    pub fn with_cookie(mut self, cookie: String) -> Self {
        self.set_cookie = Some(cookie);
        self
    }

    /// Serialize status line, headers, and body for the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 128);
        out.extend_from_slice(
            format!(
                "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                self.status,
                reason(self.status),
                self.content_type,
                self.body.len()
            )
            .as_bytes(),
        );
        if let Some(cookie) = &self.set_cookie {
            out.extend_from_slice(format!("Set-Cookie: {cookie}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// Fixed status for each error kind.
pub fn status_for(err: &Error) -> u16 {
    match err {
        Error::Security(e) => match e {
            SecurityError::InvalidCredentials
            | SecurityError::SessionExpired
            | SecurityError::OwnerMismatch => 401,
            SecurityError::CsrfMismatch => 403,
            SecurityError::LockedOut | SecurityError::RateLimited => 429,
            SecurityError::InvalidInput(_) => 400,
        },
        Error::Relay(e) => match e {
            RelayError::RapidSwitchRejected => 409,
            RelayError::HardwareFault => 500,
        },
        Error::Http(e) => match e {
            HttpError::PayloadTooLarge => 413,
            HttpError::BadRequest => 400,
            HttpError::NotFound => 404,
            HttpError::MethodNotAllowed => 405,
        },
        Error::Config(_) | Error::Init(_) => 500,
    }
}

/// Generic user-facing message. The `Display` impls are written to carry
/// no internal state — this is the only text that reaches a client.
fn public_message(err: &Error) -> String {
    match err {
        Error::Security(e) => e.to_string(),
        Error::Relay(e) => e.to_string(),
        Error::Http(e) => e.to_string(),
        // Internal classes are not described to clients at all.
        Error::Config(_) | Error::Init(_) => "internal error".to_string(),
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "OK",
    }
}
