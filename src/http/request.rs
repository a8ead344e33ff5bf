//! Incremental HTTP request decoder.
//!
//! A single non-blocking read may return part of the request line, part of
//! the headers, or the whole request plus body. [`RequestBuffer`] accumulates
//! bytes across dispatcher iterations in a fixed buffer and reports when a
//! complete request (headers + declared body) is available; anything that
//! would overflow the buffer fails with `PayloadTooLarge` — there is no
//! dynamic growth.
//!
//! Parsing extracts only what routing needs: method, path, query, the
//! `session_id` cookie, the `X-CSRF-Token` header, and the body. Everything
//! else is skipped, not stored.

use crate::error::HttpError;

/// Fixed per-connection request buffer size.
pub const MAX_REQUEST_BYTES: usize = 2048;

/// Supported methods. Anything else is answered 405 at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A parsed view into a completed [`RequestBuffer`]. Borrows the buffer —
/// nothing is copied out.
#[derive(Debug)]
pub struct Request<'a> {
    pub method: Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    /// `session_id` cookie value, if presented.
    pub session_token: Option<&'a str>,
    /// `X-CSRF-Token` header value, if presented.
    pub csrf_token: Option<&'a str>,
    pub body: &'a [u8],
}

/// Accumulates request bytes across partial reads.
pub struct RequestBuffer {
    buf: heapless::Vec<u8, MAX_REQUEST_BYTES>,
    /// Byte offset just past `\r\n\r\n`, once seen.
    header_end: Option<usize>,
}

impl RequestBuffer {
    pub fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            header_end: None,
        }
    }

    /// Feed bytes from one non-blocking read.
    ///
    /// Returns `Ok(true)` once the request line, headers, and the declared
    /// body are all present. `Err(PayloadTooLarge)` when the request cannot
    /// fit in the fixed buffer.
    pub fn feed(&mut self, data: &[u8]) -> Result<bool, HttpError> {
        if self.buf.extend_from_slice(data).is_err() {
            return Err(HttpError::PayloadTooLarge);
        }

        if self.header_end.is_none() {
            // Resume the terminator scan a little before the new bytes in
            // case `\r\n\r\n` straddles two reads.
            let start = self.buf.len().saturating_sub(data.len() + 3);
            if let Some(pos) = find(&self.buf[start..], b"\r\n\r\n") {
                self.header_end = Some(start + pos + 4);
            }
        }

        let Some(header_end) = self.header_end else {
            return Ok(false);
        };

        let content_length = self.content_length(header_end)?;
        let total = header_end
            .checked_add(content_length)
            .ok_or(HttpError::PayloadTooLarge)?;
        if total > MAX_REQUEST_BYTES {
            return Err(HttpError::PayloadTooLarge);
        }
        Ok(self.buf.len() >= total)
    }

    /// Parse the completed request. Call only after [`feed`] returned true.
    pub fn parse(&self) -> Result<Request<'_>, HttpError> {
        let header_end = self.header_end.ok_or(HttpError::BadRequest)?;
        let head =
            core::str::from_utf8(&self.buf[..header_end]).map_err(|_| HttpError::BadRequest)?;
        let mut lines = head.split("\r\n");

        // ── Request line ──────────────────────────────────────
        let request_line = lines.next().ok_or(HttpError::BadRequest)?;
        let mut parts = request_line.split(' ');
        let method = match parts.next().ok_or(HttpError::BadRequest)? {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "HEAD" | "PUT" | "DELETE" | "PATCH" | "OPTIONS" => {
                return Err(HttpError::MethodNotAllowed);
            }
            _ => return Err(HttpError::BadRequest),
        };
        let target = parts.next().ok_or(HttpError::BadRequest)?;
        if target.is_empty() || !target.starts_with('/') {
            return Err(HttpError::BadRequest);
        }
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (target, None),
        };

        // ── Headers we care about ─────────────────────────────
        let mut session_token = None;
        let mut csrf_token = None;
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if name.eq_ignore_ascii_case("cookie") {
                session_token = cookie_value(value, "session_id").or(session_token);
            } else if name.eq_ignore_ascii_case("x-csrf-token") {
                csrf_token = Some(value);
            }
        }

        let content_length = self.content_length(header_end)?;
        let body = &self.buf[header_end..header_end + content_length];

        Ok(Request {
            method,
            path,
            query,
            session_token,
            csrf_token,
            body,
        })
    }

    /// Reset for reuse after a transport reconnect.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.header_end = None;
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    // ── Internal ──────────────────────────────────────────────

    /// Declared `Content-Length`, 0 if absent.
    fn content_length(&self, header_end: usize) -> Result<usize, HttpError> {
        let head =
            core::str::from_utf8(&self.buf[..header_end]).map_err(|_| HttpError::BadRequest)?;
        for line in head.split("\r\n").skip(1) {
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    return value
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| HttpError::BadRequest);
                }
            }
        }
        Ok(0)
    }
}

impl Default for RequestBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Naive subsequence search — inputs are tiny and bounded.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Extract a single cookie value from a `Cookie:` header.
fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for cookie in header.split(';') {
        if let Some((key, value)) = cookie.trim().split_once('=') {
            if key == name {
                return Some(value);
            }
        }
    }
    None
}
