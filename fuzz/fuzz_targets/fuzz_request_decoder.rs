//! Fuzz target: `RequestBuffer::feed` / `parse`
//!
//! Drives arbitrary byte sequences into the incremental request decoder,
//! split into arbitrary chunks, and asserts that it never panics, never
//! exceeds its fixed capacity, and parses without panicking whenever it
//! reports a complete request.
//!
//! cargo fuzz run fuzz_request_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use relayguard::http::request::{RequestBuffer, MAX_REQUEST_BYTES};

fuzz_target!(|data: &[u8]| {
    // First byte steers the chunk size so the corpus explores both
    // byte-at-a-time and bulk feeds.
    let (steer, payload) = match data.split_first() {
        Some((s, rest)) => (*s as usize % 64 + 1, rest),
        None => return,
    };

    let mut buf = RequestBuffer::new();
    let mut complete = false;
    for chunk in payload.chunks(steer) {
        match buf.feed(chunk) {
            Ok(done) => complete = done,
            Err(_) => return, // oversized or malformed-length: fine, just stop
        }
        assert!(buf.len() <= MAX_REQUEST_BYTES, "buffer exceeded fixed capacity");
        if complete {
            break;
        }
    }

    if complete {
        // Parsing may reject, but must never panic.
        let _ = buf.parse();
    }

    // After a reset the decoder must accept bytes cleanly again.
    buf.reset();
    let _ = buf.feed(payload.get(..payload.len().min(16)).unwrap_or_default());
});
