//! Fuzz target: token hex parsing and session-table lookups.
//!
//! Arbitrary attacker-supplied token strings must never panic the parser
//! or the table, and must never validate against a table they were not
//! issued by.
//!
//! cargo fuzz run fuzz_token_parse

#![no_main]

use core::net::Ipv4Addr;

use libfuzzer_sys::fuzz_target;
use relayguard::security::session::{SessionTable, Token, TokenGenerator};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = core::str::from_utf8(data) else {
        return;
    };

    // Parsing arbitrary text must not panic.
    let _ = Token::from_hex(raw);

    // A table with one live session must reject every fuzzed token string
    // (the generator key is random per run; collisions are not reachable).
    let mut table = SessionTable::new(1800, 3600);
    let mut tokens = TokenGenerator::new();
    let ip = Ipv4Addr::new(192, 168, 1, 2);
    let grant = table.create(&mut tokens, ip, 0);

    if raw != grant.session_token.as_str() {
        assert!(table.validate(raw, ip, 1).is_err());
        assert!(table.consume_csrf(&mut tokens, raw, raw, 1).is_err());
    }
});
