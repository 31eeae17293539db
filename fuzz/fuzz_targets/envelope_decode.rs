//! Fuzz target for envelope parsing
//!
//! Every parser in sealpost-proto must treat its input as hostile.
//!
//! # Strategy
//!
//! - Raw bytes through every structural parser
//! - Hex decode of arbitrary text content
//!
//! # Invariants
//!
//! - No parser ever panics; malformed input returns an error
//! - Drain payloads that decode also re-encode to the same bytes

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealpost_proto::{decode_content, decode_drain_items, encode_drain_items, parse_auth_tail, split_request};

fuzz_target!(|data: &[u8]| {
    let _ = split_request(data);
    let _ = parse_auth_tail(data);

    // The decoder is laxer than the encoder (it does not re-validate
    // text), so only encodable item sets must round-trip.
    if let Ok(items) = decode_drain_items(data) {
        if let Ok(encoded) = encode_drain_items(&items) {
            let reparsed = decode_drain_items(&encoded).expect("re-encoded items must decode");
            assert_eq!(items, reparsed);
        }
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = decode_content(text);
    }
});
