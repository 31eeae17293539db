//! Fuzz target for cipher symmetry
//!
//! # Strategy
//!
//! - Arbitrary plaintext, key, expansion buffer, and refresh parameters
//! - Two identical passes with a fresh key copy
//!
//! # Invariants
//!
//! - The second pass always restores the original buffer
//! - Sealing never panics for any material of at least 16 bytes

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealpost_crypto::{keystream_xor, seal_with_guid, seal_with_key};

#[derive(Debug, Arbitrary)]
struct Input {
    data: Vec<u8>,
    key: [u8; 16],
    expansion: Vec<u8>,
    interval: u8,
    multiple: u8,
    guid: [u8; 16],
    material: Vec<u8>,
}

fuzz_target!(|input: Input| {
    if !input.expansion.is_empty() {
        let interval = u32::from(input.interval % 16) + 1;
        let multiple = u32::from(input.multiple % 4) + 1;

        let mut buf = input.data.clone();
        let mut key = input.key;
        keystream_xor(&mut buf, &mut key, &input.expansion, interval, multiple);
        let mut key = input.key;
        keystream_xor(&mut buf, &mut key, &input.expansion, interval, multiple);
        assert_eq!(buf, input.data, "keystream must be symmetric");
    }

    let mut buf = input.data.clone();
    seal_with_guid(&mut buf, &input.guid);
    seal_with_guid(&mut buf, &input.guid);
    assert_eq!(buf, input.data);

    let mut buf = input.data.clone();
    if seal_with_key(&mut buf, &input.material).is_ok() {
        seal_with_key(&mut buf, &input.material).expect("second pass uses the same material");
        assert_eq!(buf, input.data);
    }
});
