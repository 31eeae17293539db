//! Self-evolving XOR keystream cipher.
//!
//! One pass both encrypts and decrypts: the keystream depends only on the
//! key and the expansion buffer, never on the plaintext, so running the
//! identical procedure twice with a fresh copy of the original key restores
//! the input. The key is overwritten as material is consumed, tying every
//! future keystream byte to what came before - a stateful stream, not a
//! stateless pad.

use thiserror::Error;
use zeroize::Zeroize;

use crate::hashing::{hash32, hash128};

/// Width of a wire guid.
pub const GUID_LEN: usize = 16;

/// Width of a working cipher key.
pub const KEY_LEN: usize = 16;

/// Cipher entry-point failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// Key material shorter than the 16-byte minimum.
    #[error("key material too short: {actual} bytes, need at least {KEY_LEN}")]
    KeyTooShort {
        /// Length of the rejected material.
        actual: usize,
    },
}

/// XOR `buffer` against a keystream drawn from `expansion`.
///
/// `key` is consumed and evolved during the call - callers that need the
/// original key for the symmetric second pass must snapshot it first.
///
/// Per byte position `i`:
/// 1. every `randomize_interval` bytes, refresh the expansion index by
///    hashing the current key (`randomize_multiple` chained rounds - this is
///    the deliberate CPU cost that throttles brute-force key search);
/// 2. reduce the index modulo the expansion length, stepping past the
///    previous position so no two consecutive bytes reuse an offset;
/// 3. XOR the expansion byte into the buffer and overwrite the key byte at
///    `i % key.len()` with it.
///
/// `randomize_interval` and `randomize_multiple` must be non-zero and both
/// `key` and `expansion` non-empty; these are programming errors, not input
/// errors, and are only checked in debug builds.
pub fn keystream_xor(
    buffer: &mut [u8],
    key: &mut [u8],
    expansion: &[u8],
    randomize_interval: u32,
    randomize_multiple: u32,
) {
    debug_assert!(!key.is_empty());
    debug_assert!(!expansion.is_empty());
    debug_assert!(randomize_interval > 0);
    debug_assert!(randomize_multiple > 0);

    let e_len = expansion.len() as u32;
    let interval = randomize_interval as usize;

    let mut idx: u32 = 0;
    let mut previous: Option<u32> = None;

    for i in 0..buffer.len() {
        if i % interval == 0 {
            for _ in 0..randomize_multiple {
                idx = hash32(key, idx);
            }
        }

        idx %= e_len;

        if previous == Some(idx) {
            idx = (idx + 1) % e_len;
        }

        previous = Some(idx);

        let pad = expansion[idx as usize];
        buffer[i] ^= pad;
        key[i % key.len()] = pad;

        idx += 1;
    }
}

/// Seal (or unseal) `buf` under a 16-byte guid.
///
/// The working key is the guid XOR-folded onto itself: each key byte is the
/// guid byte XORed with its right neighbour, the last byte taken as-is. The
/// guid doubles as the expansion buffer.
pub fn seal_with_guid(buf: &mut [u8], guid: &[u8; GUID_LEN]) {
    let mut key = [0u8; KEY_LEN];
    for i in 0..GUID_LEN - 1 {
        key[i] = guid[i] ^ guid[i + 1];
    }
    key[GUID_LEN - 1] = guid[GUID_LEN - 1];

    keystream_xor(buf, &mut key, guid, 1, 1);
    key.zeroize();
}

/// Seal (or unseal) `buf` under arbitrary key material of at least 16 bytes.
///
/// The working key is a 128-bit keyed hash of the material seeded by its
/// own first four bytes; the material itself is the expansion buffer.
///
/// # Errors
///
/// [`CipherError::KeyTooShort`] when `material` is shorter than 16 bytes.
pub fn seal_with_key(buf: &mut [u8], material: &[u8]) -> Result<(), CipherError> {
    if material.len() < KEY_LEN {
        return Err(CipherError::KeyTooShort { actual: material.len() });
    }

    let seed = u32::from_le_bytes([material[0], material[1], material[2], material[3]]);
    let mut key = hash128(material, seed);

    keystream_xor(buf, &mut key, material, 1, 1);
    key.zeroize();

    Ok(())
}
