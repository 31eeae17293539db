//! Seeded keyed hash primitive.
//!
//! Every derivation in this crate reduces to "hash these bytes under this
//! 4-byte seed". Both widths are HMAC-SHA-256 keyed by the little-endian
//! seed and truncated; the seed threading (each step feeding the next) is
//! what makes the outputs chain.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn keyed_digest(data: &[u8], seed: u32) -> [u8; 32] {
    let Ok(mut mac) = HmacSha256::new_from_slice(&seed.to_le_bytes()) else {
        unreachable!("HMAC-SHA-256 accepts keys of any length");
    };
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// 32-bit keyed hash of `data` under `seed`.
///
/// Used for keystream index refresh and expected-value derivation.
#[must_use]
pub fn hash32(data: &[u8], seed: u32) -> u32 {
    let digest = keyed_digest(data, seed);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// 128-bit keyed hash of `data` under `seed`.
///
/// Used for session keys, session authenticators and buffer expansion.
#[must_use]
pub fn hash128(data: &[u8], seed: u32) -> [u8; 16] {
    let digest = keyed_digest(data, seed);
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}
