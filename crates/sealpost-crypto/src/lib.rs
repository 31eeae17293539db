//! Sealpost Cryptographic Primitives
//!
//! The layered stream-cipher and key-derivation scheme that secures every
//! byte on the Sealpost wire. Pure functions with deterministic outputs;
//! callers provide entropy where entropy is needed.
//!
//! # Construction
//!
//! Everything is built from two keyed hash functions ([`hash32`] and
//! [`hash128`], HMAC-SHA-256 truncated) and one self-evolving XOR keystream
//! ([`keystream_xor`]):
//!
//! ```text
//! outer guid ─────────────┐
//!                         ▼
//! fold key ──► keystream_xor ──► op + identity layer
//!
//! session key + outer guid
//!        │
//!        ▼
//! derive_session_guid (rejection sampling)
//!        │
//!        ▼
//! seal_with_key ──► authenticator + payload layer
//! ```
//!
//! # Security
//!
//! This is an obfuscation / cost-raising construction, not an authenticated
//! cipher. The keystream depends only on the key and expansion buffer, so a
//! second identical pass with a fresh copy of the key inverts the first -
//! that symmetry is what the protocol relies on. The deliberately expensive
//! hash-refresh step rate-limits brute-force key search; it makes no claim
//! against an adversary with the session key.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod derive;
mod hashing;
mod keystream;

pub use derive::{derive_session_guid, random_buffer_from_seed, random_guid, session_auth};
pub use hashing::{hash32, hash128};
pub use keystream::{CipherError, GUID_LEN, KEY_LEN, keystream_xor, seal_with_guid, seal_with_key};
