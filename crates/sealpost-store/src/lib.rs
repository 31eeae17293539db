//! Sealpost Indexed Record Store
//!
//! A generic sorted multi-index container with binary file persistence. The
//! store backs both the identity registry and the message queue: records
//! live in an insertion-ordered backing vector, and each declared index is a
//! permutation of record positions kept sorted under that index's
//! comparator.
//!
//! # Invariants
//!
//! - Every index is, at all times, a stable total ordering of
//!   `[0, record_count)` under its comparator; duplicate keys preserve
//!   insertion order.
//! - Record positions shift on removal and must be treated as invalidated
//!   after any [`IndexedStore::remove`].
//! - An index that should contain a position but does not signals a
//!   corrupted store ([`StoreError::IndexCorrupt`]) - fatal, not retried.
//!
//! Persistence is crash-safe: saves go to a uniquely named temporary file
//! which is renamed over the live file only once fully written, so a failed
//! save leaves the previous file untouched.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod indexed;
mod record;

pub use error::StoreError;
pub use indexed::{IndexedStore, RangeResult};
pub use record::Record;
