//! Store error types.

use thiserror::Error;

/// Errors surfaced by the indexed store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// File I/O failure during save or load.
    #[error("store I/O error: {0}")]
    Io(String),

    /// File is shorter than its declared record and index payload.
    #[error("store file truncated: need {expected} bytes, have {actual}")]
    Truncated {
        /// Bytes the declared record count requires.
        expected: usize,
        /// Bytes actually present after the count field.
        actual: usize,
    },

    /// A record failed to decode from its fixed-width slot.
    #[error("malformed record at position {position}")]
    BadRecord {
        /// Backing-sequence position of the offending record.
        position: usize,
    },

    /// Caller passed a position outside `[0, record_count)`.
    #[error("invalid record position {position} (record count {count})")]
    InvalidPosition {
        /// The rejected position.
        position: usize,
        /// Record count at the time of the call.
        count: usize,
    },

    /// An index does not contain an entry it must contain, or contains an
    /// entry pointing outside the backing sequence. The store is corrupt;
    /// this is fatal and never retried.
    #[error("index {index} is inconsistent with the backing records")]
    IndexCorrupt {
        /// The inconsistent index.
        index: usize,
    },

    /// An in-place update tried to change an index-key field.
    #[error("update at position {position} would reorder index {index}")]
    KeyChanged {
        /// Position of the record being updated.
        position: usize,
        /// First index whose ordering the update would break.
        index: usize,
    },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
