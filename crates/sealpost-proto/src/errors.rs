//! Protocol error types.

use thiserror::Error;

/// Convenience alias for protocol results.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors surfaced while framing or parsing protocol bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Input ended before a required field.
    #[error("truncated frame: need {needed} more bytes, have {available}")]
    Truncated {
        /// Bytes the next field requires.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// Opcode byte does not name a known operation.
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// Status field does not name a known status code.
    #[error("unknown status code {code:?}")]
    UnknownStatus {
        /// The four raw status bytes.
        code: [u8; 4],
    },

    /// Message text exceeds the wire slot.
    #[error("message of {len} bytes exceeds the {max}-byte limit")]
    MessageTooLong {
        /// Rejected text length.
        len: usize,
        /// Largest accepted length.
        max: usize,
    },

    /// Message text is empty or contains a NUL or non-ASCII byte.
    #[error("message text must be non-empty ASCII without NUL bytes")]
    BadMessageText,

    /// Artifact exceeds the 16-bit length field of the bootstrap response.
    #[error("artifact of {len} bytes does not fit a 16-bit length field")]
    ArtifactTooLarge {
        /// Rejected artifact length.
        len: usize,
    },

    /// Transport content is not valid hex.
    #[error("transport content is not valid hex: {0}")]
    BadHex(String),

    /// Transport content exceeds the input cap.
    #[error("transport content of {len} characters exceeds the {max}-character cap")]
    ContentTooLong {
        /// Rejected content length in characters.
        len: usize,
        /// Largest accepted length.
        max: usize,
    },
}
