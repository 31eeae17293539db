//! Result codes carried in every response.
//!
//! Codes are four ASCII digits so a human can read them straight out of a
//! hex dump. `01xx` codes are produced by the dispatcher before the
//! operation runs; `00xx` codes other than `0000` come from the send path.

use crate::errors::ProtocolError;

/// Outcome code for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Operation completed.
    Ok,
    /// Send: receiver identity field has the wrong width.
    BadIdWidth,
    /// Send: payload too short to hold a message.
    ShortBuffer,
    /// Send: message queue could not be loaded.
    QueueLoad,
    /// Send: retention enforcement could not complete.
    LimitsExceeded,
    /// Send: replacing the previous message from this sender failed.
    UpsertFailed,
    /// Send: queue is at capacity and nothing was stale enough to evict.
    QueueFull,
    /// Send: message queue could not be saved.
    QueueSave,
    /// Request failed structural validation, or a bootstrap could not be
    /// admitted (duplicate identity or full registry).
    BadRequest,
    /// Session authenticator matched neither the current nor the previous
    /// query count.
    BadAuth,
    /// Opcode is not a known operation.
    UnknownOp,
    /// Identity registry could not be loaded or saved, or the client
    /// artifact could not be produced.
    Registry,
}

impl Status {
    /// Four-digit wire form.
    #[must_use]
    pub fn code(self) -> &'static [u8; 4] {
        match self {
            Self::Ok => b"0000",
            Self::BadIdWidth => b"0001",
            Self::ShortBuffer => b"0002",
            Self::QueueLoad => b"0003",
            Self::LimitsExceeded => b"0004",
            Self::UpsertFailed => b"0005",
            Self::QueueFull => b"0006",
            Self::QueueSave => b"0007",
            Self::BadRequest => b"0100",
            Self::BadAuth => b"0101",
            Self::UnknownOp => b"0102",
            Self::Registry => b"0103",
        }
    }

    /// Parse the four-digit wire form.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::UnknownStatus`] for any other byte sequence.
    pub fn from_code(code: [u8; 4]) -> Result<Self, ProtocolError> {
        match &code {
            b"0000" => Ok(Self::Ok),
            b"0001" => Ok(Self::BadIdWidth),
            b"0002" => Ok(Self::ShortBuffer),
            b"0003" => Ok(Self::QueueLoad),
            b"0004" => Ok(Self::LimitsExceeded),
            b"0005" => Ok(Self::UpsertFailed),
            b"0006" => Ok(Self::QueueFull),
            b"0007" => Ok(Self::QueueSave),
            b"0100" => Ok(Self::BadRequest),
            b"0101" => Ok(Self::BadAuth),
            b"0102" => Ok(Self::UnknownOp),
            b"0103" => Ok(Self::Registry),
            _ => Err(ProtocolError::UnknownStatus { code }),
        }
    }

    /// Whether this status reports success.
    #[must_use]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}
