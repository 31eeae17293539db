//! Operation codes.

use crate::errors::ProtocolError;

/// Operation requested by a client frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Register (or re-fetch) an identity and receive a client artifact.
    Bootstrap = 0,
    /// Queue one message for another identity.
    Send = 1,
    /// Retrieve and delete every pending message for the caller.
    Drain = 2,
    /// Administrator only: delete every pending message older than a
    /// cutoff.
    Purge = 99,
}

impl Opcode {
    /// Wire byte for this operation.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether the operation carries a session authenticator.
    ///
    /// Bootstrap is the only unauthenticated operation; it is how a client
    /// obtains a session key in the first place.
    #[must_use]
    pub fn is_authenticated(self) -> bool {
        !matches!(self, Self::Bootstrap)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(Self::Bootstrap),
            1 => Ok(Self::Send),
            2 => Ok(Self::Drain),
            99 => Ok(Self::Purge),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}
