//! Identity record stored in the registry.

use std::cmp::Ordering;

use rand::RngCore;
use sealpost_crypto::session_auth;
use sealpost_store::{Record, StoreError};

/// One registered client identity.
///
/// The identity hash is the client-chosen 32-byte name; the session key is
/// server-generated at bootstrap and never leaves the registry except
/// embedded in the client artifact. The query count is the replay clock:
/// it advances on every successful non-drain operation and anchors the
/// session authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    /// Client-chosen identity hash.
    pub id_hash: [u8; 32],
    /// Server-generated key for the identity's session layer.
    pub session_key: [u8; 16],
    /// Successful-operation counter, the replay clock.
    pub query_count: u64,
    /// Milliseconds since the epoch at registration.
    pub created_at_ms: u64,
}

impl IdentityRecord {
    /// Fresh identity with a random session key and a zero query count.
    pub fn new(id_hash: [u8; 32], now_ms: u64, rng: &mut dyn RngCore) -> Self {
        let mut session_key = [0u8; 16];
        rng.fill_bytes(&mut session_key);
        Self { id_hash, session_key, query_count: 0, created_at_ms: now_ms }
    }

    /// Authenticator for the current query count.
    #[must_use]
    pub fn current_auth(&self) -> [u8; 16] {
        session_auth(self.query_count, &self.session_key, &self.id_hash)
    }

    /// Authenticator for the previous query count, if one exists.
    #[must_use]
    pub fn previous_auth(&self) -> Option<[u8; 16]> {
        self.query_count.checked_sub(1).map(|qc| session_auth(qc, &self.session_key, &self.id_hash))
    }

    /// Probe record for registry lookups by identity hash.
    #[must_use]
    pub fn probe(id_hash: [u8; 32]) -> Self {
        Self { id_hash, session_key: [0; 16], query_count: 0, created_at_ms: 0 }
    }
}

impl Record for IdentityRecord {
    const SIZE: usize = 32 + 16 + 8 + 8;
    const INDEX_COUNT: usize = 1;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id_hash);
        out.extend_from_slice(&self.session_key);
        out.extend_from_slice(&self.query_count.to_le_bytes());
        out.extend_from_slice(&self.created_at_ms.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() != Self::SIZE {
            return Err(StoreError::BadRecord { position: 0 });
        }

        let mut id_hash = [0u8; 32];
        id_hash.copy_from_slice(&bytes[..32]);
        let mut session_key = [0u8; 16];
        session_key.copy_from_slice(&bytes[32..48]);

        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[48..56]);
        let query_count = u64::from_le_bytes(word);
        word.copy_from_slice(&bytes[56..64]);
        let created_at_ms = u64::from_le_bytes(word);

        Ok(Self { id_hash, session_key, query_count, created_at_ms })
    }

    fn cmp_index(&self, other: &Self, _index: usize) -> Ordering {
        self.id_hash.cmp(&other.id_hash)
    }
}
