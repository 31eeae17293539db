//! Identity registry.

use std::path::Path;

use sealpost_store::{IndexedStore, StoreError};
use thiserror::Error;

use crate::identity::IdentityRecord;

/// Registry failures beyond plain store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An identity with this hash is already registered.
    #[error("identity already registered")]
    Duplicate,

    /// Registry is at its identity cap.
    #[error("registry full: {cap} identities")]
    Full {
        /// The configured cap.
        cap: usize,
    },
}

/// All registered identities, indexed by identity hash.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    store: IndexedStore<IdentityRecord>,
}

impl IdentityRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { store: IndexedStore::new() }
    }

    /// Number of registered identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no identity is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Find an identity by hash.
    #[must_use]
    pub fn lookup(&self, id_hash: [u8; 32]) -> Option<&IdentityRecord> {
        let range = self.store.find_range(&IdentityRecord::probe(id_hash), 0);
        if !range.exists {
            return None;
        }
        self.store.get(self.store.position_at(0, range.start)?)
    }

    /// Register a new identity.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Duplicate`] for an already-registered hash.
    /// - [`RegistryError::Full`] at the identity cap.
    pub fn create(&mut self, record: IdentityRecord, cap: usize) -> Result<(), RegistryError> {
        if self.store.len() >= cap {
            return Err(RegistryError::Full { cap });
        }
        if self.lookup(record.id_hash).is_some() {
            return Err(RegistryError::Duplicate);
        }

        tracing::debug!(identities = self.store.len() + 1, "identity registered");
        self.store.insert(record);
        Ok(())
    }

    /// Advance an identity's query count by one.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidPosition`] when the hash is not registered.
    pub fn bump_query_count(&mut self, id_hash: [u8; 32]) -> Result<(), StoreError> {
        let range = self.store.find_range(&IdentityRecord::probe(id_hash), 0);
        if !range.exists {
            return Err(StoreError::InvalidPosition { position: 0, count: self.store.len() });
        }

        let Some(position) = self.store.position_at(0, range.start) else {
            return Err(StoreError::IndexCorrupt { index: 0 });
        };
        self.store.update(position, |r| r.query_count += 1)
    }

    /// Remove an identity entirely.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidPosition`] when the hash is not registered.
    pub fn remove(&mut self, id_hash: [u8; 32]) -> Result<(), StoreError> {
        let range = self.store.find_range(&IdentityRecord::probe(id_hash), 0);
        if !range.exists {
            return Err(StoreError::InvalidPosition { position: 0, count: self.store.len() });
        }

        let Some(position) = self.store.position_at(0, range.start) else {
            return Err(StoreError::IndexCorrupt { index: 0 });
        };
        self.store.remove(position)
    }

    /// Load from file; a missing file is an empty registry.
    ///
    /// # Errors
    ///
    /// Store format and I/O errors other than file-not-found.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        Ok(Self { store: IndexedStore::load_from_path(path)? })
    }

    /// Persist to file.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] on filesystem failure.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        self.store.save_to_path(path)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn identity(byte: u8, rng: &mut ChaCha8Rng) -> IdentityRecord {
        IdentityRecord::new([byte; 32], 0, rng)
    }

    #[test]
    fn create_then_lookup() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut registry = IdentityRegistry::new();
        let record = identity(7, &mut rng);

        registry.create(record.clone(), 10).unwrap();
        assert_eq!(registry.lookup([7; 32]), Some(&record));
        assert_eq!(registry.lookup([8; 32]), None);
    }

    #[test]
    fn duplicate_hash_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut registry = IdentityRegistry::new();

        registry.create(identity(7, &mut rng), 10).unwrap();
        assert_eq!(registry.create(identity(7, &mut rng), 10), Err(RegistryError::Duplicate));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn cap_is_enforced() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut registry = IdentityRegistry::new();

        registry.create(identity(1, &mut rng), 2).unwrap();
        registry.create(identity(2, &mut rng), 2).unwrap();
        assert_eq!(registry.create(identity(3, &mut rng), 2), Err(RegistryError::Full { cap: 2 }));
    }

    #[test]
    fn bump_advances_only_the_target() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut registry = IdentityRegistry::new();
        registry.create(identity(1, &mut rng), 10).unwrap();
        registry.create(identity(2, &mut rng), 10).unwrap();

        registry.bump_query_count([2; 32]).unwrap();

        assert_eq!(registry.lookup([1; 32]).unwrap().query_count, 0);
        assert_eq!(registry.lookup([2; 32]).unwrap().query_count, 1);
    }

    #[test]
    fn remove_unregisters() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut registry = IdentityRegistry::new();
        registry.create(identity(1, &mut rng), 10).unwrap();

        registry.remove([1; 32]).unwrap();
        assert!(registry.lookup([1; 32]).is_none());
        assert!(registry.remove([1; 32]).is_err());
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = IdentityRegistry::load(&dir.path().join("absent.db")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn survives_a_save_load_cycle() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.db");

        let mut registry = IdentityRegistry::new();
        let record = identity(9, &mut rng);
        registry.create(record.clone(), 10).unwrap();
        registry.bump_query_count([9; 32]).unwrap();
        registry.save(&path).unwrap();

        let loaded = IdentityRegistry::load(&path).unwrap();
        assert_eq!(loaded.lookup([9; 32]).unwrap().query_count, 1);
        assert_eq!(loaded.lookup([9; 32]).unwrap().session_key, record.session_key);
    }
}
