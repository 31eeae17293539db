//! Record contract for the indexed store.

use std::cmp::Ordering;

use crate::StoreError;

/// A fixed-width record the store can index and persist.
///
/// Serialization is explicit and field-by-field: the on-disk layout is
/// defined by `write_to`/`read_from`, never by the in-memory representation,
/// so structure padding and field order are irrelevant.
///
/// # Invariants
///
/// - `write_to` appends exactly [`Record::SIZE`] bytes.
/// - `read_from` consumes exactly [`Record::SIZE`] bytes and inverts
///   `write_to`.
/// - `cmp_index` is a total order for every `index < INDEX_COUNT`.
pub trait Record: Clone {
    /// Fixed on-disk width in bytes.
    const SIZE: usize;

    /// Number of indexes the store maintains for this record type.
    const INDEX_COUNT: usize;

    /// Append this record's on-disk form to `out`.
    fn write_to(&self, out: &mut Vec<u8>);

    /// Decode one record from a [`Record::SIZE`]-byte slice.
    ///
    /// # Errors
    ///
    /// [`StoreError::BadRecord`] when the slot does not decode; the caller
    /// fills in the position.
    fn read_from(bytes: &[u8]) -> Result<Self, StoreError>;

    /// Compare two records under the ordering of index `index`.
    fn cmp_index(&self, other: &Self, index: usize) -> Ordering;
}
