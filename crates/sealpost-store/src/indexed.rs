//! The multi-index container and its binary persistence.

use std::{cmp::Ordering, fs, path::Path};

use crate::{Record, StoreError};

/// Result of a range probe against one index.
///
/// On a hit, `start..end` is the contiguous run of index ranks whose
/// referenced records compare equal to the probe. On a miss, `start == end`
/// is the rank at which a matching record would be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeResult {
    /// Whether at least one record compared equal to the probe.
    pub exists: bool,
    /// First rank of the equal run, or the insertion point.
    pub start: usize,
    /// One past the last rank of the equal run, or the insertion point.
    pub end: usize,
}

/// Generic sorted multi-index record container.
///
/// Records live in an insertion-ordered backing vector; each index is a
/// vector of record positions kept sorted under the record's comparator for
/// that index. The store exclusively owns both; positions handed out by
/// lookups are invalidated by any removal.
#[derive(Debug, Clone)]
pub struct IndexedStore<R: Record> {
    records: Vec<R>,
    indexes: Vec<Vec<u32>>,
}

impl<R: Record> Default for IndexedStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> IndexedStore<R> {
    /// Create an empty store with `R::INDEX_COUNT` empty indexes.
    #[must_use]
    pub fn new() -> Self {
        Self { records: Vec::new(), indexes: vec![Vec::new(); R::INDEX_COUNT] }
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at a backing-sequence position.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&R> {
        self.records.get(position)
    }

    /// Backing-sequence position of the record at `rank` in `index`.
    #[must_use]
    pub fn position_at(&self, index: usize, rank: usize) -> Option<usize> {
        self.indexes.get(index)?.get(rank).map(|&p| p as usize)
    }

    fn cmp_at(&self, probe: &R, index: usize, rank: usize) -> Ordering {
        probe.cmp_index(&self.records[self.indexes[index][rank] as usize], index)
    }

    /// Locate the run of index ranks whose records compare equal to `probe`
    /// under `index`.
    ///
    /// Searches linearly for six or fewer records, and whenever bisection
    /// narrows the candidate window below four entries; otherwise bisects.
    /// A hit is expanded outward to cover the full equal-key run so callers
    /// can enumerate every record sharing the key.
    #[must_use]
    pub fn find_range(&self, probe: &R, index: usize) -> RangeResult {
        let n = self.records.len();
        if n == 0 {
            return RangeResult { exists: false, start: 0, end: 0 };
        }

        let (mut lo, mut hi) = (0usize, n);

        if n > 6 {
            while hi - lo >= 4 {
                let mid = lo + (hi - lo) / 2;
                match self.cmp_at(probe, index, mid) {
                    Ordering::Less => hi = mid,
                    Ordering::Greater => lo = mid + 1,
                    Ordering::Equal => return self.expand_run(probe, index, mid),
                }
            }
        }

        for rank in lo..hi {
            match self.cmp_at(probe, index, rank) {
                Ordering::Less => return RangeResult { exists: false, start: rank, end: rank },
                Ordering::Equal => return self.expand_run(probe, index, rank),
                Ordering::Greater => {},
            }
        }

        RangeResult { exists: false, start: hi, end: hi }
    }

    fn expand_run(&self, probe: &R, index: usize, hit: usize) -> RangeResult {
        let mut start = hit;
        while start > 0 && self.cmp_at(probe, index, start - 1) == Ordering::Equal {
            start -= 1;
        }

        let mut end = hit + 1;
        while end < self.records.len() && self.cmp_at(probe, index, end) == Ordering::Equal {
            end += 1;
        }

        RangeResult { exists: true, start, end }
    }

    /// Insert a record, keeping every index sorted.
    ///
    /// Among equal keys the new record lands after the last existing entry,
    /// preserving stable insertion order. Its position is the record count
    /// before the append.
    pub fn insert(&mut self, record: R) {
        let new_position = self.records.len() as u32;

        for index in 0..R::INDEX_COUNT {
            let range = self.find_range(&record, index);
            self.indexes[index].insert(range.end, new_position);
        }

        self.records.push(record);
    }

    /// Remove the record at a backing-sequence position.
    ///
    /// Every index entry referencing a later position is decremented to
    /// compensate for the backing-sequence shift; all previously obtained
    /// positions are invalidated.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidPosition`] for a position out of range.
    /// - [`StoreError::IndexCorrupt`] when an index does not contain the
    ///   entry it must contain - the store is corrupt and must not be
    ///   persisted.
    pub fn remove(&mut self, position: usize) -> Result<(), StoreError> {
        if position >= self.records.len() {
            return Err(StoreError::InvalidPosition { position, count: self.records.len() });
        }

        let record = self.records[position].clone();
        let target = position as u32;

        // Erase the entry from each index before any positions shift, so
        // the comparators still see a consistent backing sequence.
        for index in 0..R::INDEX_COUNT {
            let range = self.find_range(&record, index);
            if !range.exists {
                tracing::error!(index, position, "index entry missing for live record");
                return Err(StoreError::IndexCorrupt { index });
            }

            let Some(offset) =
                self.indexes[index][range.start..range.end].iter().position(|&p| p == target)
            else {
                tracing::error!(index, position, "equal-key run does not reference record");
                return Err(StoreError::IndexCorrupt { index });
            };

            self.indexes[index].remove(range.start + offset);
        }

        for entries in &mut self.indexes {
            for entry in entries.iter_mut() {
                if *entry > target {
                    *entry -= 1;
                }
            }
        }

        self.records.remove(position);
        Ok(())
    }

    /// Mutate the record at `position` without reordering any index.
    ///
    /// The closure may change non-key fields only; a mutation that would
    /// reorder an index is rejected and rolled back.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidPosition`] for a position out of range.
    /// - [`StoreError::KeyChanged`] when the mutated record no longer
    ///   compares equal to its old self under some index.
    pub fn update(&mut self, position: usize, f: impl FnOnce(&mut R)) -> Result<(), StoreError> {
        if position >= self.records.len() {
            return Err(StoreError::InvalidPosition { position, count: self.records.len() });
        }

        let before = self.records[position].clone();
        f(&mut self.records[position]);

        for index in 0..R::INDEX_COUNT {
            if before.cmp_index(&self.records[position], index) != Ordering::Equal {
                self.records[position] = before;
                return Err(StoreError::KeyChanged { position, index });
            }
        }

        Ok(())
    }

    /// Serialize the store into its binary file layout.
    ///
    /// `[record_count: u32 LE][records...][per index: record_count u32 LE]`
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let count = self.records.len();
        let mut out = Vec::with_capacity(4 + count * R::SIZE + R::INDEX_COUNT * count * 4);

        out.extend_from_slice(&(count as u32).to_le_bytes());
        for record in &self.records {
            record.write_to(&mut out);
        }
        for entries in &self.indexes {
            for entry in entries {
                out.extend_from_slice(&entry.to_le_bytes());
            }
        }

        out
    }

    /// Deserialize a store from the binary file layout.
    ///
    /// A zero-length input loads as an empty store with correctly-sized
    /// empty indexes.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Truncated`] when the input is shorter than the
    ///   declared record count requires.
    /// - [`StoreError::BadRecord`] when a record slot fails to decode.
    /// - [`StoreError::IndexCorrupt`] when an index entry points outside
    ///   the backing sequence.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }

        if bytes.len() < 4 {
            return Err(StoreError::Truncated { expected: 4, actual: bytes.len() });
        }

        let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let body = &bytes[4..];

        let expected = count * R::SIZE + R::INDEX_COUNT * count * 4;
        if body.len() < expected {
            return Err(StoreError::Truncated { expected, actual: body.len() });
        }

        let mut records = Vec::with_capacity(count);
        for position in 0..count {
            let slot = &body[position * R::SIZE..(position + 1) * R::SIZE];
            records.push(
                R::read_from(slot).map_err(|_| StoreError::BadRecord { position })?,
            );
        }

        let mut indexes = Vec::with_capacity(R::INDEX_COUNT);
        let mut offset = count * R::SIZE;
        for index in 0..R::INDEX_COUNT {
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let entry = u32::from_le_bytes([
                    body[offset],
                    body[offset + 1],
                    body[offset + 2],
                    body[offset + 3],
                ]);
                if entry as usize >= count {
                    return Err(StoreError::IndexCorrupt { index });
                }
                entries.push(entry);
                offset += 4;
            }
            indexes.push(entries);
        }

        Ok(Self { records, indexes })
    }

    /// Save to `path` crash-safely.
    ///
    /// Writes a uniquely named temporary file in the target directory, then
    /// renames it over the live file. A write or rename failure leaves the
    /// previous file untouched.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] on any filesystem failure.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, &self.to_bytes())?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.to_string()))?;

        tracing::debug!(path = %path.display(), records = self.records.len(), "store saved");
        Ok(())
    }

    /// Load from `path`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] when the file cannot be read (including when it
    /// does not exist - callers decide whether missing means empty), plus
    /// every [`Self::from_bytes`] error.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let store = Self::from_bytes(&bytes)?;

        tracing::debug!(path = %path.display(), records = store.records.len(), "store loaded");
        Ok(store)
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        for index in 0..R::INDEX_COUNT {
            assert_eq!(self.indexes[index].len(), self.records.len());

            let mut seen = vec![false; self.records.len()];
            for &entry in &self.indexes[index] {
                assert!(!seen[entry as usize], "duplicate index entry");
                seen[entry as usize] = true;
            }

            for pair in self.indexes[index].windows(2) {
                let a = &self.records[pair[0] as usize];
                let b = &self.records[pair[1] as usize];
                assert_ne!(
                    a.cmp_index(b, index),
                    Ordering::Greater,
                    "index {index} out of order"
                );
            }
        }
    }
}
