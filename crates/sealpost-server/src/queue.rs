//! Message queue with retention enforcement.

use std::path::Path;

use sealpost_store::{IndexedStore, StoreError};
use thiserror::Error;

use crate::{
    config::RetentionPolicy,
    message::{INDEX_PRIMARY, INDEX_SENDER, INDEX_TIMESTAMP, MessageRecord},
};

/// Queue failures beyond plain store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Queue is at capacity and nothing was stale enough to evict.
    #[error("queue full: {cap} pending messages")]
    Full {
        /// The configured capacity.
        cap: usize,
    },
}

/// All pending messages.
///
/// Enforces the single-pending-message policy: one queued message per
/// `(receiver, sender)` pair, newer sends replacing older ones.
#[derive(Debug, Default)]
pub struct MessageQueue {
    store: IndexedStore<MessageRecord>,
}

impl MessageQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self { store: IndexedStore::new() }
    }

    /// Number of pending messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn pair_position(&self, receiver: [u8; 32], sender: [u8; 32]) -> Option<usize> {
        let range = self.store.find_range(&MessageRecord::probe_pair(receiver, sender), INDEX_PRIMARY);
        if !range.exists {
            return None;
        }
        self.store.position_at(INDEX_PRIMARY, range.start)
    }

    /// Queue a message, replacing any pending one from the same sender to
    /// the same receiver.
    ///
    /// The timestamp is an index key, so replacement is remove-then-insert
    /// rather than in-place mutation.
    ///
    /// # Errors
    ///
    /// Store errors from the removal of the replaced record.
    pub fn upsert(
        &mut self,
        receiver: [u8; 32],
        sender: [u8; 32],
        text: &[u8],
        now_ms: u64,
    ) -> Result<(), StoreError> {
        if let Some(position) = self.pair_position(receiver, sender) {
            tracing::debug!("replacing pending message for pair");
            self.store.remove(position)?;
        }
        self.store.insert(MessageRecord::new(receiver, sender, now_ms, text));
        Ok(())
    }

    /// Number of messages a sender has pending.
    #[must_use]
    pub fn sender_count(&self, sender: [u8; 32]) -> usize {
        let probe = MessageRecord::probe_sender(sender);
        let start = self.store.find_range(&probe, INDEX_SENDER).start;

        (start..self.store.len())
            .map_while(|rank| self.store.position_at(INDEX_SENDER, rank))
            .map_while(|position| self.store.get(position))
            .take_while(|record| record.sender == sender)
            .count()
    }

    /// Apply retention limits ahead of accepting a message from `sender`.
    ///
    /// At capacity, stale messages are evicted oldest-first; if the queue
    /// is still full the send is rejected. A sender strictly over its
    /// quota loses its single oldest pending message.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Full`] at capacity with nothing stale to evict.
    /// - Store errors from eviction removals.
    pub fn enforce_limits(
        &mut self,
        sender: [u8; 32],
        now_ms: u64,
        policy: &RetentionPolicy,
    ) -> Result<(), QueueError> {
        if self.store.len() >= policy.max_pending {
            let evicted = self.evict_stale(now_ms, policy.stale_ms)?;
            tracing::warn!(evicted, pending = self.store.len(), "queue at capacity");

            if self.store.len() >= policy.max_pending {
                return Err(QueueError::Full { cap: policy.max_pending });
            }
        }

        if self.sender_count(sender) > policy.per_sender_quota {
            // The front of the sender's block is its oldest message.
            let probe = MessageRecord::probe_sender(sender);
            let start = self.store.find_range(&probe, INDEX_SENDER).start;
            if let Some(position) = self.store.position_at(INDEX_SENDER, start) {
                tracing::warn!("sender over quota, evicting oldest");
                self.store.remove(position)?;
            }
        }

        Ok(())
    }

    fn evict_stale(&mut self, now_ms: u64, stale_ms: u64) -> Result<usize, StoreError> {
        let mut evicted = 0;
        while let Some(position) = self.store.position_at(INDEX_TIMESTAMP, 0) {
            let Some(record) = self.store.get(position) else { break };
            if now_ms.saturating_sub(record.timestamp_ms) < stale_ms {
                break;
            }
            self.store.remove(position)?;
            evicted += 1;
        }
        Ok(evicted)
    }

    /// Remove and return every message pending for `receiver`, walking
    /// the receiver's block front to back.
    ///
    /// # Errors
    ///
    /// Store errors from the removals; messages already taken stay taken.
    pub fn drain(&mut self, receiver: [u8; 32]) -> Result<Vec<MessageRecord>, StoreError> {
        let mut drained = Vec::new();

        loop {
            let probe = MessageRecord::probe_pair(receiver, [0u8; 32]);
            let rank = self.store.find_range(&probe, INDEX_PRIMARY).start;
            let Some(position) = self.store.position_at(INDEX_PRIMARY, rank) else { break };
            let Some(record) = self.store.get(position) else { break };
            if record.receiver != receiver {
                break;
            }

            drained.push(record.clone());
            self.store.remove(position)?;
        }

        tracing::debug!(count = drained.len(), "queue drained for receiver");
        Ok(drained)
    }

    /// Delete every message older than `cutoff_ms`. Returns how many.
    ///
    /// # Errors
    ///
    /// Store errors from the removals.
    pub fn purge_older_than(&mut self, cutoff_ms: u64) -> Result<usize, StoreError> {
        let mut purged = 0;
        while let Some(position) = self.store.position_at(INDEX_TIMESTAMP, 0) {
            let Some(record) = self.store.get(position) else { break };
            if record.timestamp_ms >= cutoff_ms {
                break;
            }
            self.store.remove(position)?;
            purged += 1;
        }

        tracing::debug!(purged, "queue purged");
        Ok(purged)
    }

    /// Load from file; a missing file is an empty queue.
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
    use super::*;

    fn id(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[test]
    fn upsert_replaces_the_pending_pair_message() {
        let mut queue = MessageQueue::new();
        queue.upsert(id(1), id(2), b"first", 100).unwrap();
        queue.upsert(id(1), id(2), b"second", 200).unwrap();

        assert_eq!(queue.len(), 1);
        let drained = queue.drain(id(1)).unwrap();
        assert_eq!(drained[0].text(), b"second");
        assert_eq!(drained[0].timestamp_ms, 200);
    }

    #[test]
    fn distinct_pairs_coexist() {
        let mut queue = MessageQueue::new();
        queue.upsert(id(1), id(2), b"a", 1).unwrap();
        queue.upsert(id(1), id(3), b"b", 2).unwrap();
        queue.upsert(id(2), id(2), b"c", 3).unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.drain(id(1)).unwrap().len(), 2);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn drain_of_unknown_receiver_is_empty() {
        let mut queue = MessageQueue::new();
        queue.upsert(id(1), id(2), b"a", 1).unwrap();
        assert!(queue.drain(id(9)).unwrap().is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn quota_evicts_the_senders_oldest() {
        let policy = RetentionPolicy { max_pending: 100, stale_ms: 1000, per_sender_quota: 2 };
        let mut queue = MessageQueue::new();
        queue.upsert(id(1), id(9), b"old", 10).unwrap();
        queue.upsert(id(2), id(9), b"mid", 20).unwrap();
        queue.upsert(id(3), id(9), b"new", 30).unwrap();

        // Three pending is strictly over a quota of two.
        queue.enforce_limits(id(9), 40, &policy).unwrap();

        assert_eq!(queue.len(), 2);
        assert!(queue.drain(id(1)).unwrap().is_empty());
        assert_eq!(queue.drain(id(2)).unwrap().len(), 1);
    }

    #[test]
    fn quota_boundary_is_strictly_greater() {
        let policy = RetentionPolicy { max_pending: 100, stale_ms: 1000, per_sender_quota: 2 };
        let mut queue = MessageQueue::new();
        queue.upsert(id(1), id(9), b"a", 10).unwrap();
        queue.upsert(id(2), id(9), b"b", 20).unwrap();

        // Exactly at quota: nothing evicted.
        queue.enforce_limits(id(9), 40, &policy).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn capacity_evicts_stale_then_accepts() {
        let policy = RetentionPolicy { max_pending: 2, stale_ms: 100, per_sender_quota: 20 };
        let mut queue = MessageQueue::new();
        queue.upsert(id(1), id(2), b"stale", 0).unwrap();
        queue.upsert(id(1), id(3), b"fresh", 950).unwrap();

        // At capacity; the first message is 1000ms old, past the 100ms
        // staleness bar.
        queue.enforce_limits(id(4), 1000, &policy).unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn capacity_with_nothing_stale_rejects() {
        let policy = RetentionPolicy { max_pending: 2, stale_ms: 10_000, per_sender_quota: 20 };
        let mut queue = MessageQueue::new();
        queue.upsert(id(1), id(2), b"a", 990).unwrap();
        queue.upsert(id(1), id(3), b"b", 995).unwrap();

        assert_eq!(
            queue.enforce_limits(id(4), 1000, &policy),
            Err(QueueError::Full { cap: 2 })
        );
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn purge_removes_strictly_older() {
        let mut queue = MessageQueue::new();
        queue.upsert(id(1), id(2), b"a", 100).unwrap();
        queue.upsert(id(1), id(3), b"b", 200).unwrap();
        queue.upsert(id(1), id(4), b"c", 300).unwrap();

        assert_eq!(queue.purge_older_than(200).unwrap(), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn survives_a_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.db");

        let mut queue = MessageQueue::new();
        queue.upsert(id(1), id(2), b"persisted", 42).unwrap();
        queue.save(&path).unwrap();

        let mut loaded = MessageQueue::load(&path).unwrap();
        let drained = loaded.drain(id(1)).unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].text(), b"persisted");
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MessageQueue::load(&dir.path().join("absent.db")).unwrap().is_empty());
    }
}
