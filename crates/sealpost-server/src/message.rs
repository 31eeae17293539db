//! Pending-message record stored in the queue.

use std::cmp::Ordering;

use sealpost_proto::MAX_MESSAGE_LEN;
use sealpost_store::{Record, StoreError};

/// One pending message.
///
/// Text lives in a fixed slot, zero-terminated; the single-pending-message
/// policy makes `(receiver, sender)` unique across the queue.
///
/// Indexes:
/// - 0: `(receiver, sender)` - a receiver's messages form one contiguous
///   block, drained front to back.
/// - 1: `(sender, timestamp)` - per-sender quota accounting; the first
///   entry of a sender's block is its oldest message.
/// - 2: `timestamp` - stale eviction oldest-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Identity hash of the receiver.
    pub receiver: [u8; 32],
    /// Identity hash of the sender.
    pub sender: [u8; 32],
    /// Milliseconds since the epoch when the relay accepted the message.
    pub timestamp_ms: u64,
    /// Zero-terminated text slot.
    pub text: [u8; MAX_MESSAGE_LEN],
}

/// Index over `(receiver, sender)`.
pub const INDEX_PRIMARY: usize = 0;
/// Index over `(sender, timestamp)`.
pub const INDEX_SENDER: usize = 1;
/// Index over `timestamp`.
pub const INDEX_TIMESTAMP: usize = 2;

impl MessageRecord {
    /// Build a record from already-validated text.
    ///
    /// Text longer than the slot minus its terminator is truncated;
    /// callers validate length before getting here.
    #[must_use]
    pub fn new(receiver: [u8; 32], sender: [u8; 32], timestamp_ms: u64, text: &[u8]) -> Self {
        let mut slot = [0u8; MAX_MESSAGE_LEN];
        let len = text.len().min(MAX_MESSAGE_LEN - 1);
        slot[..len].copy_from_slice(&text[..len]);
        Self { receiver, sender, timestamp_ms, text: slot }
    }

    /// Text up to its zero terminator.
    #[must_use]
    pub fn text(&self) -> &[u8] {
        let end = self.text.iter().position(|&b| b == 0).unwrap_or(self.text.len());
        &self.text[..end]
    }

    /// Probe for primary-index lookups of a `(receiver, sender)` pair.
    #[must_use]
    pub fn probe_pair(receiver: [u8; 32], sender: [u8; 32]) -> Self {
        Self::new(receiver, sender, 0, b"-")
    }

    /// Probe for sender-index lookups: timestamp zero sits at the front
    /// of the sender's block, so a miss lands on its first message.
    #[must_use]
    pub fn probe_sender(sender: [u8; 32]) -> Self {
        Self::new([0; 32], sender, 0, b"-")
    }

    /// Probe for timestamp-index lookups.
    #[must_use]
    pub fn probe_timestamp(timestamp_ms: u64) -> Self {
        Self::new([0; 32], [0; 32], timestamp_ms, b"-")
    }
}

impl Record for MessageRecord {
    const SIZE: usize = 32 + 32 + 8 + MAX_MESSAGE_LEN;
    const INDEX_COUNT: usize = 3;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.receiver);
        out.extend_from_slice(&self.sender);
        out.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        out.extend_from_slice(&self.text);
    }

    fn read_from(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() != Self::SIZE {
            return Err(StoreError::BadRecord { position: 0 });
        }

        let mut receiver = [0u8; 32];
        receiver.copy_from_slice(&bytes[..32]);
        let mut sender = [0u8; 32];
        sender.copy_from_slice(&bytes[32..64]);

        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[64..72]);
        let timestamp_ms = u64::from_le_bytes(word);

        let mut text = [0u8; MAX_MESSAGE_LEN];
        text.copy_from_slice(&bytes[72..]);

        Ok(Self { receiver, sender, timestamp_ms, text })
    }

    fn cmp_index(&self, other: &Self, index: usize) -> Ordering {
        match index {
            INDEX_PRIMARY => {
                self.receiver.cmp(&other.receiver).then_with(|| self.sender.cmp(&other.sender))
            }
            INDEX_SENDER => self
                .sender
                .cmp(&other.sender)
                .then_with(|| self.timestamp_ms.cmp(&other.timestamp_ms)),
            _ => self.timestamp_ms.cmp(&other.timestamp_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_width_matches_declared_size() {
        let record = MessageRecord::new([1; 32], [2; 32], 42, b"hello");

        let mut bytes = Vec::new();
        record.write_to(&mut bytes);
        assert_eq!(bytes.len(), MessageRecord::SIZE);
        assert_eq!(MessageRecord::read_from(&bytes).unwrap(), record);
    }

    #[test]
    fn text_stops_at_terminator() {
        let record = MessageRecord::new([0; 32], [0; 32], 0, b"short");
        assert_eq!(record.text(), b"short");
    }

    #[test]
    fn longest_text_fills_slot_minus_terminator() {
        let text = [b'a'; MAX_MESSAGE_LEN - 1];
        let record = MessageRecord::new([0; 32], [0; 32], 0, &text);
        assert_eq!(record.text().len(), MAX_MESSAGE_LEN - 1);
    }

    #[test]
    fn primary_index_ignores_timestamp() {
        let a = MessageRecord::new([1; 32], [2; 32], 100, b"x");
        let b = MessageRecord::new([1; 32], [2; 32], 999, b"y");
        assert_eq!(a.cmp_index(&b, INDEX_PRIMARY), Ordering::Equal);
    }

    #[test]
    fn sender_index_orders_by_timestamp_within_sender() {
        let a = MessageRecord::new([9; 32], [2; 32], 100, b"x");
        let b = MessageRecord::new([1; 32], [2; 32], 999, b"y");
        assert_eq!(a.cmp_index(&b, INDEX_SENDER), Ordering::Less);
    }

    #[test]
    fn sender_probe_sorts_before_real_messages() {
        let probe = MessageRecord::probe_sender([2; 32]);
        let real = MessageRecord::new([1; 32], [2; 32], 1, b"x");
        assert_eq!(probe.cmp_index(&real, INDEX_SENDER), Ordering::Less);
    }
}
