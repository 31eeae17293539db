//! Fuzz target for the indexed record store
//!
//! # Strategy
//!
//! - Arbitrary interleavings of insert, remove, and update against a
//!   message queue store
//! - Serialize and re-load at the end of every run
//!
//! # Invariants
//!
//! - Every index stays sorted and references every live record exactly once
//! - `to_bytes`/`from_bytes` round-trips the full store

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealpost_server::MessageRecord;
use sealpost_store::IndexedStore;

#[derive(Debug, Arbitrary)]
enum Op {
    Insert {
        receiver: u8,
        sender: u8,
        timestamp_ms: u16,
        text_seed: u8,
    },
    Remove {
        position: u8,
    },
    Touch {
        position: u8,
        text_seed: u8,
    },
}

fn id(tag: u8) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[0] = tag % 8;
    out
}

fuzz_target!(|ops: Vec<Op>| {
    let mut store: IndexedStore<MessageRecord> = IndexedStore::new();

    for op in ops.into_iter().take(64) {
        match op {
            Op::Insert {
                receiver,
                sender,
                timestamp_ms,
                text_seed,
            } => {
                let text = [b'a' + text_seed % 26];
                store.insert(MessageRecord::new(
                    id(receiver),
                    id(sender),
                    u64::from(timestamp_ms),
                    &text,
                ));
            }
            Op::Remove { position } => {
                if !store.is_empty() {
                    let position = usize::from(position) % store.len();
                    store.remove(position).expect("live position");
                }
            }
            Op::Touch { position, text_seed } => {
                if !store.is_empty() {
                    let position = usize::from(position) % store.len();
                    let text = [b'a' + text_seed % 26];
                    // Text is not an index key, so this must always succeed.
                    store
                        .update(position, |record| {
                            let mut rewritten = MessageRecord::new(
                                record.receiver,
                                record.sender,
                                record.timestamp_ms,
                                &text,
                            );
                            std::mem::swap(record, &mut rewritten);
                        })
                        .expect("index keys unchanged");
                }
            }
        }

        for index in 0..3 {
            for rank in 0..store.len() {
                let position = store.position_at(index, rank).expect("rank in bounds");
                let record = store.get(position).expect("live position");
                let range = store.find_range(record, index);
                assert!(range.exists);
                assert!(range.start <= rank && rank < range.end);
            }
        }
    }

    let reloaded: IndexedStore<MessageRecord> =
        IndexedStore::from_bytes(&store.to_bytes()).expect("round-trip");
    assert_eq!(reloaded.len(), store.len());
    for position in 0..store.len() {
        assert_eq!(reloaded.get(position), store.get(position));
    }
});
