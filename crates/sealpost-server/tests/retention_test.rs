//! Retention behavior through the full dispatcher: quota eviction, stale
//! eviction at capacity, and hard rejection.

mod common;

use common::{
    StubGenerator, bootstrap_request, build_request, client_auth, open_session,
    parse_data_response, send_payload,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sealpost_proto::{Opcode, Status, decode_drain_items};
use sealpost_server::{Dispatcher, MutexLock, RetentionPolicy, ServiceConfig};

struct Relay {
    dispatcher: Dispatcher<StubGenerator, MutexLock>,
    rng: ChaCha8Rng,
}

impl Relay {
    fn new(dir: &std::path::Path, retention: RetentionPolicy) -> Self {
        let mut config = ServiceConfig::new(dir);
        config.retention = retention;
        Self {
            dispatcher: Dispatcher::new(config, StubGenerator::new(), MutexLock::new()),
            rng: ChaCha8Rng::seed_from_u64(7),
        }
    }

    fn bootstrap(&mut self, id: [u8; 32]) -> [u8; 16] {
        let guid = [id[0]; 16];
        let response =
            self.dispatcher.handle(&bootstrap_request(&guid, &id), 0, &mut self.rng);
        assert!(response.is_some());
        self.dispatcher.generator().last_session_key()
    }

    fn send(
        &mut self,
        sender: ([u8; 32], [u8; 16], u64),
        receiver: [u8; 32],
        text: &[u8],
        now_ms: u64,
    ) -> Status {
        let (id, key, count) = sender;
        let guid = [0x33; 16];
        let auth = client_auth(count, &key, &id);
        let request = build_request(
            &guid,
            Opcode::Send,
            &id,
            Some((&key, &auth, &send_payload(&receiver, text))),
        );
        let mut response = self.dispatcher.handle(&request, now_ms, &mut self.rng).unwrap();
        open_session(&mut response, &key, &guid);
        parse_data_response(&response).1
    }

    fn drain(&mut self, id: [u8; 32], key: [u8; 16], count: u64, now_ms: u64) -> Vec<Vec<u8>> {
        let guid = [0x44; 16];
        let auth = client_auth(count, &key, &id);
        let request = build_request(&guid, Opcode::Drain, &id, Some((&key, &auth, &[])));
        let mut response = self.dispatcher.handle(&request, now_ms, &mut self.rng).unwrap();
        open_session(&mut response, &key, &guid);
        let (_, status, payload) = parse_data_response(&response);
        assert_eq!(status, Status::Ok);
        decode_drain_items(payload).unwrap().into_iter().map(|item| item.text).collect()
    }
}

#[test]
fn over_quota_sender_loses_its_oldest() {
    let dir = tempfile::tempdir().unwrap();
    let policy = RetentionPolicy { max_pending: 100, stale_ms: 1_000_000, per_sender_quota: 2 };
    let mut relay = Relay::new(dir.path(), policy);

    let sender = [0x05; 32];
    let sender_key = relay.bootstrap(sender);
    let receivers: Vec<[u8; 32]> = (1u8..=4).map(|b| [b; 32]).collect();
    let receiver_keys: Vec<[u8; 16]> =
        receivers.iter().map(|&receiver| relay.bootstrap(receiver)).collect();

    // The quota check runs before each accept, so three pending messages
    // survive a quota of two; the fourth send finds the count strictly
    // over quota and evicts the sender's oldest.
    for (i, receiver) in receivers.iter().enumerate() {
        let status = relay.send(
            (sender, sender_key, i as u64 + 1),
            *receiver,
            format!("msg-{i}").as_bytes(),
            1_000 + i as u64,
        );
        assert_eq!(status, Status::Ok);
    }

    // msg-0 (the sender's oldest) was evicted; the rest arrived.
    assert!(relay.drain(receivers[0], receiver_keys[0], 1, 3_000).is_empty());
    for i in 1..4 {
        let got = relay.drain(receivers[i], receiver_keys[i], 1, 3_000);
        assert_eq!(got, vec![format!("msg-{i}").into_bytes()]);
    }
}

#[test]
fn full_queue_rejects_when_nothing_is_stale() {
    let dir = tempfile::tempdir().unwrap();
    let policy = RetentionPolicy { max_pending: 2, stale_ms: 1_000_000, per_sender_quota: 20 };
    let mut relay = Relay::new(dir.path(), policy);

    let a = [0x0a; 32];
    let b = [0x0b; 32];
    let c = [0x0c; 32];
    let receiver = [0x01; 32];
    let key_a = relay.bootstrap(a);
    let key_b = relay.bootstrap(b);
    let key_c = relay.bootstrap(c);
    relay.bootstrap(receiver);

    assert_eq!(relay.send((a, key_a, 1), receiver, b"one", 1_000), Status::Ok);
    assert_eq!(relay.send((b, key_b, 1), receiver, b"two", 1_001), Status::Ok);

    // Queue at capacity, nothing stale: hard reject.
    assert_eq!(relay.send((c, key_c, 1), receiver, b"three", 1_002), Status::QueueFull);
}

#[test]
fn full_queue_evicts_stale_and_accepts() {
    let dir = tempfile::tempdir().unwrap();
    let policy = RetentionPolicy { max_pending: 2, stale_ms: 1_000, per_sender_quota: 20 };
    let mut relay = Relay::new(dir.path(), policy);

    let a = [0x0a; 32];
    let b = [0x0b; 32];
    let c = [0x0c; 32];
    let receiver = [0x01; 32];
    let key_a = relay.bootstrap(a);
    let key_b = relay.bootstrap(b);
    let key_c = relay.bootstrap(c);
    let key_r = relay.bootstrap(receiver);

    assert_eq!(relay.send((a, key_a, 1), receiver, b"stale", 0), Status::Ok);
    assert_eq!(relay.send((b, key_b, 1), receiver, b"fresh", 9_500), Status::Ok);

    // The first message is 10s old against a 1s staleness bar; it is
    // evicted to make room.
    assert_eq!(relay.send((c, key_c, 1), receiver, b"newest", 10_000), Status::Ok);

    let texts = relay.drain(receiver, key_r, 1, 10_001);
    assert_eq!(texts.len(), 2);
    assert!(texts.contains(&b"fresh".to_vec()));
    assert!(texts.contains(&b"newest".to_vec()));
}

#[test]
fn resend_to_same_receiver_replaces_not_accumulates() {
    let dir = tempfile::tempdir().unwrap();
    let mut relay = Relay::new(dir.path(), RetentionPolicy::default());

    let sender = [0x05; 32];
    let receiver = [0x01; 32];
    let key_s = relay.bootstrap(sender);
    let key_r = relay.bootstrap(receiver);

    assert_eq!(relay.send((sender, key_s, 1), receiver, b"draft", 1_000), Status::Ok);
    assert_eq!(relay.send((sender, key_s, 2), receiver, b"final", 2_000), Status::Ok);

    let texts = relay.drain(receiver, key_r, 1, 3_000);
    assert_eq!(texts, vec![b"final".to_vec()]);
}
