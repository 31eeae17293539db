//! Request dispatcher.
//!
//! One entry point, [`Dispatcher::handle`], takes raw request bytes and
//! produces raw response bytes (or nothing). The flow for every request:
//!
//! 1. Structural parse. A frame too short to split is dropped without a
//!    response, before the lock is touched.
//! 2. Unseal the opcode and identity hash with the outer GUID.
//! 3. Take the store lock; a timeout aborts silently with no mutation.
//! 4. Load the registry; bootstrap and authenticated operations branch
//!    from there.
//! 5. On success of any non-drain operation, advance the identity's query
//!    count and save the registry before responding; if that save fails
//!    the response is suppressed, never sent with an unstored count.
//!
//! Authenticated operations accept the authenticator for the identity's
//! current query count. The authenticator for the previous count is
//! accepted only for drain, and then only in a zero-messages mode: it lets
//! a client that missed a response resynchronize without replaying being
//! useful to an eavesdropper.

use rand::RngCore;
use sealpost_crypto::{derive_session_guid, seal_with_guid, seal_with_key, session_auth};
use sealpost_proto::{
    AUTH_LEN, Cursor, DrainItem, ID_LEN, Opcode, Status, build_bootstrap_response,
    build_data_response, build_status_response, encode_drain_items, parse_auth_tail, parse_head,
    split_request, validate_message_text,
};

use crate::{
    codegen::{ArtifactGenerator, ArtifactRequest, derive_client_values},
    config::ServiceConfig,
    identity::IdentityRecord,
    lock::StoreLock,
    queue::{MessageQueue, QueueError},
    registry::IdentityRegistry,
};

/// How the presented authenticator matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMode {
    /// Matched the current query count.
    Current,
    /// Matched only the previous query count.
    Stale,
}

/// Serves one request at a time against the store files.
#[derive(Debug)]
pub struct Dispatcher<G, L> {
    config: ServiceConfig,
    generator: G,
    lock: L,
}

impl<G: ArtifactGenerator, L: StoreLock> Dispatcher<G, L> {
    /// Dispatcher over a config, an artifact generator, and a store lock.
    pub fn new(config: ServiceConfig, generator: G, lock: L) -> Self {
        Self { config, generator, lock }
    }

    /// The artifact generator in use.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Handle one raw request; `None` means no response is sent.
    ///
    /// `now_ms` is milliseconds since the epoch; callers own the clock so
    /// tests can drive time.
    pub fn handle(&self, raw: &[u8], now_ms: u64, rng: &mut dyn RngCore) -> Option<Vec<u8>> {
        // Malformed framing earns no response at all, and no lock work.
        let frame = match split_request(raw) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(%err, "unparseable request dropped");
                return None;
            }
        };

        let mut head = frame.head;
        seal_with_guid(&mut head, &frame.outer_guid);

        let Ok((opcode, id_hash)) = parse_head(&head) else {
            tracing::debug!("unknown opcode after unseal");
            return Some(seal_outer(build_status_response(Status::UnknownOp), &frame.outer_guid));
        };

        let _guard = match self.lock.acquire(self.config.lock_timeout) {
            Ok(guard) => guard,
            Err(err) => {
                tracing::warn!(%err, "request aborted waiting for store lock");
                return None;
            }
        };

        let mut registry = match IdentityRegistry::load(&self.config.registry_path) {
            Ok(registry) => registry,
            Err(err) => {
                tracing::error!(%err, "registry load failed");
                return Some(seal_outer(build_status_response(Status::Registry), &frame.outer_guid));
            }
        };

        match opcode {
            Opcode::Bootstrap => {
                self.bootstrap(&mut registry, id_hash, &frame.outer_guid, now_ms, rng)
            }
            _ => self.authenticated(
                &mut registry,
                opcode,
                id_hash,
                &frame.outer_guid,
                frame.tail,
                now_ms,
            ),
        }
    }

    fn bootstrap(
        &self,
        registry: &mut IdentityRegistry,
        id_hash: [u8; ID_LEN],
        outer_guid: &[u8; 16],
        now_ms: u64,
        rng: &mut dyn RngCore,
    ) -> Option<Vec<u8>> {
        if registry.lookup(id_hash).is_some() || registry.len() >= self.config.max_clients {
            tracing::warn!("bootstrap rejected: duplicate identity or registry full");
            return Some(seal_outer(build_status_response(Status::BadRequest), outer_guid));
        }

        let values = derive_client_values(&id_hash, rng);
        let request = ArtifactRequest {
            id_hash,
            session_key: values.session_key,
            seed: values.seed,
            expected_value: values.expected_value,
        };

        let artifact = match self.generator.generate(&request) {
            Ok(artifact) => artifact,
            Err(err) => {
                tracing::error!(%err, "bootstrap aborted: artifact generation failed");
                return Some(seal_outer(build_status_response(Status::Registry), outer_guid));
            }
        };

        // The bootstrap itself counts as the first successful operation.
        let record = IdentityRecord {
            id_hash,
            session_key: values.session_key,
            query_count: 1,
            created_at_ms: now_ms,
        };
        let auth = record.current_auth();

        if let Err(err) = registry
            .create(record, self.config.max_clients)
            .map_err(|e| e.to_string())
            .and_then(|()| registry.save(&self.config.registry_path).map_err(|e| e.to_string()))
        {
            tracing::error!(%err, "bootstrap aborted: registry not persisted");
            return Some(seal_outer(build_status_response(Status::Registry), outer_guid));
        }

        let Ok(response) = build_bootstrap_response(&auth, Status::Ok, &artifact) else {
            tracing::error!("bootstrap aborted: artifact exceeds the response length field");
            return Some(seal_outer(build_status_response(Status::Registry), outer_guid));
        };
        Some(seal_outer(response, outer_guid))
    }

    fn authenticated(
        &self,
        registry: &mut IdentityRegistry,
        opcode: Opcode,
        id_hash: [u8; ID_LEN],
        outer_guid: &[u8; 16],
        sealed_tail: &[u8],
        now_ms: u64,
    ) -> Option<Vec<u8>> {
        let Some(identity) = registry.lookup(id_hash) else {
            tracing::warn!("request for unregistered identity");
            return Some(seal_outer(build_status_response(Status::BadAuth), outer_guid));
        };
        let session_key = identity.session_key;
        let query_count = identity.query_count;

        if sealed_tail.len() < AUTH_LEN {
            return Some(seal_outer(build_status_response(Status::BadRequest), outer_guid));
        }

        let session_guid = derive_session_guid(&session_key, outer_guid);
        let mut tail = sealed_tail.to_vec();
        let Ok(()) = seal_with_key(&mut tail, &session_guid) else {
            unreachable!("session guid is always 16 bytes")
        };
        let Ok((presented, payload)) = parse_auth_tail(&tail) else {
            unreachable!("length checked above")
        };

        let mode = if presented == session_auth(query_count, &session_key, &id_hash) {
            AuthMode::Current
        } else if query_count > 0
            && presented == session_auth(query_count - 1, &session_key, &id_hash)
        {
            AuthMode::Stale
        } else {
            tracing::warn!("authenticator matched neither current nor previous count");
            return Some(seal_outer(build_status_response(Status::BadAuth), outer_guid));
        };

        // A stale authenticator is only good for an empty resync drain.
        if mode == AuthMode::Stale && opcode != Opcode::Drain {
            tracing::warn!(?opcode, "stale authenticator outside drain");
            return Some(seal_outer(build_status_response(Status::BadAuth), outer_guid));
        }

        let (status, response_payload) = match opcode {
            Opcode::Send => (self.op_send(id_hash, payload, now_ms), Vec::new()),
            Opcode::Drain => self.op_drain(id_hash, mode),
            Opcode::Purge => (self.op_purge(id_hash, payload, now_ms), Vec::new()),
            Opcode::Bootstrap => unreachable!("bootstrap handled before authentication"),
        };

        // Successful non-drain operations advance the replay clock before
        // the response leaves. If the new count cannot be persisted, no
        // response goes out at all: handing the client an authenticator
        // the registry never stored would lock it out. With no response
        // the client retries against the on-disk count and recovers.
        let mut response_count = query_count;
        if status.is_ok() && opcode != Opcode::Drain {
            if let Err(err) = registry
                .bump_query_count(id_hash)
                .and_then(|()| registry.save(&self.config.registry_path))
            {
                tracing::error!(%err, "query count not persisted; dropping the response");
                return None;
            }
            response_count += 1;
        }

        let auth = session_auth(response_count, &session_key, &id_hash);
        let mut response = build_data_response(&auth, status, &response_payload);
        let Ok(()) = seal_with_key(&mut response, &session_guid) else {
            unreachable!("session guid is always 16 bytes")
        };
        Some(response)
    }

    /// Send payload: `[receiver: 32][text len: 2 LE][text]`.
    fn op_send(&self, sender: [u8; ID_LEN], payload: &[u8], now_ms: u64) -> Status {
        let mut cursor = Cursor::new(payload);
        let Ok(receiver) = cursor.array::<ID_LEN>() else {
            return Status::BadIdWidth;
        };
        let Ok(len) = cursor.u16_le() else {
            return Status::ShortBuffer;
        };
        let Ok(text) = cursor.take(len as usize) else {
            return Status::ShortBuffer;
        };
        if validate_message_text(text).is_err() {
            return Status::ShortBuffer;
        }

        let mut queue = match MessageQueue::load(&self.config.queue_path) {
            Ok(queue) => queue,
            Err(err) => {
                tracing::error!(%err, "queue load failed");
                return Status::QueueLoad;
            }
        };

        match queue.enforce_limits(sender, now_ms, &self.config.retention) {
            Ok(()) => {}
            Err(QueueError::Full { .. }) => return Status::QueueFull,
            Err(QueueError::Store(err)) => {
                tracing::error!(%err, "retention enforcement failed");
                return Status::LimitsExceeded;
            }
        }

        if let Err(err) = queue.upsert(receiver, sender, text, now_ms) {
            tracing::error!(%err, "upsert failed");
            return Status::UpsertFailed;
        }
        if let Err(err) = queue.save(&self.config.queue_path) {
            tracing::error!(%err, "queue save failed");
            return Status::QueueSave;
        }

        Status::Ok
    }

    fn op_drain(&self, receiver: [u8; ID_LEN], mode: AuthMode) -> (Status, Vec<u8>) {
        let empty = || {
            let Ok(payload) = encode_drain_items(&[]) else {
                unreachable!("empty drain always encodes")
            };
            payload
        };

        // Stale mode confirms the session without handing out messages.
        if mode == AuthMode::Stale {
            return (Status::Ok, empty());
        }

        let mut queue = match MessageQueue::load(&self.config.queue_path) {
            Ok(queue) => queue,
            Err(err) => {
                tracing::error!(%err, "queue load failed");
                return (Status::QueueLoad, Vec::new());
            }
        };

        let drained = match queue.drain(receiver) {
            Ok(drained) => drained,
            Err(err) => {
                tracing::error!(%err, "drain failed");
                return (Status::QueueLoad, Vec::new());
            }
        };

        if !drained.is_empty()
            && let Err(err) = queue.save(&self.config.queue_path)
        {
            tracing::error!(%err, "queue save failed after drain");
            return (Status::QueueSave, Vec::new());
        }

        let items: Vec<DrainItem> = drained
            .iter()
            .map(|record| DrainItem {
                sender: record.sender,
                timestamp_ms: record.timestamp_ms,
                text: record.text().to_vec(),
            })
            .collect();

        match encode_drain_items(&items) {
            Ok(payload) => (Status::Ok, payload),
            Err(err) => {
                tracing::error!(%err, "drain payload failed to encode");
                (Status::ShortBuffer, Vec::new())
            }
        }
    }

    /// Purge payload: `[cutoff: 8 LE]`, administrator only.
    fn op_purge(&self, caller: [u8; ID_LEN], payload: &[u8], now_ms: u64) -> Status {
        if caller != self.config.admin_id_hash {
            tracing::warn!("purge attempted by non-administrator");
            return Status::BadAuth;
        }

        let mut cursor = Cursor::new(payload);
        let Ok(cutoff_ms) = cursor.u64_le() else {
            return Status::BadRequest;
        };
        if cutoff_ms > now_ms {
            return Status::BadRequest;
        }

        let mut queue = match MessageQueue::load(&self.config.queue_path) {
            Ok(queue) => queue,
            Err(err) => {
                tracing::error!(%err, "queue load failed");
                return Status::QueueLoad;
            }
        };

        match queue
            .purge_older_than(cutoff_ms)
            .map_err(QueueError::from)
            .and_then(|purged| {
                queue.save(&self.config.queue_path)?;
                Ok(purged)
            }) {
            Ok(purged) => {
                tracing::debug!(purged, "purge completed");
                Status::Ok
            }
            Err(err) => {
                tracing::error!(%err, "purge failed");
                Status::QueueSave
            }
        }
    }
}

fn seal_outer(mut bytes: Vec<u8>, outer_guid: &[u8; 16]) -> Vec<u8> {
    seal_with_guid(&mut bytes, outer_guid);
    bytes
}
