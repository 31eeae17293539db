//! Shared client-side helpers for dispatcher integration tests.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

use std::sync::Mutex;

use sealpost_crypto::{derive_session_guid, seal_with_guid, seal_with_key, session_auth};
use sealpost_proto::{AUTH_LEN, ID_LEN, Opcode, STATUS_LEN, Status};
use sealpost_server::{ArtifactGenerator, ArtifactRequest, CodegenError};

/// Artifact bytes the stub generator hands out.
pub const STUB_ARTIFACT: &[u8] = b"stub-client-binary";

/// Generator that records the request and returns fixed bytes, so tests
/// can read the minted session key without decoding an artifact.
#[derive(Debug, Default)]
pub struct StubGenerator {
    pub last: Mutex<Option<ArtifactRequest>>,
}

impl StubGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_session_key(&self) -> [u8; 16] {
        self.last.lock().unwrap().as_ref().unwrap().session_key
    }
}

impl ArtifactGenerator for StubGenerator {
    fn generate(&self, req: &ArtifactRequest) -> Result<Vec<u8>, CodegenError> {
        *self.last.lock().unwrap() = Some(req.clone());
        Ok(STUB_ARTIFACT.to_vec())
    }
}

/// Generator that always fails, for bootstrap-abort tests.
#[derive(Debug)]
pub struct FailingGenerator;

impl ArtifactGenerator for FailingGenerator {
    fn generate(&self, _req: &ArtifactRequest) -> Result<Vec<u8>, CodegenError> {
        Err(CodegenError::CompilerFailed { code: Some(1) })
    }
}

/// Client-side request assembly: seal the head with the outer GUID and,
/// for authenticated operations, the tail with the derived session GUID.
pub fn build_request(
    outer_guid: &[u8; 16],
    op: Opcode,
    id_hash: &[u8; ID_LEN],
    session: Option<(&[u8; 16], &[u8; AUTH_LEN], &[u8])>,
) -> Vec<u8> {
    let mut head = [0u8; 1 + ID_LEN];
    head[0] = op.as_byte();
    head[1..].copy_from_slice(id_hash);
    seal_with_guid(&mut head, outer_guid);

    let mut request = outer_guid.to_vec();
    request.extend_from_slice(&head);

    if let Some((session_key, auth, payload)) = session {
        let mut tail = auth.to_vec();
        tail.extend_from_slice(payload);
        let session_guid = derive_session_guid(session_key, outer_guid);
        seal_with_key(&mut tail, &session_guid).unwrap();
        request.extend_from_slice(&tail);
    }

    request
}

pub fn bootstrap_request(outer_guid: &[u8; 16], id_hash: &[u8; ID_LEN]) -> Vec<u8> {
    build_request(outer_guid, Opcode::Bootstrap, id_hash, None)
}

pub fn client_auth(query_count: u64, session_key: &[u8; 16], id_hash: &[u8; ID_LEN]) -> [u8; 16] {
    session_auth(query_count, session_key, id_hash)
}

/// Remove the outer seal from a response (the cipher is symmetric).
pub fn open_outer(response: &mut [u8], outer_guid: &[u8; 16]) {
    seal_with_guid(response, outer_guid);
}

/// Remove the session seal from a response.
pub fn open_session(response: &mut [u8], session_key: &[u8; 16], outer_guid: &[u8; 16]) {
    let session_guid = derive_session_guid(session_key, outer_guid);
    seal_with_key(response, &session_guid).unwrap();
}

/// Split an opened data response into authenticator, status, and payload.
pub fn parse_data_response(opened: &[u8]) -> ([u8; AUTH_LEN], Status, &[u8]) {
    let mut auth = [0u8; AUTH_LEN];
    auth.copy_from_slice(&opened[..AUTH_LEN]);
    let mut code = [0u8; STATUS_LEN];
    code.copy_from_slice(&opened[AUTH_LEN..AUTH_LEN + STATUS_LEN]);
    (auth, Status::from_code(code).unwrap(), &opened[AUTH_LEN + STATUS_LEN..])
}

/// Parse an opened bare-status response.
pub fn parse_status_response(opened: &[u8]) -> Status {
    let mut code = [0u8; STATUS_LEN];
    code.copy_from_slice(&opened[..STATUS_LEN]);
    Status::from_code(code).unwrap()
}

/// Send-operation payload: `[receiver][text len: 2 LE][text]`.
pub fn send_payload(receiver: &[u8; ID_LEN], text: &[u8]) -> Vec<u8> {
    let mut payload = receiver.to_vec();
    payload.extend_from_slice(&(text.len() as u16).to_le_bytes());
    payload.extend_from_slice(text);
    payload
}
