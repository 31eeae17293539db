//! Request framing and response assembly.
//!
//! All parsers here expect their encrypted layer to be removed already;
//! all builders return plaintext that the caller seals before transport.

use bytes::BufMut;

use crate::{
    Cursor, Opcode, Status,
    errors::{ProtocolError, Result},
};

/// Width of a GUID field.
pub const GUID_LEN: usize = 16;

/// Width of an identity hash.
pub const ID_LEN: usize = 32;

/// Width of a session authenticator.
pub const AUTH_LEN: usize = 16;

/// Width of a response status field.
pub const STATUS_LEN: usize = 4;

/// Width of the encrypted request head: opcode plus identity hash.
pub const HEAD_LEN: usize = 1 + ID_LEN;

/// Message slot width. Text is zero-terminated inside the slot, so the
/// longest message is one byte shorter.
pub const MAX_MESSAGE_LEN: usize = 256;

/// A structurally split request.
///
/// `head` is an owned copy so the caller can decrypt it in place; `tail`
/// stays borrowed because authenticated operations copy it out themselves.
#[derive(Debug)]
pub struct RequestFrame<'a> {
    /// Plaintext outer GUID, the nonce for the head layer.
    pub outer_guid: [u8; GUID_LEN],
    /// Opcode and identity hash, still sealed with the outer GUID.
    pub head: [u8; HEAD_LEN],
    /// Authenticator and payload, still sealed with the session GUID.
    /// Empty for bootstrap requests.
    pub tail: &'a [u8],
}

/// Split a raw request into GUID, head, and tail.
///
/// # Errors
///
/// [`ProtocolError::Truncated`] when the request cannot hold a GUID and a
/// head.
pub fn split_request(bytes: &[u8]) -> Result<RequestFrame<'_>> {
    let mut cursor = Cursor::new(bytes);
    let outer_guid = cursor.array()?;
    let head = cursor.array()?;
    Ok(RequestFrame { outer_guid, head, tail: cursor.rest() })
}

/// Interpret a decrypted request head.
///
/// # Errors
///
/// [`ProtocolError::UnknownOpcode`] when the first byte names no operation.
pub fn parse_head(head: &[u8; HEAD_LEN]) -> Result<(Opcode, [u8; ID_LEN])> {
    let opcode = Opcode::try_from(head[0])?;
    let mut id_hash = [0u8; ID_LEN];
    id_hash.copy_from_slice(&head[1..]);
    Ok((opcode, id_hash))
}

/// Split a decrypted authenticated tail into authenticator and payload.
///
/// # Errors
///
/// [`ProtocolError::Truncated`] when the tail cannot hold an authenticator.
pub fn parse_auth_tail(tail: &[u8]) -> Result<([u8; AUTH_LEN], &[u8])> {
    let mut cursor = Cursor::new(tail);
    let auth = cursor.array()?;
    Ok((auth, cursor.rest()))
}

/// Check message text against the wire slot: non-empty ASCII with no NUL
/// bytes, short enough to leave room for the terminator.
///
/// # Errors
///
/// - [`ProtocolError::MessageTooLong`] past the slot limit.
/// - [`ProtocolError::BadMessageText`] for empty, NUL-bearing, or
///   non-ASCII text.
pub fn validate_message_text(text: &[u8]) -> Result<()> {
    if text.len() >= MAX_MESSAGE_LEN {
        return Err(ProtocolError::MessageTooLong { len: text.len(), max: MAX_MESSAGE_LEN - 1 });
    }
    if text.is_empty() || text.iter().any(|&b| b == 0 || !b.is_ascii()) {
        return Err(ProtocolError::BadMessageText);
    }
    Ok(())
}

/// One message handed back by a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainItem {
    /// Identity hash of the sender.
    pub sender: [u8; ID_LEN],
    /// Milliseconds since the epoch when the relay accepted the message.
    pub timestamp_ms: u64,
    /// Message text, already validated on the way in.
    pub text: Vec<u8>,
}

/// Encode drained messages as `[text len: 1][sender: 32][timestamp: 8 LE]
/// [text]` per item, closed by a zero length byte.
///
/// Text lengths are non-zero by construction, so the terminator is
/// unambiguous.
///
/// # Errors
///
/// [`ProtocolError`] variants from [`validate_message_text`] if an item
/// carries text the wire format cannot hold.
pub fn encode_drain_items(items: &[DrainItem]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for item in items {
        validate_message_text(&item.text)?;
        out.put_u8(item.text.len() as u8);
        out.put_slice(&item.sender);
        out.put_u64_le(item.timestamp_ms);
        out.put_slice(&item.text);
    }
    out.put_u8(0);
    Ok(out)
}

/// Decode a drain payload back into its items.
///
/// # Errors
///
/// [`ProtocolError::Truncated`] when an item or the terminator is cut off.
pub fn decode_drain_items(bytes: &[u8]) -> Result<Vec<DrainItem>> {
    let mut cursor = Cursor::new(bytes);
    let mut items = Vec::new();
    loop {
        let len = cursor.u8()? as usize;
        if len == 0 {
            return Ok(items);
        }
        items.push(DrainItem {
            sender: cursor.array()?,
            timestamp_ms: cursor.u64_le()?,
            text: cursor.take(len)?.to_vec(),
        });
    }
}

/// Assemble a bootstrap response: `[auth: 16][status: 4][artifact len: 2
/// LE][artifact]`. Sealed with the outer GUID by the caller.
///
/// # Errors
///
/// [`ProtocolError::ArtifactTooLarge`] when the artifact length does not
/// fit the 16-bit field.
pub fn build_bootstrap_response(
    auth: &[u8; AUTH_LEN],
    status: Status,
    artifact: &[u8],
) -> Result<Vec<u8>> {
    let len =
        u16::try_from(artifact.len()).map_err(|_| ProtocolError::ArtifactTooLarge {
            len: artifact.len(),
        })?;

    let mut out = Vec::with_capacity(AUTH_LEN + STATUS_LEN + 2 + artifact.len());
    out.put_slice(auth);
    out.put_slice(status.code());
    out.put_u16_le(len);
    out.put_slice(artifact);
    Ok(out)
}

/// Assemble an authenticated-operation response: `[auth: 16][status: 4]
/// [payload]`. Sealed with the session GUID by the caller.
#[must_use]
pub fn build_data_response(auth: &[u8; AUTH_LEN], status: Status, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(AUTH_LEN + STATUS_LEN + payload.len());
    out.put_slice(auth);
    out.put_slice(status.code());
    out.put_slice(payload);
    out
}

/// Assemble a bare status response for requests rejected before any
/// session state was touched. Sealed with the outer GUID by the caller.
#[must_use]
pub fn build_status_response(status: Status) -> Vec<u8> {
    status.code().to_vec()
}
