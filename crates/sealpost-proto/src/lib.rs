//! Wire format for the Sealpost relay protocol.
//!
//! Requests arrive as hex text over a CGI-style transport and decode into a
//! layered binary envelope:
//!
//! ```text
//! [outer GUID: 16] [opcode: 1][identity hash: 32] {auth: 16}{payload: ...}
//!  plaintext        sealed with the outer GUID     sealed with the session
//!                                                  GUID (authenticated ops)
//! ```
//!
//! This crate owns the structural layer only: framing, opcodes, status
//! codes, drain-item encoding, and the hex transport codec. Sealing and
//! unsealing the two encrypted layers is the caller's job, so every parser
//! here operates on already-decrypted bytes and every builder produces
//! bytes that are sealed afterwards.
//!
//! # Security
//!
//! Parsers are strictly bounds-checked and never panic on malformed input;
//! a frame that fails structural validation yields [`ProtocolError`] and no
//! partial result. Nothing in this crate trusts length fields beyond the
//! buffer it was handed.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cursor;
mod envelope;
mod errors;
mod opcode;
mod status;
mod transport;

pub use cursor::Cursor;
pub use envelope::{
    AUTH_LEN, DrainItem, GUID_LEN, HEAD_LEN, ID_LEN, MAX_MESSAGE_LEN, RequestFrame, STATUS_LEN,
    build_bootstrap_response, build_data_response, build_status_response, decode_drain_items,
    encode_drain_items, parse_auth_tail, parse_head, split_request, validate_message_text,
};
pub use errors::{ProtocolError, Result};
pub use opcode::Opcode;
pub use status::Status;
pub use transport::{MAX_CONTENT_LEN, decode_content, encode_content};
