//! Hex transport codec.
//!
//! The relay speaks hex text over its CGI-style transport: requests arrive
//! as a hex string (query string or request body), responses leave as
//! uppercase hex on stdout. Inbound content is capped before decoding so a
//! hostile client cannot make the service buffer arbitrary input.

use crate::errors::{ProtocolError, Result};

/// Largest accepted inbound content, in characters.
pub const MAX_CONTENT_LEN: usize = 500;

/// Decode inbound hex content into request bytes.
///
/// Surrounding ASCII whitespace is trimmed and both hex cases are
/// accepted; clients are not uniform about either.
///
/// # Errors
///
/// - [`ProtocolError::ContentTooLong`] past [`MAX_CONTENT_LEN`] characters.
/// - [`ProtocolError::BadHex`] for odd length or non-hex characters.
pub fn decode_content(content: &str) -> Result<Vec<u8>> {
    if content.len() > MAX_CONTENT_LEN {
        return Err(ProtocolError::ContentTooLong { len: content.len(), max: MAX_CONTENT_LEN });
    }
    hex::decode(content.trim_matches(|c: char| c.is_ascii_whitespace()))
        .map_err(|e| ProtocolError::BadHex(e.to_string()))
}

/// Encode response bytes as uppercase hex.
#[must_use]
pub fn encode_content(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn decodes_either_case_and_trims_whitespace() {
        assert_eq!(decode_content("deadBEEF").unwrap(), hex!("deadbeef"));
        assert_eq!(decode_content("00ff\n").unwrap(), hex!("00ff"));
    }

    #[test]
    fn encodes_uppercase() {
        assert_eq!(encode_content(&hex!("00ff7a")), "00FF7A");
    }

    #[test]
    fn rejects_odd_length_and_non_hex() {
        assert!(matches!(decode_content("abc").unwrap_err(), ProtocolError::BadHex(_)));
        assert!(matches!(decode_content("zz").unwrap_err(), ProtocolError::BadHex(_)));
    }

    #[test]
    fn rejects_over_cap_before_decoding() {
        let content = "a".repeat(MAX_CONTENT_LEN + 1);
        assert_eq!(
            decode_content(&content).unwrap_err(),
            ProtocolError::ContentTooLong { len: MAX_CONTENT_LEN + 1, max: MAX_CONTENT_LEN }
        );
    }

    #[test]
    fn empty_content_is_empty_bytes() {
        assert!(decode_content("").unwrap().is_empty());
    }
}
