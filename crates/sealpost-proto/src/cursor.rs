//! Bounds-checked reader over request bytes.

use crate::errors::{ProtocolError, Result};

/// Forward-only reader that fails instead of panicking on underflow.
#[derive(Debug)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    /// Start reading at the front of `bytes`.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Whether every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume the next `n` bytes.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Truncated`] when fewer than `n` bytes remain.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::Truncated { needed: n, available: self.remaining() });
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    /// Consume a fixed-width field.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Truncated`] when fewer than `N` bytes remain.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Consume one byte.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Truncated`] at end of input.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    /// Consume a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Truncated`] when fewer than two bytes remain.
    pub fn u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    /// Consume a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Truncated`] when fewer than eight bytes remain.
    pub fn u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Consume everything left.
    #[must_use]
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.bytes[self.offset..];
        self.offset = self.bytes.len();
        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fields_in_order() {
        let bytes = [0x01, 0x02, 0x03, 0xaa, 0xbb, 0xcc];
        let mut cursor = Cursor::new(&bytes);

        assert_eq!(cursor.u8().unwrap(), 0x01);
        assert_eq!(cursor.u16_le().unwrap(), 0x0302);
        assert_eq!(cursor.rest(), &[0xaa, 0xbb, 0xcc]);
        assert!(cursor.is_empty());
    }

    #[test]
    fn underflow_is_an_error_not_a_panic() {
        let mut cursor = Cursor::new(&[0x01]);
        let err = cursor.u64_le().unwrap_err();
        assert_eq!(err, ProtocolError::Truncated { needed: 8, available: 1 });

        // The failed read consumed nothing.
        assert_eq!(cursor.u8().unwrap(), 0x01);
    }

    #[test]
    fn rest_of_empty_cursor_is_empty() {
        let mut cursor = Cursor::new(&[]);
        assert_eq!(cursor.rest(), &[] as &[u8]);
    }
}
