//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur while encoding or decoding
/// wire values.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed value in byte stream: {0}")]
    Decode(#[from] rmpv::decode::Error),

    #[error("value cannot be encoded: {0}")]
    Encode(#[from] rmpv::encode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_decode_error_display() {
        // 0xc1 is the reserved marker, never valid at the start of a value
        let mut cursor = Cursor::new(&[0xc1u8][..]);
        let err: ProtocolError = rmpv::decode::read_value(&mut cursor).unwrap_err().into();
        assert!(err.to_string().contains("malformed"));
    }
}
