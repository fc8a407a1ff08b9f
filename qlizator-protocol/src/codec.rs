//! Streaming encoder and decoder for QWP values.
//!
//! The wire format is plain MessagePack: each protocol message is one
//! self-describing value, and consecutive messages are simply
//! concatenated on the stream. Framing therefore happens inside the
//! value encoding itself, and the decoder buffers partial trailing
//! bytes until enough input has arrived to complete the next value.

use crate::error::ProtocolError;
use bytes::{Buf, Bytes, BytesMut};
use rmpv::Value;
use std::io;

/// Encodes a single value into its wire representation.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::with_capacity(128);
    rmpv::encode::write_value(&mut buf, value)?;
    Ok(buf)
}

/// Incremental decoder over a byte stream of concatenated values.
///
/// Callers push arbitrary chunks with [`extend`](Decoder::extend) and
/// pull however many complete values have accumulated with
/// [`next_value`](Decoder::next_value). There is no upper bound on the
/// buffered size; backpressure is the transport's concern.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Appends bytes to the internal buffer.
    pub fn extend_bytes(&mut self, data: Bytes) {
        self.buffer.extend_from_slice(&data);
    }

    /// Attempts to decode the next complete value from the buffer.
    ///
    /// Returns `Ok(Some(value))` if a complete value was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on malformed input.
    pub fn next_value(&mut self) -> Result<Option<Value>, ProtocolError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let mut cursor = io::Cursor::new(&self.buffer[..]);
        match rmpv::decode::read_value(&mut cursor) {
            Ok(value) => {
                let consumed = cursor.position() as usize;
                self.buffer.advance(consumed);
                Ok(Some(value))
            }
            Err(ref err) if is_truncated(err) => Ok(None),
            Err(err) => Err(ProtocolError::Decode(err)),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// A decode failure caused by the buffer ending mid-value means the
/// value is not complete yet, not that the stream is malformed.
fn is_truncated(err: &rmpv::decode::Error) -> bool {
    match err {
        rmpv::decode::Error::InvalidMarkerRead(io)
        | rmpv::decode::Error::InvalidDataRead(io) => io.kind() == io::ErrorKind::UnexpectedEof,
        _ => false,
    }
}
