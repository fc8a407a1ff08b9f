//! Client error types.

use qlizator_protocol::{ProtocolError, ReplyHeader};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request timeout")]
    Timeout,

    #[error("not connected")]
    NotConnected,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("unrecognized reply")]
    UnrecognizedReply,

    #[error("server error [{code}] {message}: {details}")]
    Server {
        code: i64,
        message: String,
        details: String,
    },

    #[error("no encoder registered for parameter type {0}")]
    UnencodableParam(&'static str),
}

impl ClientError {
    /// Builds the error for a header reporting a nonzero status.
    pub(crate) fn server(header: &ReplyHeader) -> Self {
        ClientError::Server {
            code: header.status,
            message: header
                .message
                .clone()
                .unwrap_or_else(|| "no error message".to_string()),
            details: header
                .details
                .clone()
                .unwrap_or_else(|| "no details".to_string()),
        }
    }
}
