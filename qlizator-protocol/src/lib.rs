//! # qlizator-protocol
//!
//! Wire protocol implementation for qlizator (QWP - qlizator Wire Protocol).
//!
//! This crate provides:
//! - Streaming MessagePack encoding/decoding of protocol values
//! - Request construction and reply header parsing
//! - Server status codes and protocol constants
//!
//! Every protocol message is a single self-describing MessagePack value
//! ([`rmpv::Value`]); there is no additional framing envelope, so the
//! decoder supports feed-incrementally/emit-as-complete semantics.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{encode_value, Decoder};
pub use error::ProtocolError;
pub use message::{status, Column, Operation, ReplyHeader, Request};

pub use rmpv::Value;

/// Maximum number of bind variables a single statement may carry.
pub const MAX_VARIABLE_NUMBER: usize = 999;
