//! # qlizator-client
//!
//! Client library for qlizator.
//!
//! This crate provides:
//! - Blocking TCP client with a strict request-then-full-reply session
//! - Cursor API for issuing statements and consuming result rows,
//!   either greedily or as a lazy single-pass iterator
//! - A type conversion registry for carrying application-defined
//!   value types over the wire
//!
//! Connections are not safe for concurrent use; run one connection per
//! worker thread. There is no retry or reconnect logic anywhere: a
//! connection that has failed once is closed and must be replaced.

pub mod connection;
pub mod cursor;
pub mod error;
pub mod registry;
pub mod transport;

pub use connection::{Connection, ConnectionConfig, Replies};
pub use cursor::{Cursor, Row, Rows};
pub use error::ClientError;
pub use registry::{Param, TypeRegistry};
pub use transport::{TcpTransport, Transport};

pub use qlizator_protocol::Value;
