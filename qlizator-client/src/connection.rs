//! Connection management.
//!
//! A connection owns one transport and speaks a strict
//! request-then-full-reply protocol: a request is sent in one atomic
//! write and its reply is consumed as a lazy sequence of decoded
//! values before the next request may go out. The exclusive borrow
//! taken by [`Connection::transmit`] enforces that at compile time.

use crate::cursor::Cursor;
use crate::error::ClientError;
use crate::registry::TypeRegistry;
use crate::transport::{TcpTransport, Transport};
use qlizator_protocol::{encode_value, status, Decoder, ReplyHeader, Request, Value};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection configuration.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Database path on the server.
    pub database: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Timeout for each individual blocking read or write.
    pub request_timeout: Duration,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Free-form option keys merged into the connect request.
    pub options: Vec<(String, Value)>,
    /// Type conversion registry, shared across connections when cloned.
    pub registry: Arc<TypeRegistry>,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr, database: impl Into<String>) -> Self {
        Self {
            addr,
            database: database.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            options: Vec::new(),
            registry: Arc::new(TypeRegistry::new()),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }
}

/// A connection to a qlizator server.
///
/// The transport is discarded on the first transport- or
/// protocol-level failure; every subsequent operation fails fast with
/// [`ClientError::NotConnected`]. There is no automatic reconnect.
pub struct Connection {
    config: ConnectionConfig,
    transport: Option<Box<dyn Transport>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.transport.is_none())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Connects over TCP and performs the protocol `connect` handshake.
    pub fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        tracing::debug!("connecting to {}", config.addr);
        let transport =
            TcpTransport::connect(config.addr, config.connect_timeout, config.request_timeout)
                .map_err(map_io)?;
        Self::with_transport(Box::new(transport), config)
    }

    /// Performs the protocol `connect` handshake over an already
    /// established transport.
    ///
    /// The connection takes ownership of the transport; on handshake
    /// failure it is shut down and released along with the half-built
    /// connection.
    pub fn with_transport(
        transport: Box<dyn Transport>,
        config: ConnectionConfig,
    ) -> Result<Self, ClientError> {
        let mut conn = Self {
            config,
            transport: Some(transport),
        };
        conn.handshake()?;
        tracing::debug!("handshake complete, database {}", conn.config.database);
        Ok(conn)
    }

    fn handshake(&mut self) -> Result<(), ClientError> {
        let request = Request::Connect {
            database: self.config.database.clone(),
            options: self.config.options.clone(),
        }
        .to_value();
        let replies = self.transmit(&request)?;
        check_status(replies)
    }

    /// Sends a request and returns the live decode-as-you-read
    /// sequence over its reply.
    ///
    /// Only one reply sequence can exist at a time; it must be drained
    /// or dropped before the connection can be used again.
    pub fn transmit(&mut self, request: &Value) -> Result<Replies<'_>, ClientError> {
        let encoded = encode_value(request)?;
        let buffer_size = self.config.read_buffer_size;

        let transport = self.transport.as_mut().ok_or(ClientError::NotConnected)?;
        tracing::debug!("sending request ({} bytes)", encoded.len());
        if let Err(err) = transport.send(&encoded) {
            tracing::debug!("send failed: {}", err);
            self.transport = None;
            return Err(map_io(err));
        }

        Ok(Replies {
            conn: self,
            decoder: Decoder::new(),
            buf: vec![0u8; buffer_size],
            done: false,
        })
    }

    /// Drops the database this connection is bound to. Leaves the
    /// transport open.
    pub fn drop_database(&mut self) -> Result<(), ClientError> {
        tracing::debug!("dropping database {}", self.config.database);
        let request = Request::Drop {
            database: self.config.database.clone(),
        }
        .to_value();
        let replies = self.transmit(&request)?;
        check_status(replies)
    }

    /// Shuts down and releases the transport. Subsequent operations
    /// fail with [`ClientError::NotConnected`].
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            tracing::debug!("closing connection");
            let _ = transport.shutdown();
        }
    }

    /// Returns whether the transport has been released, either by
    /// [`close`](Connection::close) or by an earlier failure.
    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    /// The database path this connection is bound to.
    pub fn database(&self) -> &str {
        &self.config.database
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.config.registry
    }

    /// Opens a cursor bound to this connection.
    pub fn cursor(&mut self) -> Cursor<'_> {
        Cursor::new(self)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Lazy sequence of decoded reply values for one request.
///
/// The sequence ends when the peer closes or when a transport read
/// returns a short chunk, the signal that no more reply data is
/// immediately available. A transport failure mid-read discards the
/// transport and surfaces once as an error item.
pub struct Replies<'conn> {
    conn: &'conn mut Connection,
    decoder: Decoder,
    buf: Vec<u8>,
    done: bool,
}

impl Iterator for Replies<'_> {
    type Item = Result<Value, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.decoder.next_value() {
                Ok(Some(value)) => return Some(Ok(value)),
                Ok(None) => {}
                Err(err) => {
                    // malformed stream, nothing after it can be trusted
                    self.done = true;
                    self.conn.transport = None;
                    return Some(Err(err.into()));
                }
            }

            if self.done {
                return None;
            }

            let transport = match self.conn.transport.as_mut() {
                Some(transport) => transport,
                None => {
                    self.done = true;
                    return Some(Err(ClientError::NotConnected));
                }
            };

            match transport.recv(&mut self.buf) {
                Ok(0) => {
                    tracing::debug!("peer closed mid-reply");
                    self.done = true;
                }
                Ok(n) => {
                    self.decoder.extend(&self.buf[..n]);
                    if n < self.buf.len() {
                        self.done = true;
                    }
                }
                Err(err) => {
                    tracing::debug!("receive failed: {}", err);
                    self.done = true;
                    self.conn.transport = None;
                    return Some(Err(map_io(err)));
                }
            }
        }
    }
}

/// Shared status-check rule for non-query endpoints: the reply must be
/// exactly one header-shaped value with a success status.
fn check_status(mut replies: Replies<'_>) -> Result<(), ClientError> {
    let first = match replies.next() {
        Some(Ok(value)) => value,
        Some(Err(err)) => return Err(err),
        None => return Err(ClientError::UnrecognizedReply),
    };
    match replies.next() {
        None => {}
        Some(Err(err)) => return Err(err),
        Some(Ok(_)) => return Err(ClientError::UnrecognizedReply),
    }

    let header = ReplyHeader::from_value(&first).ok_or(ClientError::UnrecognizedReply)?;
    if header.status != status::OK {
        return Err(ClientError::server(&header));
    }
    Ok(())
}

fn map_io(err: io::Error) -> ClientError {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ClientError::Timeout,
        _ => ClientError::Io(err),
    }
}
