//! Byte-stream transport abstraction for plain TCP.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

/// A blocking duplex byte-stream transport.
///
/// Reads return whatever is immediately available; a return of 0 means
/// the peer closed the stream. End-of-reply detection (the short-chunk
/// rule) lives above this trait, in the reply iterator.
pub trait Transport: Send {
    /// Writes the whole buffer or fails.
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Reads up to `buf.len()` bytes, blocking until data arrives, the
    /// configured timeout elapses, or the peer closes.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Shuts down both directions of the stream.
    fn shutdown(&mut self) -> io::Result<()>;
}

/// A plain TCP transport with per-operation timeouts.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connects to the server, bounding the connect itself and every
    /// subsequent read/write by the given timeouts.
    pub fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, connect_timeout)?;
        stream.set_nodelay(true).ok();
        stream.set_read_timeout(Some(io_timeout))?;
        stream.set_write_timeout(Some(io_timeout))?;
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown(Shutdown::Both)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_tcp_send_recv() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"hello");
            stream.write_all(b"world").unwrap();
        });

        let mut transport =
            TcpTransport::connect(addr, Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        transport.send(b"hello").unwrap();

        let mut buf = [0u8; 64];
        let n = transport.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"world");

        transport.shutdown().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_recv_zero_on_remote_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut transport =
            TcpTransport::connect(addr, Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        server.join().unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(transport.recv(&mut buf).unwrap(), 0);
    }
}
