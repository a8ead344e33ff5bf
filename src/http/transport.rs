//! Transport abstraction — any non-blocking byte-oriented channel.
//!
//! Concrete implementations:
//! - TCP socket (lwIP over WiFi on the device, `std::net` on the host)
//! - in-memory transports for tests
//!
//! The dispatcher is generic over `Transport` + `Listener`, so the entire
//! cooperative loop runs unmodified against scripted byte streams in tests.

use core::net::Ipv4Addr;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

/// Transport-level failures. Anything but "no data right now" tears the
/// connection down; HTTP state never survives a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Peer closed the connection.
    Closed,
    /// Underlying I/O error.
    Io,
}

/// Byte-oriented non-blocking transport channel.
pub trait Transport {
    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns `Ok(0)` if no data is available right now (non-blocking);
    /// an orderly peer close is `Err(Closed)`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write `data`, returning the number of bytes actually accepted
    /// (`Ok(0)` when the send buffer is full).
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), TransportError>;
}

/// Connection source the dispatcher polls once per iteration.
pub trait Listener {
    type Conn: Transport;

    /// Accept at most one pending connection, never blocking.
    fn poll_accept(&mut self) -> Option<(Self::Conn, Ipv4Addr)>;
}

// ---------------------------------------------------------------------------
// Null transport
// ---------------------------------------------------------------------------

/// A transport that discards all writes and never reads. Useful as a
/// placeholder before the network is up.
pub struct NullTransport;

impl Transport for NullTransport {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(0)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TCP transport (std::net, non-blocking — lwIP-backed on ESP-IDF)
// ---------------------------------------------------------------------------

/// A non-blocking TCP stream.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Result<Self, TransportError> {
        stream
            .set_nonblocking(true)
            .map_err(|_| TransportError::Io)?;
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.stream.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(0),
            Err(_) => Err(TransportError::Io),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        match self.stream.write(data) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(0),
            Err(_) => Err(TransportError::Io),
        }
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        match self.stream.flush() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
            Err(_) => Err(TransportError::Io),
        }
    }
}

/// Non-blocking TCP accept source bound to the configured port.
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub fn bind(port: u16) -> Result<Self, TransportError> {
        let listener =
            TcpListener::bind(("0.0.0.0", port)).map_err(|_| TransportError::Io)?;
        listener
            .set_nonblocking(true)
            .map_err(|_| TransportError::Io)?;
        Ok(Self { listener })
    }

    pub fn local_port(&self) -> Option<u16> {
        self.listener.local_addr().ok().map(|a| a.port())
    }
}

impl Listener for TcpAcceptor {
    type Conn = TcpTransport;

    fn poll_accept(&mut self) -> Option<(TcpTransport, Ipv4Addr)> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                let ip = match addr {
                    SocketAddr::V4(v4) => *v4.ip(),
                    SocketAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
                };
                TcpTransport::new(stream).ok().map(|t| (t, ip))
            }
            Err(_) => None,
        }
    }
}
