use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Which side(s) of a connection to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Stop reading; the peer's further data is discarded.
    Read,
    /// Stop writing; the peer sees end of stream.
    Write,
    /// Both directions.
    Both,
}

impl From<CloseMode> for Shutdown {
    fn from(mode: CloseMode) -> Self {
        match mode {
            CloseMode::Read => Shutdown::Read,
            CloseMode::Write => Shutdown::Write,
            CloseMode::Both => Shutdown::Both,
        }
    }
}

/// A connected bidirectional byte stream implementing `Read` and `Write`.
///
/// Returned by dialing and by accepting on a logical listener. The owner
/// closes it explicitly; half-closing with [`Connection::shutdown`] leaves the
/// descriptor open, [`Connection::close`] shuts down both sides and releases it.
pub struct Connection {
    inner: TcpStream,
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl Connection {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self { inner: stream }
    }

    /// Set read timeout on the underlying stream.
    ///
    /// A read that times out reports no data; the frame layer counts those
    /// towards its stall limit.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Enable or disable `TCP_NODELAY`.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Into::into)
    }

    /// Try to clone this connection (creates a new file descriptor).
    ///
    /// Used to hand one handle to a reader and one to a writer.
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_tcp(cloned))
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    /// Local address of this end.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Into::into)
    }

    /// Shut down one or both directions without releasing the descriptor.
    pub fn shutdown(&self, mode: CloseMode) -> Result<()> {
        self.inner
            .shutdown(mode.into())
            .map_err(TransportError::CloseFailed)
    }

    /// Shut down both directions and release the descriptor.
    pub fn close(self) -> Result<()> {
        self.shutdown(CloseMode::Both)
    }

    /// Borrow the underlying TCP stream.
    pub fn get_ref(&self) -> &TcpStream {
        &self.inner
    }

    /// Consume the connection and return the TCP stream.
    pub fn into_inner(self) -> TcpStream {
        self.inner
    }
}

impl From<TcpStream> for Connection {
    fn from(stream: TcpStream) -> Self {
        Self::from_tcp(stream)
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("fd", &self.inner.as_raw_fd())
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn pair() -> (Connection, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (Connection::from(client), Connection::from(server))
    }

    #[test]
    fn read_write_through_connection() {
        let (mut client, mut server) = pair();
        client.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn write_half_close_signals_end_of_stream() {
        let (mut client, mut server) = pair();
        client.write_all(b"bye").unwrap();
        client.shutdown(CloseMode::Write).unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"bye");

        // The read side of the client is still usable after a write half-close.
        server.write_all(b"ack").unwrap();
        let mut buf = [0u8; 3];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ack");
    }

    #[test]
    fn cloned_handles_share_the_socket() {
        let (client, mut server) = pair();
        let mut writer = client.try_clone().unwrap();
        writer.write_all(b"x").unwrap();
        let mut buf = [0u8; 1];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");
        assert_eq!(client.peer_addr().unwrap(), server.local_addr().unwrap());
    }

    #[test]
    fn close_releases_connection() {
        let (client, mut server) = pair();
        client.close().unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(server.read(&mut buf).unwrap(), 0);
    }
}
