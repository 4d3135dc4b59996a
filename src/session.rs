//! Blocking transport sessions
//!
//! [`SessionOps`] abstracts the byte transport under a connection, so that
//! plain TCP and TLS streams drive the same connection code. [`Transport`]
//! layers the connection timeout over a session: every read and write polls
//! the descriptor first and converts an expired poll into the matching
//! timeout error.
//!
//! A transport is shared between the connection and any content channels
//! detached from it, so it is handed around as [`SharedTransport`].

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::os::fd::AsRawFd;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use socket2::{Domain, Socket, Type};

use crate::channel::{Error, IBinaryChannel, OBinaryChannel, Result};

/// Readiness to wait for when polling a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
}

/// Operations on a byte transport, abstracting over plain TCP and TLS
pub trait SessionOps: Send {
    /// Wait until the session is ready for `events`, or the timeout expires
    ///
    /// Returns `false` when the timeout expired before readiness.
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    /// Read bytes from the session (0 = end of stream)
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write bytes to the session, returning how many were accepted
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Shut the session down
    fn close(&mut self) -> Result<()>;
}

/// Poll a raw file descriptor for readiness
pub(crate) fn poll_fd(fd: i32, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
    use libc::{poll, pollfd, POLLIN, POLLOUT};

    let mut pfd = pollfd {
        fd,
        events: match events {
            PollEvents::Read => POLLIN,
            PollEvents::Write => POLLOUT,
        },
        revents: 0,
    };

    // -1 = block until ready
    let timeout_ms = timeout.map(|d| d.as_millis() as i32).unwrap_or(-1);

    let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };
    if result < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    Ok(result > 0)
}

/// Plain TCP session
pub struct TcpSessionOps {
    stream: TcpStream,
}

impl TcpSessionOps {
    /// Wrap an already connected stream
    pub fn new(stream: TcpStream) -> Self {
        TcpSessionOps { stream }
    }

    /// Resolve `host:port` and connect, honoring `timeout` for the connect
    /// itself
    ///
    /// Each resolved address is tried in order; the last failure is
    /// reported when none of them accepts the connection.
    pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::Protocol(format!("cannot resolve {}:{}: {}", host, port, e)))?
            .collect();
        if addrs.is_empty() {
            return Err(Error::Protocol(format!("no addresses for {}:{}", host, port)));
        }

        let mut last_error = None;
        for addr in &addrs {
            match Self::connect_addr(addr, timeout) {
                Ok(session) => return Ok(session),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or(Error::Closed))
    }

    fn connect_addr(addr: &SocketAddr, timeout: Option<Duration>) -> Result<Self> {
        let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, None)?;
        match timeout {
            Some(t) => socket.connect_timeout(&(*addr).into(), t)?,
            None => socket.connect(&(*addr).into())?,
        }
        socket.set_nodelay(true)?;
        Ok(TcpSessionOps {
            stream: socket.into(),
        })
    }

    /// The underlying stream
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Give up the session, handing the stream out for a TLS upgrade
    pub fn into_stream(self) -> TcpStream {
        self.stream
    }

    /// The address of the peer
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.stream.peer_addr().map_err(Error::from)
    }

    /// The local address of the connection
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.stream.local_addr().map_err(Error::from)
    }
}

impl SessionOps for TcpSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        poll_fd(self.stream.as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already gone, nothing left to shut down
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    }
}

/// A session with the connection timeout layered on top
///
/// Every read and write polls first; an expired poll becomes
/// [`Error::ReadTimeout`] or [`Error::WriteTimeout`].
pub struct Transport {
    session: Box<dyn SessionOps>,
    timeout: Option<Duration>,
}

impl Transport {
    /// Create a transport over `session`
    pub fn new(session: Box<dyn SessionOps>, timeout: Option<Duration>) -> Self {
        Transport { session, timeout }
    }

    /// Set the timeout for subsequent reads and writes
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// The current timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Read bytes, failing with [`Error::ReadTimeout`] when no byte arrives
    /// in time
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.session.poll(PollEvents::Read, self.timeout)? {
            return Err(Error::ReadTimeout);
        }
        self.session.read(buf)
    }

    /// Write the whole buffer, failing with [`Error::WriteTimeout`] when the
    /// session stops accepting bytes in time
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut remaining = buf;
        while !remaining.is_empty() {
            if !self.session.poll(PollEvents::Write, self.timeout)? {
                return Err(Error::WriteTimeout);
            }
            let n = self.session.write(remaining)?;
            if n == 0 {
                return Err(Error::Closed);
            }
            remaining = &remaining[n..];
        }
        Ok(())
    }

    /// Shut the underlying session down
    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }
}

/// A transport shared between a connection and its detached content channels
pub type SharedTransport = Arc<Mutex<Transport>>;

/// Wrap a transport for sharing
pub fn shared(transport: Transport) -> SharedTransport {
    Arc::new(Mutex::new(transport))
}

fn lock(transport: &SharedTransport) -> MutexGuard<'_, Transport> {
    // A poisoned transport still holds a usable session
    transport
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Input channel reading from a shared transport
pub struct TransportIBinaryChannel {
    transport: SharedTransport,
    closed: bool,
}

impl TransportIBinaryChannel {
    pub fn new(transport: SharedTransport) -> Self {
        TransportIBinaryChannel {
            transport,
            closed: false,
        }
    }
}

impl IBinaryChannel for TransportIBinaryChannel {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }
        lock(&self.transport).read(buf)
    }

    // Detaches from the transport without shutting the socket down, so the
    // connection can keep reusing it.
    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Output channel writing to a shared transport
pub struct TransportOBinaryChannel {
    transport: SharedTransport,
    closed: bool,
}

impl TransportOBinaryChannel {
    pub fn new(transport: SharedTransport) -> Self {
        TransportOBinaryChannel {
            transport,
            closed: false,
        }
    }
}

impl OBinaryChannel for TransportOBinaryChannel {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        lock(&self.transport).write_all(buf)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_tcp_session_read_write() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"ping");
            stream.write_all(b"pong").unwrap();
        });

        let mut session =
            TcpSessionOps::connect("127.0.0.1", addr.port(), Some(Duration::from_secs(1)))
                .unwrap();
        assert_eq!(session.write(b"ping").unwrap(), 4);

        assert!(session
            .poll(PollEvents::Read, Some(Duration::from_secs(1)))
            .unwrap());
        let mut buf = [0u8; 4];
        assert_eq!(session.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"pong");

        handle.join().unwrap();
    }

    #[test]
    fn test_transport_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(300));
        });

        let session =
            TcpSessionOps::connect("127.0.0.1", addr.port(), Some(Duration::from_secs(1)))
                .unwrap();
        let mut transport =
            Transport::new(Box::new(session), Some(Duration::from_millis(50)));

        let mut buf = [0u8; 16];
        let result = transport.read(&mut buf);
        assert!(matches!(result, Err(Error::ReadTimeout)));

        handle.join().unwrap();
    }

    #[test]
    fn test_resolution_failure() {
        let result = TcpSessionOps::connect("host.invalid", 80, Some(Duration::from_millis(100)));
        assert!(result.is_err());
    }

    #[test]
    fn test_shared_transport_channels() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let session =
            TcpSessionOps::connect("127.0.0.1", addr.port(), Some(Duration::from_secs(1)))
                .unwrap();
        let transport = shared(Transport::new(
            Box::new(session),
            Some(Duration::from_secs(1)),
        ));

        let mut output = TransportOBinaryChannel::new(transport.clone());
        let mut input = TransportIBinaryChannel::new(transport);

        output.write(b"hello").unwrap();
        let mut buf = [0u8; 5];
        let mut read = 0;
        while read < 5 {
            read += input.read(&mut buf[read..]).unwrap();
        }
        assert_eq!(&buf, b"hello");

        // Closing a channel detaches it without killing the socket
        input.close().unwrap();
        assert!(matches!(input.read(&mut buf), Err(Error::Closed)));

        handle.join().unwrap();
    }
}
