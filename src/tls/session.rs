//! TLS session transport
//!
//! Implements [`SessionOps`] over an OpenSSL stream so a TLS connection
//! drives the same transport code as plain TCP. The negotiated handshake
//! parameters are captured once into a [`TlsSession`] snapshot that stays
//! readable for the lifetime of the connection.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

use openssl::ssl::{Ssl, SslRef, SslStream};

use super::config::{TlsConfig, TlsError};
use crate::channel::{Error, Result};
use crate::session::{poll_fd, PollEvents, SessionOps};

/// Negotiated TLS parameters, captured after the handshake
#[derive(Debug, Clone)]
pub struct TlsSession {
    version: String,
    cipher: String,
    servername: Option<String>,
    verify_result: String,
    peer_verified: bool,
    session_reused: bool,
}

impl TlsSession {
    fn from_ssl(ssl: &SslRef) -> Self {
        let verify = ssl.verify_result();
        TlsSession {
            version: ssl.version_str().to_string(),
            cipher: ssl
                .current_cipher()
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| "<undef>".to_string()),
            servername: ssl
                .servername(openssl::ssl::NameType::HOST_NAME)
                .map(|s| s.to_string()),
            verify_result: verify.to_string(),
            peer_verified: verify == openssl::x509::X509VerifyResult::OK,
            session_reused: ssl.session_reused(),
        }
    }

    /// Negotiated protocol version, e.g. `TLSv1.3`
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Negotiated cipher suite name
    pub fn cipher(&self) -> &str {
        &self.cipher
    }

    /// SNI servername sent in the handshake, if any
    pub fn servername(&self) -> Option<&str> {
        self.servername.as_deref()
    }

    /// Text form of the peer certificate verification result
    pub fn verify_result(&self) -> &str {
        &self.verify_result
    }

    /// Whether the peer certificate verified cleanly
    pub fn peer_verified(&self) -> bool {
        self.peer_verified
    }

    /// Whether an earlier session was resumed
    pub fn session_reused(&self) -> bool {
        self.session_reused
    }
}

/// TLS transport over a TCP stream
pub struct TlsSessionOps {
    stream: SslStream<TcpStream>,
    session: TlsSession,
    failed: bool,
}

impl TlsSessionOps {
    /// Perform a client handshake over a connected stream
    pub fn connect(
        tcp_stream: TcpStream,
        config: TlsConfig,
    ) -> std::result::Result<Self, TlsError> {
        let mut ssl = Ssl::new(&config.ctx)?;

        if let Some(ref servername) = config.servername {
            ssl.set_hostname(servername)?;
        }

        let ssl_stream = ssl
            .connect(tcp_stream)
            .map_err(|e| TlsError::HandshakeFailed(format!("Connection failed: {}", e)))?;

        let session = TlsSession::from_ssl(ssl_stream.ssl());

        Ok(TlsSessionOps {
            stream: ssl_stream,
            session,
            failed: false,
        })
    }

    /// The negotiated session parameters
    pub fn session(&self) -> &TlsSession {
        &self.session
    }

    /// Whether a read or write has failed on this session
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// The underlying TCP stream
    pub fn get_ref(&self) -> &TcpStream {
        self.stream.get_ref()
    }
}

impl SessionOps for TlsSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        // Bytes already decrypted inside the SSL buffer never show up on
        // the descriptor
        if events == PollEvents::Read && self.stream.ssl().pending() > 0 {
            return Ok(true);
        }
        poll_fd(self.stream.get_ref().as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.stream.read(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.failed = true;
                Err(Error::Io(e))
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self.stream.write(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.failed = true;
                Err(Error::Io(e))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if !self.failed {
            let _ = self.stream.shutdown();
        }
        match self.stream.get_mut().shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    }
}
