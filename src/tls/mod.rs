//! TLS support for secure connections
//!
//! [`TlsConfig`] wraps an OpenSSL context configured for client use, built
//! through [`ClientConfigBuilder`]. Connecting upgrades a TCP stream into a
//! [`TlsSessionOps`] transport, and the negotiated parameters of the
//! handshake stay readable through [`TlsSession`].

pub mod config;
pub mod session;

#[cfg(test)]
pub(crate) mod test_cert;

pub use config::{ClientConfigBuilder, TlsConfig, TlsError, TlsVersion};
pub use session::{TlsSession, TlsSessionOps};
