//! Client connection layer
//!
//! Everything above the transport: request/response messages with their
//! linear lifecycles, filter chains, progress listeners, the response head
//! parser, the half-duplex connection state machine, connection factories
//! keyed by URI scheme, and a high-level request executor.

pub mod api;
pub mod connection;
pub mod factory;
pub mod filter;
pub mod message;
pub mod parser;
pub mod progress;

pub use api::{ExecutionStatus, HttpClient};
pub use connection::{HttpClientConnection, Statistics};
pub use factory::{ConnectionFactory, ConnectionFactoryRegistry, ConnectionUri, HttpConnectionFactory};
pub use filter::{FilterSet, Placement, RequestFilter, ResponseFilter, SessionHandlerRequestFilter};
pub use message::{ClientRequest, ClientResponse};
pub use progress::ConnectionProgressListener;

use crate::channel;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Client layer errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("address resolution failed: {0}")]
    AddressResolution(String),

    #[error("connect timed out")]
    ConnectTimeout,

    #[error("read timed out")]
    ReadTimeout,

    #[error("write timed out")]
    WriteTimeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("invalid connection state: {0}")]
    InvalidState(String),

    #[error("invalid request state: {0}")]
    RequestState(String),

    #[error("invalid response state: {0}")]
    ResponseState(String),

    #[error("filter failed: {0}")]
    Filter(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("channel error: {0}")]
    Channel(channel::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] crate::tls::TlsError),

    #[error("HTTP value error: {0}")]
    Http(#[from] crate::http::Error),

    #[error("message error: {0}")]
    Message(#[from] crate::message::Error),
}

// Timeouts keep their kind as they cross the layer boundary, so callers can
// apply different retry policies.
impl From<channel::Error> for Error {
    fn from(e: channel::Error) -> Self {
        match e {
            channel::Error::ReadTimeout => Error::ReadTimeout,
            channel::Error::WriteTimeout => Error::WriteTimeout,
            other => Error::Channel(other),
        }
    }
}
