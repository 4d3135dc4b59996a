//! Message model: headers, parameters and the message capability trait
//!
//! A message is an identifier plus two ordered multimaps: headers (wire
//! metadata) and parameters (abstract name/value pairs with typed
//! accessors). Both collections keep insertion order, allow repeated names
//! and look names up case-insensitively.

pub mod headers;
pub mod parameters;

pub use headers::{Header, Headers};
pub use parameters::{Parameter, Parameters};

/// Result type for message operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message model errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Capability interface common to requests and responses
///
/// Grants access to the identity and the two name/value collections of a
/// message, regardless of its direction.
pub trait Message {
    /// Stable identifier of this message instance
    fn id(&self) -> &str;

    /// The message headers
    fn headers(&self) -> &Headers;

    /// The message parameters
    fn parameters(&self) -> &Parameters;
}
