//! HTTP value types
//!
//! Protocol version, request/status lines, byte ranges, content ranges and
//! entity tags, with paired parse/format operations following the RFC 7230
//! family grammars. For every valid value `x` of these types,
//! `parse(&format(&x))` yields a value equal to `x`, and `is_valid()` must
//! hold before formatting is meaningful.

pub mod etag;
pub mod line;
pub mod range;
pub mod version;

pub use etag::{EntityTag, EntityTagRange};
pub use line::{RequestLine, StatusLine};
pub use range::{ByteContentRange, ByteRange, ByteRangeSpec, RangeUnit};
pub use version::ProtocolVersion;

/// Result type for HTTP value parsing
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP value parse/validation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid protocol version: {0}")]
    InvalidProtocolVersion(String),

    #[error("invalid request line: {0}")]
    InvalidRequestLine(String),

    #[error("invalid status line: {0}")]
    InvalidStatusLine(String),

    #[error("invalid range unit: {0}")]
    InvalidRangeUnit(String),

    #[error("invalid byte range: {0}")]
    InvalidRange(String),

    #[error("invalid content range: {0}")]
    InvalidContentRange(String),

    #[error("invalid entity tag: {0}")]
    InvalidEntityTag(String),
}
