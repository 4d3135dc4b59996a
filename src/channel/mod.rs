//! Binary channel abstractions
//!
//! This module defines the blocking byte-stream traits that the rest of the
//! crate is built on, together with the content-transfer decorators that
//! stack over them.
//!
//! The two base traits mirror a raw stream: [`IBinaryChannel`] delivers bytes
//! until end-of-stream, [`OBinaryChannel`] accepts bytes until closed. The
//! message-content variants add what a message body needs on top of a raw
//! stream: an end-of-content predicate and abort semantics, so that a peer
//! can learn that a body was cut short rather than completed.
//!
//! Decorators (`chunked`, `length_prefixed`, `deflate`, `multipart`,
//! `counting`) each wrap an inner channel and re-expose the same interface,
//! so encodings can be stacked in any order.

pub mod chunked;
pub mod counting;
pub mod deflate;
pub mod length_prefixed;
pub mod memory;
pub mod multipart;

pub use chunked::{ChunkedMessageContentIBinaryChannel, ChunkedMessageContentOBinaryChannel};
pub use counting::{
    CountingIBinaryChannel, CountingOBinaryChannel, ProgressIBinaryChannel,
    ProgressOBinaryChannel, ProgressListener,
};
pub use deflate::{DeflaterMessageContentOBinaryChannel, InflaterMessageContentIBinaryChannel};
pub use length_prefixed::{
    LengthPrefixedMessageContentIBinaryChannel, LengthPrefixedMessageContentOBinaryChannel,
};
pub use memory::{
    MemoryIBinaryChannel, MemoryOBinaryChannel, NullIBinaryChannel, NullOBinaryChannel,
};
pub use multipart::{MultipartMessageContentIBinaryChannel, MultipartMessageContentOBinaryChannel};

/// Result type for channel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Channel operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("channel is closed")]
    Closed,

    #[error("channel aborted: {}", message.as_deref().unwrap_or("<no message>"))]
    Aborted { message: Option<String> },

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("invalid length prefix: {0}")]
    InvalidLengthPrefix(String),

    #[error("invalid multipart framing: {0}")]
    InvalidMultipart(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unexpected end of stream")]
    UnexpectedEos,

    #[error("read timed out")]
    ReadTimeout,

    #[error("write timed out")]
    WriteTimeout,
}

/// Blocking input channel
///
/// `read` blocks until at least one byte is delivered or end-of-stream is
/// reached, in which case it returns `Ok(0)`.
pub trait IBinaryChannel {
    /// Read bytes into `buf`, returning the number of bytes read (0 = EOS)
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Close the channel; further reads fail with `Error::Closed`
    fn close(&mut self) -> Result<()>;
}

/// Blocking output channel
///
/// `write` delivers the whole buffer or fails.
pub trait OBinaryChannel {
    /// Write all bytes from `buf`
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush buffered bytes down the stack
    fn flush(&mut self) -> Result<()>;

    /// Close the channel, flushing any remaining bytes; further writes fail
    /// with `Error::Closed`
    fn close(&mut self) -> Result<()>;
}

/// Input channel carrying a message body
///
/// Adds an end-of-content predicate and abort reporting on top of the raw
/// stream. A channel that was aborted by the peer keeps delivering the abort
/// condition from `read` and records the abort message.
pub trait MessageContentIBinaryChannel: IBinaryChannel {
    /// Whether more content bytes can still be read
    fn has_more_content(&mut self) -> Result<bool>;

    /// Whether this channel's framing can carry an abort marker
    fn is_abortable(&self) -> bool {
        false
    }

    /// Whether the peer aborted the content mid-transfer
    fn is_aborted(&self) -> bool {
        false
    }

    /// The abort message captured from the stream, if any
    fn abort_message(&self) -> Option<&str> {
        None
    }
}

/// Output channel carrying a message body
pub trait MessageContentOBinaryChannel: OBinaryChannel {
    /// Whether this channel's framing can carry an abort marker
    fn is_abortable(&self) -> bool {
        false
    }

    /// Abort the content, conveying `message` to the peer where the framing
    /// supports it, and close the channel
    fn abort(&mut self, message: Option<&str>) -> Result<()>;
}

impl<T: IBinaryChannel + ?Sized> IBinaryChannel for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<T: OBinaryChannel + ?Sized> OBinaryChannel for Box<T> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<T: MessageContentIBinaryChannel + ?Sized> MessageContentIBinaryChannel for Box<T> {
    fn has_more_content(&mut self) -> Result<bool> {
        (**self).has_more_content()
    }

    fn is_abortable(&self) -> bool {
        (**self).is_abortable()
    }

    fn is_aborted(&self) -> bool {
        (**self).is_aborted()
    }

    fn abort_message(&self) -> Option<&str> {
        (**self).abort_message()
    }
}

impl<T: MessageContentOBinaryChannel + ?Sized> MessageContentOBinaryChannel for Box<T> {
    fn is_abortable(&self) -> bool {
        (**self).is_abortable()
    }

    fn abort(&mut self, message: Option<&str>) -> Result<()> {
        (**self).abort(message)
    }
}

/// Boxed content input channel, as attached to a response
pub type ContentInput = Box<dyn MessageContentIBinaryChannel + Send>;

/// Boxed content input source, as attached to a request
pub type ContentSource = Box<dyn MessageContentIBinaryChannel + Send>;

/// Boxed content output channel
pub type ContentOutput = Box<dyn MessageContentOBinaryChannel + Send>;

/// Copy all bytes from `input` to `output`, returning the byte count
///
/// Neither channel is closed by this call.
pub fn copy<I, O>(input: &mut I, output: &mut O) -> Result<u64>
where
    I: IBinaryChannel + ?Sized,
    O: OBinaryChannel + ?Sized,
{
    let mut total = 0u64;
    let mut buf = [0u8; 8192];

    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            return Ok(total);
        }
        output.write(&buf[..n])?;
        total += n as u64;
    }
}

/// Read all remaining bytes from `input` into a vector
pub fn read_to_end<I>(input: &mut I) -> Result<Vec<u8>>
where
    I: IBinaryChannel + ?Sized,
{
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}
