//! Chunked content-transfer channels
//!
//! Frames a message body as a sequence of self-delimited chunks, so the body
//! can be streamed without knowing its total length in advance. Each chunk is
//! a hexadecimal size line followed by that many payload bytes:
//!
//! ```text
//! <size-hex>[;extension]CRLF <payload> CRLF
//! ```
//!
//! A zero-size chunk followed by a blank line terminates the content. An
//! aborted transfer is framed as a terminal chunk-size line carrying the
//! `aborted` extension, followed by one CRLF-terminated UTF-8 message line:
//!
//! ```text
//! 0;aborted CRLF <message> CRLF
//! ```
//!
//! The input channel reports such a stream through `is_aborted()` and
//! `abort_message()`, and fails pending reads with a channel-aborted error.

use super::{
    Error, IBinaryChannel, MessageContentIBinaryChannel, MessageContentOBinaryChannel,
    OBinaryChannel, Result,
};

/// Default output chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 16384;

const CRLF: &[u8] = b"\r\n";

/// Find the next CRLF in a buffer
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Output channel emitting chunked frames
///
/// Writes are buffered up to the configured chunk size; a complete frame is
/// emitted when the buffer fills or on explicit `flush`. `close` flushes any
/// partial buffer as a final chunk followed by the zero-size terminator.
/// The inner channel is flushed but left open.
pub struct ChunkedMessageContentOBinaryChannel<C: OBinaryChannel> {
    inner: C,
    buffer: Vec<u8>,
    chunk_size: usize,
    closed: bool,
}

impl<C: OBinaryChannel> ChunkedMessageContentOBinaryChannel<C> {
    /// Wrap `inner` using the default chunk size
    pub fn new(inner: C) -> Self {
        Self::with_chunk_size(inner, DEFAULT_CHUNK_SIZE)
    }

    /// Wrap `inner` buffering up to `chunk_size` bytes per frame
    pub fn with_chunk_size(inner: C, chunk_size: usize) -> Self {
        ChunkedMessageContentOBinaryChannel {
            inner,
            buffer: Vec::with_capacity(chunk_size.min(DEFAULT_CHUNK_SIZE)),
            chunk_size: chunk_size.max(1),
            closed: false,
        }
    }

    /// Consume the decorator and return the inner channel
    pub fn into_inner(self) -> C {
        self.inner
    }

    fn emit_chunk(inner: &mut C, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            return Ok(());
        }
        inner.write(format!("{:x}\r\n", payload.len()).as_bytes())?;
        inner.write(payload)?;
        inner.write(CRLF)?;
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            let payload = std::mem::take(&mut self.buffer);
            Self::emit_chunk(&mut self.inner, &payload)?;
        }
        Ok(())
    }
}

impl<C: OBinaryChannel> OBinaryChannel for ChunkedMessageContentOBinaryChannel<C> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }

        self.buffer.extend_from_slice(buf);
        while self.buffer.len() >= self.chunk_size {
            let payload: Vec<u8> = self.buffer.drain(..self.chunk_size).collect();
            Self::emit_chunk(&mut self.inner, &payload)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.flush_buffer()?;
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_buffer()?;
        self.inner.write(b"0\r\n\r\n")?;
        self.inner.flush()?;
        self.closed = true;
        Ok(())
    }
}

impl<C: OBinaryChannel> MessageContentOBinaryChannel for ChunkedMessageContentOBinaryChannel<C> {
    fn is_abortable(&self) -> bool {
        true
    }

    fn abort(&mut self, message: Option<&str>) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }

        // Buffered bytes that never made it into a frame are void; the abort
        // frame tells the peer to discard the content anyway.
        self.buffer.clear();
        self.inner.write(b"0;aborted\r\n")?;
        // The message must stay a single line on the wire.
        let message = message.unwrap_or("").replace(['\r', '\n'], " ");
        self.inner.write(message.as_bytes())?;
        self.inner.write(CRLF)?;
        self.inner.flush()?;
        self.closed = true;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecoderState {
    SizeLine,
    Data { remaining: usize },
    DataCrlf,
    Trailer,
    AbortMessage,
    Complete,
    Aborted,
}

/// Outcome of advancing the decoder to the next deliverable position
enum Advanced {
    Data,
    Complete,
    Aborted,
}

/// Input channel decoding chunked frames
///
/// `read` blocks until at least one payload byte is delivered or the
/// terminator is reached, after which it returns 0 and `has_more_content()`
/// reports false. A peer abort surfaces as a channel-aborted error carrying
/// the message captured from the stream.
pub struct ChunkedMessageContentIBinaryChannel<C: IBinaryChannel> {
    inner: C,
    in_buf: Vec<u8>,
    state: DecoderState,
    abort_message: Option<String>,
    closed: bool,
}

impl<C: IBinaryChannel> ChunkedMessageContentIBinaryChannel<C> {
    /// Wrap `inner`
    pub fn new(inner: C) -> Self {
        ChunkedMessageContentIBinaryChannel {
            inner,
            in_buf: Vec::new(),
            state: DecoderState::SizeLine,
            abort_message: None,
            closed: false,
        }
    }

    /// Consume the decorator and return the inner channel
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Read more bytes from the inner channel into the parse buffer
    fn fill(&mut self) -> Result<()> {
        let mut temp = [0u8; 4096];
        let n = self.inner.read(&mut temp)?;
        if n == 0 {
            return Err(Error::UnexpectedEos);
        }
        self.in_buf.extend_from_slice(&temp[..n]);
        Ok(())
    }

    fn parse_size_line(&mut self, line_end: usize) -> Result<()> {
        let line = String::from_utf8_lossy(&self.in_buf[..line_end]).to_string();
        self.in_buf.drain(..line_end + 2);

        let mut parts = line.split(';');
        let size_str = parts.next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| Error::InvalidChunkSize(size_str.to_string()))?;

        let aborted = parts.any(|ext| ext.trim().eq_ignore_ascii_case("aborted"));
        if aborted {
            if size != 0 {
                return Err(Error::Protocol(format!(
                    "abort marker on non-terminal chunk of size {}",
                    size
                )));
            }
            self.state = DecoderState::AbortMessage;
        } else if size == 0 {
            self.state = DecoderState::Trailer;
        } else {
            self.state = DecoderState::Data { remaining: size };
        }
        Ok(())
    }

    /// Advance the state machine until payload bytes are deliverable, the
    /// terminator has been consumed, or an abort frame has been read.
    fn advance(&mut self) -> Result<Advanced> {
        loop {
            match self.state {
                DecoderState::Data { .. } => return Ok(Advanced::Data),
                DecoderState::Complete => return Ok(Advanced::Complete),
                DecoderState::Aborted => return Ok(Advanced::Aborted),

                DecoderState::SizeLine => match find_crlf(&self.in_buf) {
                    Some(pos) => self.parse_size_line(pos)?,
                    None => self.fill()?,
                },

                DecoderState::DataCrlf => {
                    if self.in_buf.len() < 2 {
                        self.fill()?;
                        continue;
                    }
                    if &self.in_buf[..2] != CRLF {
                        return Err(Error::Protocol("expected CRLF after chunk".to_string()));
                    }
                    self.in_buf.drain(..2);
                    self.state = DecoderState::SizeLine;
                }

                DecoderState::Trailer => match find_crlf(&self.in_buf) {
                    Some(0) => {
                        self.in_buf.drain(..2);
                        self.state = DecoderState::Complete;
                    }
                    Some(pos) => {
                        // Trailer line, skipped
                        self.in_buf.drain(..pos + 2);
                    }
                    None => self.fill()?,
                },

                DecoderState::AbortMessage => match find_crlf(&self.in_buf) {
                    Some(pos) => {
                        let message = String::from_utf8_lossy(&self.in_buf[..pos]).to_string();
                        self.in_buf.drain(..pos + 2);
                        self.abort_message = Some(message);
                        self.state = DecoderState::Aborted;
                    }
                    None => self.fill()?,
                },
            }
        }
    }

    fn aborted_error(&self) -> Error {
        Error::Aborted {
            message: self.abort_message.clone(),
        }
    }
}

impl<C: IBinaryChannel> IBinaryChannel for ChunkedMessageContentIBinaryChannel<C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        match self.advance()? {
            Advanced::Complete => return Ok(0),
            Advanced::Aborted => return Err(self.aborted_error()),
            Advanced::Data => {}
        }

        let remaining = match self.state {
            DecoderState::Data { remaining } => remaining,
            _ => unreachable!(),
        };

        // Serve out of the parse buffer first, then straight from the inner
        // channel to avoid a copy.
        let n = if !self.in_buf.is_empty() {
            let n = remaining.min(self.in_buf.len()).min(buf.len());
            buf[..n].copy_from_slice(&self.in_buf[..n]);
            self.in_buf.drain(..n);
            n
        } else {
            let want = remaining.min(buf.len());
            let n = self.inner.read(&mut buf[..want])?;
            if n == 0 {
                return Err(Error::UnexpectedEos);
            }
            n
        };

        self.state = if remaining == n {
            DecoderState::DataCrlf
        } else {
            DecoderState::Data {
                remaining: remaining - n,
            }
        };
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl<C: IBinaryChannel> MessageContentIBinaryChannel for ChunkedMessageContentIBinaryChannel<C> {
    fn has_more_content(&mut self) -> Result<bool> {
        if self.closed {
            return Err(Error::Closed);
        }
        match self.advance()? {
            Advanced::Data => Ok(true),
            Advanced::Complete | Advanced::Aborted => Ok(false),
        }
    }

    fn is_abortable(&self) -> bool {
        true
    }

    fn is_aborted(&self) -> bool {
        self.abort_message.is_some()
    }

    fn abort_message(&self) -> Option<&str> {
        self.abort_message.as_deref()
    }
}
