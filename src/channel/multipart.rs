//! Multipart content-transfer channels
//!
//! RFC 2046 style framing: independent body parts separated by
//! `--boundary` delimiter lines, each part carrying its own headers block
//! terminated by a blank line, the whole sequence terminated by the close
//! delimiter `--boundary--`. Preamble and epilogue bytes are discarded.
//!
//! The reader maintains a held-back tail so that bytes which might be the
//! start of a delimiter are never surrendered as body content until the
//! match is decided; an over-read during boundary scanning stays buffered
//! for the next part.

use crate::message::Headers;

use super::{
    Error, IBinaryChannel, MessageContentIBinaryChannel, MessageContentOBinaryChannel,
    OBinaryChannel, Result,
};

const CRLF: &[u8] = b"\r\n";

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WriterState {
    Start,
    InPart,
    Closed,
}

/// Output channel writing multipart framing
///
/// `put_next_part` opens a part (implicitly closing the previous one) and
/// writes its boundary line and headers; subsequent `write` calls deliver
/// the part's raw body. `close` emits the close delimiter.
pub struct MultipartMessageContentOBinaryChannel<C: OBinaryChannel> {
    inner: C,
    boundary: String,
    state: WriterState,
}

impl<C: OBinaryChannel> MultipartMessageContentOBinaryChannel<C> {
    /// Wrap `inner` using `boundary` as the delimiter string
    pub fn new(inner: C, boundary: impl Into<String>) -> Result<Self> {
        let boundary = boundary.into();
        if boundary.is_empty() {
            return Err(Error::InvalidMultipart("empty boundary".to_string()));
        }
        Ok(MultipartMessageContentOBinaryChannel {
            inner,
            boundary,
            state: WriterState::Start,
        })
    }

    /// The boundary this channel frames with
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Consume the decorator and return the inner channel
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Open the next part: boundary line, headers block, blank separator
    pub fn put_next_part(&mut self, headers: &Headers) -> Result<()> {
        match self.state {
            WriterState::Closed => return Err(Error::Closed),
            WriterState::Start => {
                self.inner.write(format!("--{}\r\n", self.boundary).as_bytes())?;
            }
            WriterState::InPart => {
                // Implicit close of the current part.
                self.inner
                    .write(format!("\r\n--{}\r\n", self.boundary).as_bytes())?;
            }
        }

        for (name, value) in headers.iter() {
            self.inner.write(format!("{}: {}\r\n", name, value).as_bytes())?;
        }
        self.inner.write(CRLF)?;
        self.state = WriterState::InPart;
        Ok(())
    }
}

impl<C: OBinaryChannel> OBinaryChannel for MultipartMessageContentOBinaryChannel<C> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        match self.state {
            WriterState::Closed => Err(Error::Closed),
            WriterState::Start => Err(Error::InvalidMultipart(
                "write before put_next_part".to_string(),
            )),
            WriterState::InPart => self.inner.write(buf),
        }
    }

    fn flush(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Err(Error::Closed);
        }
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        match self.state {
            WriterState::Closed => return Ok(()),
            WriterState::Start => {
                self.inner
                    .write(format!("--{}--\r\n", self.boundary).as_bytes())?;
            }
            WriterState::InPart => {
                self.inner
                    .write(format!("\r\n--{}--\r\n", self.boundary).as_bytes())?;
            }
        }
        self.inner.flush()?;
        self.state = WriterState::Closed;
        Ok(())
    }
}

impl<C: OBinaryChannel> MessageContentOBinaryChannel for MultipartMessageContentOBinaryChannel<C> {
    fn abort(&mut self, _message: Option<&str>) -> Result<()> {
        if self.state == WriterState::Closed {
            return Err(Error::Closed);
        }
        // No abort marker in the multipart grammar; the sequence is left
        // without its close delimiter.
        self.inner.flush()?;
        self.state = WriterState::Closed;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ReaderState {
    Preamble,
    PartBody,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Delimiter {
    /// `--boundary`: another part follows
    Next,
    /// `--boundary--`: close delimiter
    Final,
}

/// Input channel parsing multipart framing
///
/// `next_part` advances past any unread body of the current part and
/// returns the next part's headers, or `None` at the close delimiter.
/// Between calls, `read` delivers the current part's body bytes.
pub struct MultipartMessageContentIBinaryChannel<C: IBinaryChannel> {
    inner: C,
    boundary: String,
    buf: Vec<u8>,
    state: ReaderState,
    pending_delimiter: Option<Delimiter>,
    closed: bool,
}

impl<C: IBinaryChannel> MultipartMessageContentIBinaryChannel<C> {
    /// Wrap `inner` expecting `boundary` as the delimiter string
    pub fn new(inner: C, boundary: impl Into<String>) -> Result<Self> {
        let boundary = boundary.into();
        if boundary.is_empty() {
            return Err(Error::InvalidMultipart("empty boundary".to_string()));
        }
        Ok(MultipartMessageContentIBinaryChannel {
            inner,
            boundary,
            buf: Vec::new(),
            state: ReaderState::Preamble,
            pending_delimiter: None,
            closed: false,
        })
    }

    /// Consume the decorator and return the inner channel
    pub fn into_inner(self) -> C {
        self.inner
    }

    fn fill(&mut self) -> Result<()> {
        let mut temp = [0u8; 4096];
        let n = self.inner.read(&mut temp)?;
        if n == 0 {
            return Err(Error::InvalidMultipart(
                "stream ended before close delimiter".to_string(),
            ));
        }
        self.buf.extend_from_slice(&temp[..n]);
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = find_crlf(&self.buf) {
                let line = String::from_utf8_lossy(&self.buf[..pos]).to_string();
                self.buf.drain(..pos + 2);
                return Ok(line);
            }
            self.fill()?;
        }
    }

    fn read_part_headers(&mut self) -> Result<Headers> {
        let mut headers = Headers::new();
        loop {
            let line = self.read_line()?;
            if line.is_empty() {
                return Ok(headers);
            }
            let (name, value) = Headers::parse_header_line(&line)
                .map_err(|e| Error::InvalidMultipart(format!("bad part header: {}", e)))?;
            headers
                .add(name, value)
                .map_err(|e| Error::InvalidMultipart(format!("bad part header: {}", e)))?;
        }
    }

    /// Scan the preamble for the first delimiter line
    fn scan_first_boundary(&mut self) -> Result<Delimiter> {
        let open = format!("--{}", self.boundary);
        let close = format!("--{}--", self.boundary);
        loop {
            let line = self.read_line()?;
            if line == open {
                return Ok(Delimiter::Next);
            }
            if line == close {
                return Ok(Delimiter::Final);
            }
            // Preamble line, discarded.
        }
    }

    /// Advance to the next part's headers, skipping any unread body
    pub fn next_part(&mut self) -> Result<Option<Headers>> {
        if self.closed {
            return Err(Error::Closed);
        }

        let delimiter = match self.state {
            ReaderState::Complete => return Ok(None),
            ReaderState::Preamble => self.scan_first_boundary()?,
            ReaderState::PartBody => {
                let mut scratch = [0u8; 4096];
                while self.read_body(&mut scratch)? > 0 {}
                self.pending_delimiter
                    .take()
                    .ok_or_else(|| Error::InvalidMultipart("missing delimiter".to_string()))?
            }
        };

        match delimiter {
            Delimiter::Final => {
                self.state = ReaderState::Complete;
                Ok(None)
            }
            Delimiter::Next => {
                let headers = self.read_part_headers()?;
                self.state = ReaderState::PartBody;
                self.pending_delimiter = None;
                Ok(Some(headers))
            }
        }
    }

    /// Try to classify the bytes at `pos` (start of `\r\n--boundary`) as a
    /// delimiter. Returns the delimiter and the total length to consume, or
    /// `None` if this is body content that merely resembles one. Errors
    /// with `buf_short` semantics are reported via `Ok(Err(()))`-free
    /// design: the caller fills and retries when `needs_more` is true.
    fn classify_delimiter(&self, pos: usize) -> DelimiterMatch {
        let delimiter_len = 4 + self.boundary.len(); // \r\n--boundary
        let after = pos + delimiter_len;

        // Need at least two bytes after the boundary to decide.
        if self.buf.len() < after + 2 {
            return DelimiterMatch::NeedsMore;
        }

        if &self.buf[after..after + 2] == CRLF {
            return DelimiterMatch::Found(Delimiter::Next, after + 2 - pos);
        }
        if &self.buf[after..after + 2] == b"--" {
            // Close delimiter; a trailing CRLF (start of the epilogue) may
            // follow but is not required at end of stream.
            return DelimiterMatch::Found(Delimiter::Final, after + 2 - pos);
        }
        DelimiterMatch::NotADelimiter
    }

    /// Deliver body bytes for the current part; returns 0 once the part's
    /// delimiter has been consumed (recording it in `pending_delimiter`).
    fn read_body(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.pending_delimiter.is_some() {
            return Ok(0);
        }

        let needle = {
            let mut n = Vec::with_capacity(4 + self.boundary.len());
            n.extend_from_slice(b"\r\n--");
            n.extend_from_slice(self.boundary.as_bytes());
            n
        };

        loop {
            let mut search_from = 0;
            while let Some(rel) = self.buf[search_from..]
                .windows(needle.len())
                .position(|w| w == needle.as_slice())
            {
                let pos = search_from + rel;
                match self.classify_delimiter(pos) {
                    DelimiterMatch::Found(delimiter, consume) => {
                        if pos > 0 {
                            // Body bytes before the delimiter go out first.
                            let n = pos.min(buf.len());
                            buf[..n].copy_from_slice(&self.buf[..n]);
                            self.buf.drain(..n);
                            return Ok(n);
                        }
                        self.buf.drain(..consume);
                        self.pending_delimiter = Some(delimiter);
                        return Ok(0);
                    }
                    DelimiterMatch::NeedsMore => {
                        self.fill()?;
                        search_from = 0;
                        continue;
                    }
                    DelimiterMatch::NotADelimiter => {
                        search_from = pos + 1;
                    }
                }
            }

            // No delimiter in the buffer. Hold back a tail that could be the
            // start of one and deliver the rest.
            let holdback = needle.len() + 2;
            if self.buf.len() > holdback {
                let deliverable = self.buf.len() - holdback;
                let n = deliverable.min(buf.len());
                if n > 0 {
                    buf[..n].copy_from_slice(&self.buf[..n]);
                    self.buf.drain(..n);
                    return Ok(n);
                }
            }
            self.fill()?;
        }
    }
}

enum DelimiterMatch {
    Found(Delimiter, usize),
    NeedsMore,
    NotADelimiter,
}

impl<C: IBinaryChannel> IBinaryChannel for MultipartMessageContentIBinaryChannel<C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }
        match self.state {
            ReaderState::PartBody => {
                if buf.is_empty() {
                    return Ok(0);
                }
                self.read_body(buf)
            }
            // Outside a part there is no body content.
            ReaderState::Preamble | ReaderState::Complete => Ok(0),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl<C: IBinaryChannel> MessageContentIBinaryChannel
    for MultipartMessageContentIBinaryChannel<C>
{
    fn has_more_content(&mut self) -> Result<bool> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(self.state == ReaderState::PartBody && self.pending_delimiter.is_none())
    }
}
