//! Incremental response head parser
//!
//! Feed raw bytes as they arrive; the parser consumes the status line and
//! headers and signals completion. Bytes past the blank line separating head
//! from body are preserved and handed back through `take_leftover`, since
//! they belong to the body channel.

use crate::http::StatusLine;
use crate::message::Headers;

use super::{Error, Result};

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    StatusLine,
    Headers,
    Complete,
}

/// Parses a status line and header block from an incoming byte stream
pub struct ResponseHeadParser {
    state: ParserState,
    buffer: Vec<u8>,
    status_line: Option<StatusLine>,
    headers: Headers,
}

impl ResponseHeadParser {
    pub fn new() -> Self {
        ResponseHeadParser {
            state: ParserState::StatusLine,
            buffer: Vec::new(),
            status_line: None,
            headers: Headers::new(),
        }
    }

    /// Feed bytes; returns `true` once the whole head has been parsed
    pub fn feed(&mut self, data: &[u8]) -> Result<bool> {
        self.buffer.extend_from_slice(data);
        self.advance()?;
        Ok(self.state == ParserState::Complete)
    }

    /// Whether the head has been fully parsed
    pub fn is_complete(&self) -> bool {
        self.state == ParserState::Complete
    }

    /// The parsed status line and headers; only valid once complete
    pub fn take_head(&mut self) -> Result<(StatusLine, Headers)> {
        if self.state != ParserState::Complete {
            return Err(Error::Parse("response head not complete".to_string()));
        }
        let status_line = self
            .status_line
            .take()
            .ok_or_else(|| Error::Parse("response head already taken".to_string()))?;
        Ok((status_line, std::mem::take(&mut self.headers)))
    }

    /// Bytes received past the head; they belong to the body
    pub fn take_leftover(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    fn advance(&mut self) -> Result<()> {
        loop {
            if self.state == ParserState::Complete {
                return Ok(());
            }
            let Some(crlf) = find_crlf(&self.buffer) else {
                return Ok(());
            };
            let line = String::from_utf8_lossy(&self.buffer[..crlf]).to_string();
            self.buffer.drain(..crlf + 2);

            match self.state {
                ParserState::StatusLine => {
                    let status_line = StatusLine::parse(&line)
                        .map_err(|e| Error::Parse(e.to_string()))?;
                    self.status_line = Some(status_line);
                    self.state = ParserState::Headers;
                }
                ParserState::Headers => {
                    if line.is_empty() {
                        self.state = ParserState::Complete;
                    } else {
                        let (name, value) = Headers::parse_header_line(&line)
                            .map_err(|e| Error::Parse(e.to_string()))?;
                        self.headers
                            .add(name, value)
                            .map_err(|e| Error::Parse(e.to_string()))?;
                    }
                }
                ParserState::Complete => unreachable!(),
            }
        }
    }
}

impl Default for ResponseHeadParser {
    fn default() -> Self {
        ResponseHeadParser::new()
    }
}
