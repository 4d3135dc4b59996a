//! Request and status lines
//!
//! The first line of an HTTP request (`METHOD uri VERSION`) and of an HTTP
//! response (`VERSION code reason`). Both parse from and format to their
//! wire form without the trailing CRLF.

use std::fmt;

use super::{Error, ProtocolVersion, Result};

/// The first line of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    method: String,
    uri: String,
    version: ProtocolVersion,
}

impl RequestLine {
    /// Create a request line
    pub fn new(method: impl Into<String>, uri: impl Into<String>, version: ProtocolVersion) -> Self {
        RequestLine {
            method: method.into(),
            uri: uri.into(),
            version,
        }
    }

    /// The request method, e.g. `GET`
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request target
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The protocol version
    pub fn version(&self) -> &ProtocolVersion {
        &self.version
    }

    /// Whether method, target and version are all present and well formed
    pub fn is_valid(&self) -> bool {
        !self.method.is_empty()
            && !self.method.contains(' ')
            && !self.uri.is_empty()
            && !self.uri.contains(' ')
            && self.version.is_valid()
    }

    /// Parse a `METHOD uri VERSION` line
    pub fn parse(line: &str) -> Result<Self> {
        let invalid = || Error::InvalidRequestLine(line.to_string());

        let mut parts = line.trim_end_matches(['\r', '\n']).split(' ');
        let method = parts.next().filter(|m| !m.is_empty()).ok_or_else(invalid)?;
        let uri = parts.next().filter(|u| !u.is_empty()).ok_or_else(invalid)?;
        let version = parts.next().ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        let version =
            ProtocolVersion::parse(version).map_err(|_| invalid())?;
        Ok(RequestLine::new(method, uri, version))
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.uri, self.version)
    }
}

/// The first line of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    version: ProtocolVersion,
    code: u16,
    reason: String,
}

impl StatusLine {
    /// Create a status line
    pub fn new(version: ProtocolVersion, code: u16, reason: impl Into<String>) -> Self {
        StatusLine {
            version,
            code,
            reason: reason.into(),
        }
    }

    /// The protocol version
    pub fn version(&self) -> &ProtocolVersion {
        &self.version
    }

    /// The three-digit status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// The reason phrase, possibly empty
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Whether the version is well formed and the code is in the HTTP range
    pub fn is_valid(&self) -> bool {
        self.version.is_valid() && (100..600).contains(&self.code)
    }

    /// Parse a `VERSION code reason` line; the reason phrase may be empty
    pub fn parse(line: &str) -> Result<Self> {
        let invalid = || Error::InvalidStatusLine(line.to_string());

        let line = line.trim_end_matches(['\r', '\n']);
        let (version, rest) = line.split_once(' ').ok_or_else(invalid)?;
        let (code, reason) = match rest.split_once(' ') {
            Some((code, reason)) => (code, reason),
            None => (rest, ""),
        };

        let version = ProtocolVersion::parse(version).map_err(|_| invalid())?;
        let code: u16 = code.parse().map_err(|_| invalid())?;
        if !(100..600).contains(&code) {
            return Err(invalid());
        }
        Ok(StatusLine::new(version, code, reason))
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{} {}", self.version, self.code)
        } else {
            write!(f, "{} {} {}", self.version, self.code, self.reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_line_round_trip() {
        let line = RequestLine::parse("GET /index.html HTTP/1.1").unwrap();
        assert_eq!(line.method(), "GET");
        assert_eq!(line.uri(), "/index.html");
        assert_eq!(line.version(), &ProtocolVersion::http_1_1());
        assert!(line.is_valid());
        assert_eq!(line.to_string(), "GET /index.html HTTP/1.1");
    }

    #[test]
    fn test_request_line_rejects_malformed() {
        assert!(RequestLine::parse("GET /index.html").is_err());
        assert!(RequestLine::parse("GET  /index.html HTTP/1.1").is_err());
        assert!(RequestLine::parse("GET /a b HTTP/1.1").is_err());
        assert!(RequestLine::parse("").is_err());
    }

    #[test]
    fn test_status_line_round_trip() {
        let line = StatusLine::parse("HTTP/1.1 200 OK").unwrap();
        assert_eq!(line.code(), 200);
        assert_eq!(line.reason(), "OK");
        assert!(line.is_valid());
        assert_eq!(line.to_string(), "HTTP/1.1 200 OK");
    }

    #[test]
    fn test_status_line_multiword_reason() {
        let line = StatusLine::parse("HTTP/1.1 404 Not Found").unwrap();
        assert_eq!(line.code(), 404);
        assert_eq!(line.reason(), "Not Found");
    }

    #[test]
    fn test_status_line_empty_reason() {
        let line = StatusLine::parse("HTTP/1.1 204").unwrap();
        assert_eq!(line.code(), 204);
        assert_eq!(line.reason(), "");
        assert_eq!(line.to_string(), "HTTP/1.1 204");
    }

    #[test]
    fn test_status_line_rejects_malformed() {
        assert!(StatusLine::parse("HTTP/1.1").is_err());
        assert!(StatusLine::parse("HTTP/1.1 abc OK").is_err());
        assert!(StatusLine::parse("HTTP/1.1 99 Too Low").is_err());
        assert!(StatusLine::parse("HTTP/1.1 600 Too High").is_err());
    }

    #[test]
    fn test_status_line_strips_crlf() {
        let line = StatusLine::parse("HTTP/1.1 200 OK\r\n").unwrap();
        assert_eq!(line.reason(), "OK");
    }
}
