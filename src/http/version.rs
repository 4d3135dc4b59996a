//! Protocol version
//!
//! A protocol name with a major/minor version pair, written on the wire as
//! `NAME/major.minor`. Versions of different protocols are not ordered
//! against each other.

use std::cmp::Ordering;
use std::fmt;

use super::{Error, Result};

/// A protocol version such as `HTTP/1.1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolVersion {
    protocol: String,
    major: u16,
    minor: u16,
}

impl ProtocolVersion {
    /// Create a version from its components
    pub fn new(protocol: impl Into<String>, major: u16, minor: u16) -> Self {
        ProtocolVersion {
            protocol: protocol.into(),
            major,
            minor,
        }
    }

    /// `HTTP/1.1`
    pub fn http_1_1() -> Self {
        ProtocolVersion::new("HTTP", 1, 1)
    }

    /// `HTTP/1.0`
    pub fn http_1_0() -> Self {
        ProtocolVersion::new("HTTP", 1, 0)
    }

    /// The protocol name, e.g. `HTTP`
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The major version number
    pub fn major(&self) -> u16 {
        self.major
    }

    /// The minor version number
    pub fn minor(&self) -> u16 {
        self.minor
    }

    /// Whether the version names a protocol
    pub fn is_valid(&self) -> bool {
        !self.protocol.is_empty() && !self.protocol.contains('/')
    }

    /// Order two versions of the same protocol; `None` when the protocol
    /// names differ
    pub fn compare(&self, other: &ProtocolVersion) -> Option<Ordering> {
        if !self.protocol.eq_ignore_ascii_case(&other.protocol) {
            return None;
        }
        Some(
            self.major
                .cmp(&other.major)
                .then(self.minor.cmp(&other.minor)),
        )
    }

    /// Parse a `NAME/major.minor` string
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidProtocolVersion(text.to_string());

        let (protocol, numbers) = text.split_once('/').ok_or_else(invalid)?;
        if protocol.is_empty() {
            return Err(invalid());
        }
        let (major, minor) = numbers.split_once('.').ok_or_else(invalid)?;
        let major = major.parse().map_err(|_| invalid())?;
        let minor = minor.parse().map_err(|_| invalid())?;

        Ok(ProtocolVersion::new(protocol, major, minor))
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.protocol, self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let v = ProtocolVersion::parse("HTTP/1.1").unwrap();
        assert_eq!(v.protocol(), "HTTP");
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 1);
        assert_eq!(v.to_string(), "HTTP/1.1");
        assert_eq!(v, ProtocolVersion::http_1_1());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ProtocolVersion::parse("HTTP").is_err());
        assert!(ProtocolVersion::parse("/1.1").is_err());
        assert!(ProtocolVersion::parse("HTTP/1").is_err());
        assert!(ProtocolVersion::parse("HTTP/a.b").is_err());
        assert!(ProtocolVersion::parse("HTTP/1.").is_err());
    }

    #[test]
    fn test_compare_same_protocol() {
        let old = ProtocolVersion::http_1_0();
        let new = ProtocolVersion::http_1_1();
        assert_eq!(old.compare(&new), Some(Ordering::Less));
        assert_eq!(new.compare(&old), Some(Ordering::Greater));
        assert_eq!(new.compare(&new.clone()), Some(Ordering::Equal));
    }

    #[test]
    fn test_compare_different_protocols() {
        let http = ProtocolVersion::http_1_1();
        let other = ProtocolVersion::new("RTSP", 1, 0);
        assert_eq!(http.compare(&other), None);
    }

    #[test]
    fn test_validity() {
        assert!(ProtocolVersion::http_1_1().is_valid());
        assert!(!ProtocolVersion::new("", 1, 1).is_valid());
    }
}
