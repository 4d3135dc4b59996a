//! Byte ranges and content ranges
//!
//! The `Range` request header value (`bytes=first-last,...`) and the
//! `Content-Range` response header value (`bytes first-last/complete`),
//! per RFC 7233.

use std::fmt;

use super::{Error, Result};

/// A range unit token, normally `bytes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeUnit(String);

impl RangeUnit {
    /// Create a unit from a token
    pub fn new(unit: impl Into<String>) -> Self {
        RangeUnit(unit.into())
    }

    /// The `bytes` unit
    pub fn bytes() -> Self {
        RangeUnit::new("bytes")
    }

    /// The unit token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token is non-empty and contains no separators
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && !self.0.contains([' ', '=', ',', '/'])
    }

    /// Whether this is the `bytes` unit
    pub fn is_bytes(&self) -> bool {
        self.0.eq_ignore_ascii_case("bytes")
    }
}

impl fmt::Display for RangeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One element of a byte range set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRangeSpec {
    /// `first-last`, both inclusive
    Bound { first: u64, last: u64 },
    /// `first-`, from an offset to the end
    LowerBound { first: u64 },
    /// `-length`, the final `length` bytes
    Suffix { length: u64 },
}

impl ByteRangeSpec {
    /// Whether the spec describes a representable range
    pub fn is_valid(&self) -> bool {
        match *self {
            ByteRangeSpec::Bound { first, last } => first <= last,
            ByteRangeSpec::LowerBound { .. } => true,
            ByteRangeSpec::Suffix { length } => length > 0,
        }
    }

    /// Parse one `first-last`, `first-` or `-length` element
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidRange(text.to_string());

        let text = text.trim();
        let (first, last) = text.split_once('-').ok_or_else(invalid)?;
        let spec = match (first.is_empty(), last.is_empty()) {
            (true, false) => ByteRangeSpec::Suffix {
                length: last.parse().map_err(|_| invalid())?,
            },
            (false, true) => ByteRangeSpec::LowerBound {
                first: first.parse().map_err(|_| invalid())?,
            },
            (false, false) => ByteRangeSpec::Bound {
                first: first.parse().map_err(|_| invalid())?,
                last: last.parse().map_err(|_| invalid())?,
            },
            (true, true) => return Err(invalid()),
        };
        if !spec.is_valid() {
            return Err(invalid());
        }
        Ok(spec)
    }
}

impl fmt::Display for ByteRangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ByteRangeSpec::Bound { first, last } => write!(f, "{}-{}", first, last),
            ByteRangeSpec::LowerBound { first } => write!(f, "{}-", first),
            ByteRangeSpec::Suffix { length } => write!(f, "-{}", length),
        }
    }
}

/// A `Range` header value: `bytes=` followed by one or more range specs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteRange {
    specs: Vec<ByteRangeSpec>,
}

impl ByteRange {
    /// Create an empty range set
    pub fn new() -> Self {
        ByteRange { specs: Vec::new() }
    }

    /// Append a range spec
    pub fn add(&mut self, spec: ByteRangeSpec) {
        self.specs.push(spec);
    }

    /// The range specs in order
    pub fn specs(&self) -> &[ByteRangeSpec] {
        &self.specs
    }

    /// Whether the set holds at least one valid spec
    pub fn is_valid(&self) -> bool {
        !self.specs.is_empty() && self.specs.iter().all(|s| s.is_valid())
    }

    /// Parse a `bytes=first-last,...` header value
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidRange(text.to_string());

        let (unit, set) = text.trim().split_once('=').ok_or_else(invalid)?;
        if !RangeUnit::new(unit.trim()).is_bytes() {
            return Err(invalid());
        }
        let specs = set
            .split(',')
            .map(ByteRangeSpec::parse)
            .collect::<Result<Vec<_>>>()?;
        if specs.is_empty() {
            return Err(invalid());
        }
        Ok(ByteRange { specs })
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("bytes=")?;
        for (i, spec) in self.specs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", spec)?;
        }
        Ok(())
    }
}

/// A `Content-Range` header value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteContentRange {
    /// `bytes first-last/complete` or `bytes first-last/*`
    Satisfied {
        first: u64,
        last: u64,
        complete_length: Option<u64>,
    },
    /// `bytes */complete`, sent with 416 responses
    Unsatisfied { complete_length: u64 },
}

impl ByteContentRange {
    /// Whether the range is internally consistent
    pub fn is_valid(&self) -> bool {
        match *self {
            ByteContentRange::Satisfied {
                first,
                last,
                complete_length,
            } => first <= last && complete_length.map_or(true, |len| last < len),
            ByteContentRange::Unsatisfied { .. } => true,
        }
    }

    /// Parse a `bytes first-last/complete` header value
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidContentRange(text.to_string());

        let (unit, rest) = text.trim().split_once(' ').ok_or_else(invalid)?;
        if !RangeUnit::new(unit).is_bytes() {
            return Err(invalid());
        }
        let (range, complete) = rest.split_once('/').ok_or_else(invalid)?;

        let parsed = if range == "*" {
            ByteContentRange::Unsatisfied {
                complete_length: complete.parse().map_err(|_| invalid())?,
            }
        } else {
            let (first, last) = range.split_once('-').ok_or_else(invalid)?;
            let complete_length = if complete == "*" {
                None
            } else {
                Some(complete.parse().map_err(|_| invalid())?)
            };
            ByteContentRange::Satisfied {
                first: first.parse().map_err(|_| invalid())?,
                last: last.parse().map_err(|_| invalid())?,
                complete_length,
            }
        };
        if !parsed.is_valid() {
            return Err(invalid());
        }
        Ok(parsed)
    }
}

impl fmt::Display for ByteContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ByteContentRange::Satisfied {
                first,
                last,
                complete_length: Some(len),
            } => write!(f, "bytes {}-{}/{}", first, last, len),
            ByteContentRange::Satisfied {
                first,
                last,
                complete_length: None,
            } => write!(f, "bytes {}-{}/*", first, last),
            ByteContentRange::Unsatisfied { complete_length } => {
                write!(f, "bytes */{}", complete_length)
            }
        }
    }
}
