//! Message headers
//!
//! An ordered multimap of name/value pairs with case-insensitive name
//! lookup. `add` appends another value for a repeated name; `set` replaces
//! every value carried under that name.

use std::fmt;

use super::{Error, Result};

/// A single header: a name/value pair
///
/// Valid only with a non-empty name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: String,
}

impl Header {
    /// Create a header
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Header {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The header name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The header value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether this header may be carried by a message
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    /// Whether this header carries `name`, compared case-insensitively
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Ordered header collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<Header>,
}

impl Headers {
    /// Create an empty collection
    pub fn new() -> Self {
        Headers {
            headers: Vec::new(),
        }
    }

    /// Append a header, keeping any existing values under the same name
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.add_header(Header::new(name, value))
    }

    /// Append an already constructed header
    pub fn add_header(&mut self, header: Header) -> Result<()> {
        if !header.is_valid() {
            return Err(Error::InvalidHeader("empty header name".to_string()));
        }
        self.headers.push(header);
        Ok(())
    }

    /// Replace every value under `name` with the single given value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let header = Header::new(name, value);
        if !header.is_valid() {
            return Err(Error::InvalidHeader("empty header name".to_string()));
        }
        self.headers.retain(|h| !h.matches(header.name()));
        self.headers.push(header);
        Ok(())
    }

    /// First value under `name`, in insertion order
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.matches(name))
            .map(|h| h.value())
    }

    /// Last value under `name`, in insertion order
    pub fn get_last(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|h| h.matches(name))
            .map(|h| h.value())
    }

    /// All values under `name`, in insertion order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| h.matches(name))
            .map(|h| h.value())
            .collect()
    }

    /// Whether any header carries `name`
    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.matches(name))
    }

    /// Number of values carried under `name`
    pub fn count(&self, name: &str) -> usize {
        self.headers.iter().filter(|h| h.matches(name)).count()
    }

    /// Remove every value under `name`, returning how many were removed
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.headers.len();
        self.headers.retain(|h| !h.matches(name));
        before - self.headers.len()
    }

    /// Remove one specific header (name and value), returning whether it
    /// was present
    pub fn remove_header(&mut self, header: &Header) -> bool {
        if let Some(pos) = self.headers.iter().position(|h| h == header) {
            self.headers.remove(pos);
            true
        } else {
            false
        }
    }

    /// Number of headers in the collection
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Remove all headers
    pub fn clear(&mut self) {
        self.headers.clear();
    }

    /// Iterate over (name, value) pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|h| (h.name(), h.value()))
    }

    /// Parse a `Name: value` line into its components
    pub fn parse_header_line(line: &str) -> Result<(String, String)> {
        match line.find(':') {
            Some(colon) => {
                let name = line[..colon].trim().to_string();
                let value = line[colon + 1..].trim().to_string();
                if name.is_empty() {
                    return Err(Error::InvalidHeader("empty header name".to_string()));
                }
                Ok((name, value))
            }
            None => Err(Error::InvalidHeader(format!("no colon in header: {}", line))),
        }
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for header in &self.headers {
            writeln!(f, "{}", header)?;
        }
        Ok(())
    }
}
