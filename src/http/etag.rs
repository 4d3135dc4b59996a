//! Entity tags
//!
//! Strong and weak validators (`"tag"` and `W/"tag"`) and entity tag
//! ranges as used by `If-Match`/`If-None-Match`, including the `*` form
//! that matches any representation. Comparison follows RFC 7232: the
//! strong comparison requires two strong tags, the weak comparison
//! ignores weakness.

use std::fmt;

use super::{Error, Result};

/// An entity tag validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTag {
    tag: String,
    weak: bool,
}

impl EntityTag {
    /// Create a strong tag
    pub fn strong(tag: impl Into<String>) -> Self {
        EntityTag {
            tag: tag.into(),
            weak: false,
        }
    }

    /// Create a weak tag
    pub fn weak(tag: impl Into<String>) -> Self {
        EntityTag {
            tag: tag.into(),
            weak: true,
        }
    }

    /// The opaque tag text, without quotes
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether this is a weak validator
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// Whether the tag text is quotable
    pub fn is_valid(&self) -> bool {
        !self.tag.contains('"')
    }

    /// Strong comparison: equal tags, both strong
    pub fn strong_equals(&self, other: &EntityTag) -> bool {
        !self.weak && !other.weak && self.tag == other.tag
    }

    /// Weak comparison: equal tags, weakness ignored
    pub fn weak_equals(&self, other: &EntityTag) -> bool {
        self.tag == other.tag
    }

    /// Parse a `"tag"` or `W/"tag"` form
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidEntityTag(text.to_string());

        let text = text.trim();
        let (weak, quoted) = match text.strip_prefix("W/") {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let tag = quoted
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .ok_or_else(invalid)?;
        if tag.contains('"') {
            return Err(invalid());
        }
        Ok(EntityTag {
            tag: tag.to_string(),
            weak,
        })
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weak {
            write!(f, "W/\"{}\"", self.tag)
        } else {
            write!(f, "\"{}\"", self.tag)
        }
    }
}

/// An `If-Match`/`If-None-Match` header value
///
/// Either the wildcard `*`, which matches any representation, or an
/// explicit list of tags. An empty explicit list is represented as the
/// wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityTagRange {
    tags: Vec<EntityTag>,
}

impl EntityTagRange {
    /// Create the wildcard range
    pub fn any() -> Self {
        EntityTagRange { tags: Vec::new() }
    }

    /// Create an explicit range from a list of tags
    pub fn from_tags(tags: Vec<EntityTag>) -> Self {
        EntityTagRange { tags }
    }

    /// Whether this is the wildcard range
    pub fn is_any(&self) -> bool {
        self.tags.is_empty()
    }

    /// The explicit tags; empty for the wildcard range
    pub fn tags(&self) -> &[EntityTag] {
        &self.tags
    }

    /// Add a tag, returning whether it was newly added
    pub fn add(&mut self, tag: EntityTag) -> bool {
        if self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// Remove a tag, returning whether it was present
    pub fn remove(&mut self, tag: &EntityTag) -> bool {
        if let Some(pos) = self.tags.iter().position(|t| t == tag) {
            self.tags.remove(pos);
            true
        } else {
            false
        }
    }

    /// Drop all tags, leaving the wildcard range
    pub fn clear(&mut self) {
        self.tags.clear();
    }

    /// Whether `tag` matches under the strong comparison
    pub fn includes_strong(&self, tag: &EntityTag) -> bool {
        self.is_any() || self.tags.iter().any(|t| t.strong_equals(tag))
    }

    /// Whether `tag` matches under the weak comparison
    pub fn includes_weak(&self, tag: &EntityTag) -> bool {
        self.is_any() || self.tags.iter().any(|t| t.weak_equals(tag))
    }

    /// Parse a `*` or `"a", W/"b", ...` header value
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text == "*" {
            return Ok(EntityTagRange::any());
        }
        let tags = text
            .split(',')
            .map(EntityTag::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(EntityTagRange { tags })
    }
}

impl fmt::Display for EntityTagRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str("*");
        }
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", tag)?;
        }
        Ok(())
    }
}
