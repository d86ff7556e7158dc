//! Header name/value pairs and the minimal header-lookup interface.

use serde::{Deserialize, Serialize};

/// One header line, in original message order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeaderEntry {
    /// Header name as written in the message (case preserved).
    pub name: String,
    /// Unfolded header value.
    pub value: String,
}

impl HeaderEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Anything that can answer header lookups.
///
/// Implemented by parsed MIME parts as well as by bare header lists, so code
/// that only needs headers (recipient resolution, authentication tokens) can
/// be fed a lightweight stand-in.
pub trait HeaderSource {
    /// All headers in original order.
    fn header_entries(&self) -> &[HeaderEntry];

    /// Value of the first header called `name` (case-insensitive).
    fn header(&self, name: &str) -> Option<&str> {
        self.header_entries()
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

impl HeaderSource for [HeaderEntry] {
    fn header_entries(&self) -> &[HeaderEntry] {
        self
    }
}

impl HeaderSource for Vec<HeaderEntry> {
    fn header_entries(&self) -> &[HeaderEntry] {
        self
    }
}
