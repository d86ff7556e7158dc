//! Tolerant e-mail address extraction.
//!
//! Header values in the wild rarely follow RFC 5322 address syntax, so this
//! module does not try to parse them. It pulls out every substring that looks
//! like an address and leaves display names, brackets and separators behind.

use std::sync::LazyLock;

use regex::Regex;

static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\w.-]+@[\w.-]+\.\w+").expect("address pattern is valid")
});

/// Return every address-shaped substring of `text`, in order of appearance.
pub fn extract_addresses(text: &str) -> Vec<String> {
    ADDRESS_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// First address found in `text`, or an empty string.
pub fn first_address(text: &str) -> String {
    ADDRESS_RE
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
