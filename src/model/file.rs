//! File attachments.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::indicators::ContentIndicators;

/// A named, non-message attachment.
///
/// The content is kept in its transport form: base64 attachments stay a
/// single contiguous base64 token, text attachments stay text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachedFile {
    /// Filename, decoded from RFC 2047 encoded-words.
    pub name: String,

    /// MIME content type (e.g. `"image/png"`).
    pub content_type: String,

    /// Raw payload as text.
    pub content: String,

    /// Fingerprints of `content`.
    pub indicators: ContentIndicators,
}

impl AttachedFile {
    /// Build an attachment, fingerprinting its content.
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let indicators = ContentIndicators::compute(&content);
        Self {
            name: name.into(),
            content_type: content_type.into(),
            content,
            indicators,
        }
    }
}

// Identity is (name, content, content_type); indicators derive from content.
impl PartialEq for AttachedFile {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.content == other.content
            && self.content_type == other.content_type
    }
}

impl Eq for AttachedFile {}

impl Hash for AttachedFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.content.hash(state);
        self.content_type.hash(state);
    }
}
