//! Message normalization: raw bytes in, [`NormalizedMessage`] tree out.

use tracing::{debug, info};

use crate::model::email::{MessageParts, NormalizedMessage};
use crate::model::header::HeaderSource;

use super::address::{extract_addresses, first_address};
use super::body::body_text;
use super::header::decode_encoded_words;
use super::mime::MimePart;
use super::walker;

/// Default limit on how deep attached messages are normalized.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Turns raw messages into [`NormalizedMessage`] trees.
///
/// Normalization never fails: missing headers become empty fields, broken
/// parts are dropped or reclassified, undecodable text is repaired.
#[derive(Debug, Clone)]
pub struct EmailParser {
    max_depth: usize,
}

impl Default for EmailParser {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EmailParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many levels of attached messages are normalized.
    /// `0` keeps only the top-level message.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Normalize a raw message. A leading mbox `From ` line and BOM are skipped.
    pub fn normalize(&self, raw: &[u8], account: &str) -> NormalizedMessage {
        let root = MimePart::parse_lenient(raw);
        self.normalize_part(&root, account)
    }

    /// Normalize an already parsed message.
    pub fn normalize_part(&self, message: &MimePart, account: &str) -> NormalizedMessage {
        self.normalize_at(message, account, 0)
    }

    pub(crate) fn normalize_at(
        &self,
        message: &MimePart,
        account: &str,
        depth: usize,
    ) -> NormalizedMessage {
        let subject = message
            .header("Subject")
            .map(decode_encoded_words)
            .unwrap_or_default();
        debug!(subject = %subject, depth, "Normalizing message");

        let sender = message
            .header("From")
            .map(|from| first_address(&decode_encoded_words(from)))
            .unwrap_or_default();

        let mut body = body_text(message);
        let found = walker::walk(self, message, account, depth);
        for orphan in &found.orphans {
            if !body.contains(orphan.as_str()) {
                body.push_str(orphan);
            }
        }

        NormalizedMessage::new(MessageParts {
            account: account.to_string(),
            date_received: message.header("Date").unwrap_or_default().to_string(),
            sender,
            recipients: resolve_recipients(message),
            subject,
            body,
            headers: message.header_entries().to_vec(),
            attached_emails: found.emails,
            attached_files: found.files,
        })
    }
}

/// Addresses from `To`, or from `Delivered-To` when `To` is absent or blank.
pub fn resolve_recipients<H: HeaderSource + ?Sized>(headers: &H) -> Vec<String> {
    let value = headers
        .header("To")
        .filter(|to| !to.trim().is_empty())
        .or_else(|| headers.header("Delivered-To"));

    match value {
        Some(value) => extract_addresses(&decode_encoded_words(value)),
        None => {
            info!("No To address");
            Vec::new()
        }
    }
}
