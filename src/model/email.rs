//! Normalized message tree and its flattening.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::file::AttachedFile;
use super::header::{HeaderEntry, HeaderSource};
use super::indicators::ContentIndicators;

/// A message reduced to the fields downstream analysis cares about.
///
/// Nested messages are owned by their parent; the tree only ever points
/// downward. The two `flattened_*` lists stay empty until
/// [`NormalizedMessage::flatten`] is called.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedMessage {
    /// Caller-supplied mailbox/context identifier.
    pub account: String,

    /// Raw `Date:` header, not parsed.
    pub date_received: String,

    /// First address found in `From:`.
    pub sender: String,

    /// Addresses from `To:` (or `Delivered-To:`), in header order.
    pub recipients: Vec<String>,

    /// Decoded subject line (RFC 2047 encoded-words resolved).
    pub subject: String,

    /// Decoded display body.
    pub body: String,

    /// Every header of the message, in original order.
    pub headers: Vec<HeaderEntry>,

    /// Fingerprints of `body` plus authentication tokens.
    pub indicators: ContentIndicators,

    /// `true` iff `attached_files` or `attached_emails` is non-empty.
    pub has_attachments: bool,

    pub attached_emails: Vec<NormalizedMessage>,
    pub attached_files: Vec<AttachedFile>,

    #[serde(default)]
    pub flattened_attached_emails: Vec<NormalizedMessage>,
    #[serde(default)]
    pub flattened_attached_files: Vec<AttachedFile>,
}

/// Field values gathered by the normalizer, before derivation.
#[derive(Debug, Default)]
pub struct MessageParts {
    pub account: String,
    pub date_received: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub headers: Vec<HeaderEntry>,
    pub attached_emails: Vec<NormalizedMessage>,
    pub attached_files: Vec<AttachedFile>,
}

/// Borrowed, deduplicated and sorted view over every nested message and file
/// of a tree.
#[derive(Debug, Default)]
pub struct Flattened<'a> {
    pub emails: Vec<&'a NormalizedMessage>,
    pub files: Vec<&'a AttachedFile>,
}

impl NormalizedMessage {
    /// Assemble a message, deriving its indicators and attachment flag.
    pub fn new(parts: MessageParts) -> Self {
        let indicators = ContentIndicators::with_authentication(&parts.body, &parts.headers);
        let has_attachments = !parts.attached_files.is_empty() || !parts.attached_emails.is_empty();
        Self {
            account: parts.account,
            date_received: parts.date_received,
            sender: parts.sender,
            recipients: parts.recipients,
            subject: parts.subject,
            body: parts.body,
            headers: parts.headers,
            indicators,
            has_attachments,
            attached_emails: parts.attached_emails,
            attached_files: parts.attached_files,
            flattened_attached_emails: Vec::new(),
            flattened_attached_files: Vec::new(),
        }
    }

    /// Collect every nested message and file reachable from this message.
    ///
    /// For each nested message, its own descendants are listed before it.
    /// Both lists are deduplicated by value (first occurrence kept) and then
    /// sorted: messages by subject, files by name.
    pub fn flattened(&self) -> Flattened<'_> {
        let mut flat = Flattened::default();
        collect_nested(&self.attached_emails, &mut flat);
        flat.files.extend(self.attached_files.iter());

        flat.emails = dedup_by_value(flat.emails);
        flat.files = dedup_by_value(flat.files);

        flat.emails.sort_by(|a, b| a.subject.cmp(&b.subject));
        flat.files.sort_by(|a, b| a.name.cmp(&b.name));
        flat
    }

    /// Populate `flattened_attached_emails` and `flattened_attached_files`.
    ///
    /// The lists are recomputed from the tree on every call, so calling this
    /// twice yields the same result.
    pub fn flatten(&mut self) {
        let (emails, files) = {
            let flat = self.flattened();
            let emails: Vec<NormalizedMessage> = flat.emails.into_iter().cloned().collect();
            let files: Vec<AttachedFile> = flat.files.into_iter().cloned().collect();
            (emails, files)
        };
        self.flattened_attached_emails = emails;
        self.flattened_attached_files = files;
    }
}

fn collect_nested<'a>(emails: &'a [NormalizedMessage], flat: &mut Flattened<'a>) {
    for email in emails {
        collect_nested(&email.attached_emails, flat);
        flat.emails.push(email);
        flat.files.extend(email.attached_files.iter());
    }
}

fn dedup_by_value<T: Eq + Hash + ?Sized>(items: Vec<&T>) -> Vec<&T> {
    let mut seen: HashSet<&T> = HashSet::with_capacity(items.len());
    items.into_iter().filter(|item| seen.insert(*item)).collect()
}

impl HeaderSource for NormalizedMessage {
    fn header_entries(&self) -> &[HeaderEntry] {
        &self.headers
    }
}

// Identity covers the envelope and body; nested content is not compared.
impl PartialEq for NormalizedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.subject == other.subject
            && self.body == other.body
            && self.date_received == other.date_received
            && self.recipients == other.recipients
            && self.sender == other.sender
            && self.account == other.account
    }
}

impl Eq for NormalizedMessage {}

impl Hash for NormalizedMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subject.hash(state);
        self.body.hash(state);
        self.date_received.hash(state);
        self.recipients.hash(state);
        self.sender.hash(state);
        self.account.hash(state);
    }
}
