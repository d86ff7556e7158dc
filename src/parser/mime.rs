//! MIME tree: an owned, walkable view of a message's parts.
//!
//! Multipart bodies are split on their own boundary delimiter lines, so a
//! malformed part never runs into its siblings. The MIME fields of every
//! part (type, parameters, filename, transfer encoding) are read through
//! `mail-parser`. The raw payload of each part stays available next to its
//! transfer-decoded form.

use std::borrow::Cow;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use mail_parser::{MessageParser, MimeHeaders};
use memchr::memmem;

use crate::model::header::{HeaderEntry, HeaderSource};

use super::header::{decode_header_bytes, header_field, unfold_headers};

/// Maximum depth for recursive multipart descent (to prevent stack overflow on adversarial input).
const MAX_MULTIPART_DEPTH: usize = 64;

/// Base64 engine that tolerates missing padding and trailing bits.
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decode base64 text, ignoring any embedded whitespace.
pub fn decode_base64(input: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = input
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(compact)
}

/// Which form of a part's payload to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    /// Bytes exactly as they appear in the message.
    Raw,
    /// Bytes after undoing the `Content-Transfer-Encoding`.
    Decoded,
}

/// MIME fields of one part, as `mail-parser` reads them.
#[derive(Debug, Clone, Default)]
struct MimeFields {
    content_type: Option<String>,
    params: Vec<(String, String)>,
    filename: Option<String>,
    transfer_encoding: Option<String>,
}

impl MimeFields {
    fn read(header_bytes: &[u8]) -> Self {
        let mut block = header_bytes.to_vec();
        block.extend_from_slice(b"\n\n");

        let parser = MessageParser::new().with_mime_headers();
        let Some(message) = parser.parse_headers(&block) else {
            return Self::default();
        };
        let Some(part) = message.parts.first() else {
            return Self::default();
        };

        let content_type = part.content_type();
        Self {
            content_type: content_type.and_then(|ct| {
                let subtype = ct.subtype().filter(|s| !s.is_empty())?;
                (!ct.ctype().is_empty())
                    .then(|| format!("{}/{}", ct.ctype(), subtype).to_ascii_lowercase())
            }),
            params: content_type
                .and_then(|ct| ct.attributes())
                .map(|attrs| {
                    attrs
                        .iter()
                        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                        .collect()
                })
                .unwrap_or_default(),
            filename: part
                .attachment_name()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            transfer_encoding: part
                .content_transfer_encoding()
                .map(|enc| enc.trim().to_ascii_lowercase())
                .filter(|enc| !enc.is_empty()),
        }
    }
}

/// One node of a MIME tree.
///
/// Multipart containers own their children. `message/*` parts keep their
/// embedded message as payload; [`MimePart::embedded_messages`] re-parses it
/// on demand so callers control recursion depth.
#[derive(Debug, Clone)]
pub struct MimePart {
    headers: Vec<HeaderEntry>,
    fields: MimeFields,
    default_type: &'static str,
    multipart: bool,
    children: Vec<MimePart>,
    body: Vec<u8>,
    source: Vec<u8>,
}

impl MimePart {
    /// Parse a complete raw message into a tree.
    ///
    /// Returns `None` when the bytes do not start with a header block.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let root = Self::parse_lenient(raw);
        (!root.headers.is_empty()).then_some(root)
    }

    /// Parse a raw message; text without headers becomes a headerless
    /// `text/plain` body. Never fails.
    pub fn parse_lenient(raw: &[u8]) -> Self {
        Self::entity(skip_from_line(raw), "text/plain", 0)
    }

    fn entity(raw: &[u8], default_type: &'static str, depth: usize) -> Self {
        let (header_bytes, body) = split_entity(raw);
        let fields = if header_bytes.is_empty() {
            MimeFields::default()
        } else {
            MimeFields::read(header_bytes)
        };

        let mut part = Self {
            headers: unfold_headers(&decode_header_bytes(header_bytes)),
            fields,
            default_type,
            multipart: false,
            children: Vec::new(),
            body: body.to_vec(),
            source: raw.to_vec(),
        };

        if part.main_type() != "multipart" {
            return part;
        }
        let Some(boundary) = part.content_type_param("boundary").map(str::to_string) else {
            return part;
        };

        part.multipart = true;
        if depth >= MAX_MULTIPART_DEPTH {
            tracing::warn!(depth, "Multipart nesting too deep, ignoring children");
            return part;
        }

        let child_default = if part.content_type() == "multipart/digest" {
            "message/rfc822"
        } else {
            "text/plain"
        };
        part.children = split_multipart(body, &boundary)
            .into_iter()
            .map(|child| Self::entity(child, child_default, depth + 1))
            .collect();
        part
    }

    /// Whether this node is a multipart container.
    pub fn is_multipart(&self) -> bool {
        self.multipart
    }

    /// Lowercased `type/subtype`, defaulting to `text/plain`
    /// (`message/rfc822` inside `multipart/digest`).
    pub fn content_type(&self) -> &str {
        self.fields.content_type.as_deref().unwrap_or(self.default_type)
    }

    /// Main type, e.g. `"message"` for `message/rfc822`.
    pub fn main_type(&self) -> &str {
        self.content_type().split('/').next().unwrap_or("")
    }

    /// A `Content-Type` parameter (e.g. `charset`), with RFC 2231 forms
    /// already resolved.
    pub fn content_type_param(&self, name: &str) -> Option<&str> {
        self.fields
            .params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Lowercased `Content-Transfer-Encoding`, if declared.
    pub fn transfer_encoding(&self) -> Option<&str> {
        self.fields.transfer_encoding.as_deref()
    }

    /// Declared filename: `Content-Disposition` `filename`, then
    /// `Content-Type` `name`.
    pub fn filename(&self) -> Option<&str> {
        self.fields.filename.as_deref()
    }

    /// Child parts of a multipart container, in document order.
    pub fn children(&self) -> &[MimePart] {
        &self.children
    }

    /// The payload, raw or transfer-decoded.
    ///
    /// Undecodable payloads are returned as-is in `Decoded` mode.
    pub fn payload(&self, mode: PayloadMode) -> Cow<'_, [u8]> {
        if mode == PayloadMode::Raw {
            return Cow::Borrowed(&self.body);
        }
        match self.transfer_encoding() {
            Some("base64") => match decode_base64(&self.body) {
                Ok(bytes) => Cow::Owned(bytes),
                Err(e) => {
                    tracing::debug!(error = %e, "Invalid base64 payload, keeping raw bytes");
                    Cow::Borrowed(&self.body)
                }
            },
            Some("quoted-printable") => {
                match quoted_printable::decode(&self.body, quoted_printable::ParseMode::Robust) {
                    Ok(bytes) => Cow::Owned(bytes),
                    Err(_) => Cow::Borrowed(&self.body),
                }
            }
            _ => Cow::Borrowed(&self.body),
        }
    }

    /// The whole part (headers and body) as it appeared in the message.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Messages carried in the payload of a `message/*` part.
    ///
    /// A `message/delivery-status` payload holds one header block per
    /// recipient and yields one message per block. Other subtypes carry at
    /// most one message. A payload that does not open with a header block
    /// yields nothing.
    pub fn embedded_messages(&self) -> Vec<MimePart> {
        if self.main_type() != "message" {
            return Vec::new();
        }
        let payload = self.payload(PayloadMode::Decoded);
        if self.content_type() == "message/delivery-status" {
            header_blocks(&payload)
                .into_iter()
                .filter_map(MimePart::parse)
                .collect()
        } else {
            MimePart::parse(&payload).into_iter().collect()
        }
    }

    /// Depth-first, pre-order traversal of this part and every multipart
    /// descendant. Embedded messages are not entered.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

impl HeaderSource for MimePart {
    fn header_entries(&self) -> &[HeaderEntry] {
        &self.headers
    }
}

/// Iterator returned by [`MimePart::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a MimePart>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a MimePart;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.children.iter().rev());
        Some(part)
    }
}

/// Skip a leading UTF-8 BOM and the `From ` separator line of MBOX messages.
pub fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Split an entity into its header block and body.
///
/// Only an entity whose first line is a header field has headers; anything
/// else (a leading blank line, stray prose) is body from the start.
fn split_entity(raw: &[u8]) -> (&[u8], &[u8]) {
    let first_line = raw.split(|&b| b == b'\n').next().unwrap_or_default();
    let first_line = first_line.strip_suffix(b"\r").unwrap_or(first_line);

    if header_field(&String::from_utf8_lossy(first_line)).is_none() {
        let body = raw
            .strip_prefix(b"\r\n")
            .or_else(|| raw.strip_prefix(b"\n"))
            .unwrap_or(raw);
        return (&[], body);
    }

    let Some(end) = find_header_end(raw) else {
        return (raw, &[]);
    };
    (&raw[..end], body_after(raw, end))
}

/// Split a multipart body on its `--boundary` delimiter lines.
///
/// Each slice is one body part, without the line break that belongs to the
/// next delimiter. Preamble and epilogue are dropped; without a close
/// delimiter the last part runs to the end of the body.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let dash_boundary = format!("--{boundary}");
    let delimiter = format!("\n{dash_boundary}");

    let first = body.starts_with(dash_boundary.as_bytes()).then_some(0);
    let line_starts = first
        .into_iter()
        .chain(memmem::find_iter(body, delimiter.as_bytes()).map(|pos| pos + 1));

    let mut parts = Vec::new();
    let mut open: Option<usize> = None;

    for line_start in line_starts {
        let after = line_start + dash_boundary.len();
        let line_end = memchr::memchr(b'\n', &body[after..]).map_or(body.len(), |pos| after + pos + 1);
        let tail = &body[after..line_end];
        let closing = tail.starts_with(b"--");
        let padding = if closing { &tail[2..] } else { tail };
        // "--B" is also the start of a nested "--BB" delimiter
        if !padding.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        if let Some(start) = open.take() {
            let end = line_start.saturating_sub(1).max(start);
            let part = &body[start..end];
            parts.push(part.strip_suffix(b"\r").unwrap_or(part));
        }
        if closing {
            return parts;
        }
        open = Some(line_end);
    }

    if let Some(start) = open {
        parts.push(&body[start..]);
    }
    parts
}

/// Blank-line separated blocks of `payload`, empty ones skipped.
fn header_blocks(payload: &[u8]) -> Vec<&[u8]> {
    let mut blocks = Vec::new();
    let mut rest = payload;

    loop {
        while let Some(stripped) = rest
            .strip_prefix(b"\r\n")
            .or_else(|| rest.strip_prefix(b"\n"))
        {
            rest = stripped;
        }
        if rest.is_empty() {
            return blocks;
        }
        match find_header_end(rest) {
            Some(end) => {
                blocks.push(&rest[..end]);
                rest = &rest[end..];
            }
            None => {
                blocks.push(rest);
                return blocks;
            }
        }
    }
}

/// Find the byte offset where headers end (position of the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    // Look for \n\n or \r\n\r\n
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i);
        }
        if i + 3 < data.len()
            && data[i] == b'\r'
            && data[i + 1] == b'\n'
            && data[i + 2] == b'\r'
            && data[i + 3] == b'\n'
        {
            return Some(i);
        }
    }
    None
}

/// Body bytes following the blank line that starts at `header_end`.
fn body_after(data: &[u8], header_end: usize) -> &[u8] {
    let rest = &data[header_end..];
    if let Some(body) = rest.strip_prefix(b"\r\n\r\n") {
        body
    } else if let Some(body) = rest.strip_prefix(b"\n\n") {
        body
    } else {
        &[]
    }
}
