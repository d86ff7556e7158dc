//! Body selection and text decoding.
//!
//! A message may carry several candidate bodies (alternatives, inline text
//! parts next to attachments). Exactly one is picked, in this order:
//!
//! 1. a single-part message: its own payload;
//! 2. `multipart/alternative`: the last alternative, the most faithful one;
//! 3. any other multipart: the first nested alternative group, or the first
//!    inline `text/plain` / `text/html` part.

use tracing::{debug, warn};

use crate::model::header::HeaderSource;

use super::mime::{decode_base64, MimePart, PayloadMode};

/// Outcome of turning payload bytes into text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedText {
    /// The bytes were valid UTF-8.
    Clean(String),
    /// The bytes were not valid UTF-8 and had to be repaired.
    Repaired(String),
}

impl DecodedText {
    pub fn as_str(&self) -> &str {
        match self {
            DecodedText::Clean(s) | DecodedText::Repaired(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            DecodedText::Clean(s) | DecodedText::Repaired(s) => s,
        }
    }
}

/// Decode payload bytes as UTF-8, repairing them when that fails.
///
/// Repair uses the declared charset when one is known, otherwise
/// [`detwingle`] followed by lossy UTF-8 decoding.
pub fn decode_text(bytes: &[u8], charset: Option<&str>) -> DecodedText {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedText::Clean(text.to_string());
    }

    let declared = charset
        .map(str::trim)
        .filter(|c| !c.eq_ignore_ascii_case("utf-8") && !c.eq_ignore_ascii_case("utf8"))
        .and_then(|c| encoding_rs::Encoding::for_label(c.as_bytes()));

    match declared {
        Some(encoding) => {
            debug!(charset = encoding.name(), "Payload is not UTF-8, decoding with declared charset");
            let (text, _) = encoding.decode_without_bom_handling(bytes);
            DecodedText::Repaired(text.into_owned())
        }
        None => {
            debug!("Payload is not UTF-8, repairing Windows-1252 fragments");
            DecodedText::Repaired(detwingle(bytes))
        }
    }
}

/// Repair text that mixes UTF-8 with stray Windows-1252 bytes (smart quotes
/// pasted into a UTF-8 document, for instance).
///
/// Valid UTF-8 runs are kept; every invalid byte is read as Windows-1252.
pub fn detwingle(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
        if !chunk.invalid().is_empty() {
            let (repaired, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(chunk.invalid());
            out.push_str(&repaired);
        }
    }
    out
}

/// Pick and decode the display body of a message.
///
/// Never fails; a message with no usable text part yields `""`.
pub fn decode_body(message: &MimePart) -> String {
    if !message.is_multipart() {
        return match decode_part(message) {
            DecodedText::Clean(text) => text,
            DecodedText::Repaired(text) => strip_newlines(&text),
        };
    }

    if message.content_type() == "multipart/alternative" {
        return last_alternative(message);
    }

    first_inline_text(message)
}

/// [`decode_body`] with CR-LF pairs removed: mail clients that hard-wrap
/// long lines leave them behind.
pub fn body_text(message: &MimePart) -> String {
    decode_body(message).replace("\r\n", "")
}

fn decode_part(part: &MimePart) -> DecodedText {
    let charset = part.content_type_param("charset");
    decode_text(&part.payload(PayloadMode::Decoded), charset)
}

fn strip_newlines(text: &str) -> String {
    text.replace('\n', "")
}

fn last_alternative(group: &MimePart) -> String {
    let Some(last) = group.children().last() else {
        return String::new();
    };

    if last.is_multipart() {
        return first_inline_text(last);
    }

    let charset = last.content_type_param("charset");
    let raw = last.payload(PayloadMode::Raw);
    let body = decode_text(&raw, charset).into_string();

    if last.transfer_encoding() != Some("base64") {
        return body;
    }

    let compact = strip_newlines(&body);
    let decoded = decode_base64(compact.as_bytes())
        .map_err(|e| e.to_string())
        .and_then(|bytes| String::from_utf8(bytes).map_err(|e| e.to_string()));
    match decoded {
        Ok(text) => text,
        Err(error) => {
            warn!(%error, "Failed to decode base64 body, returning it as is");
            compact
        }
    }
}

fn first_inline_text(container: &MimePart) -> String {
    for part in container.walk() {
        let content_type = part.content_type();

        if content_type == "multipart/alternative" {
            return last_alternative(part);
        }

        if content_type == "text/plain" || content_type == "text/html" {
            let is_attachment = part
                .header("Content-Disposition")
                .is_some_and(|d| d.to_ascii_lowercase().contains("attachment"));
            if !is_attachment {
                return strip_newlines(decode_part(part).as_str());
            }
        }
    }
    String::new()
}
