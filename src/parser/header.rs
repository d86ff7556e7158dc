//! Header text: byte decoding, unfolding and RFC 2047 encoded-words.

use std::sync::LazyLock;

use base64::Engine;
use regex::Regex;
use tracing::warn;

use crate::model::header::HeaderEntry;

use super::mime::LENIENT_BASE64;

static ENCODED_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?=").expect("encoded-word pattern is valid")
});

/// Header bytes as text: UTF-8 when valid, Windows-1252 otherwise.
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec()).unwrap_or_else(|e| {
        encoding_rs::WINDOWS_1252
            .decode_without_bom_handling(e.as_bytes())
            .0
            .into_owned()
    })
}

/// Split a header block into fields, joining folded continuation lines.
///
/// Names keep their case; order and repeats are kept. Lines that are neither
/// a field nor a continuation are dropped.
pub fn unfold_headers(text: &str) -> Vec<HeaderEntry> {
    let mut headers: Vec<HeaderEntry> = Vec::new();

    for line in text.lines() {
        if line.starts_with([' ', '\t']) {
            let folded = line.trim();
            match headers.last_mut() {
                Some(last) if !folded.is_empty() => {
                    if !last.value.is_empty() {
                        last.value.push(' ');
                    }
                    last.value.push_str(folded);
                }
                _ => {}
            }
        } else if let Some(entry) = header_field(line) {
            headers.push(entry);
        }
    }

    headers
}

/// Parse a `Name: value` line.
pub(crate) fn header_field(line: &str) -> Option<HeaderEntry> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim_end();
    let valid = !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic());
    valid.then(|| HeaderEntry::new(name, value.trim()))
}

/// Resolve every RFC 2047 encoded-word (`=?charset?B|Q?text?=`) in `input`.
///
/// Whitespace between two adjacent encoded-words is dropped. Words that do
/// not decode are left as they are.
pub fn decode_encoded_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut copied = 0;
    let mut after_word = false;

    for caps in ENCODED_WORD_RE.captures_iter(input) {
        let Some(word) = caps.get(0) else { continue };
        let Some(text) = decode_word(&caps[1], &caps[2], &caps[3]) else {
            after_word = false;
            continue;
        };

        let gap = &input[copied..word.start()];
        if !(after_word && gap.trim().is_empty()) {
            out.push_str(gap);
        }
        out.push_str(&text);
        copied = word.end();
        after_word = true;
    }

    out.push_str(&input[copied..]);
    out
}

fn decode_word(charset: &str, encoding: &str, text: &str) -> Option<String> {
    let bytes = if encoding.eq_ignore_ascii_case("b") {
        LENIENT_BASE64.decode(text).ok()?
    } else {
        quoted_printable::decode(text.replace('_', " "), quoted_printable::ParseMode::Robust).ok()?
    };
    // charset*language
    let charset = charset.split('*').next().unwrap_or(charset);
    Some(decode_charset(charset, &bytes))
}

fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match encoding_rs::Encoding::for_label(charset.trim().as_bytes()) {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        None => {
            warn!(charset, "Unknown charset in encoded-word, decoding as UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
