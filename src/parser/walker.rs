//! Attachment classification.
//!
//! Every part of a message is visited once, depth-first. Embedded messages
//! (`message/*` parts and base64 `.eml` files) are normalized recursively.
//! A `message/*` part without a header block leaves its text behind as an
//! orphan. Other parts become [`AttachedFile`]s when they carry a name.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::model::email::NormalizedMessage;
use crate::model::file::AttachedFile;
use crate::model::header::HeaderSource;

use super::body::decode_text;
use super::header::decode_encoded_words;
use super::mime::{decode_base64, MimePart, PayloadMode};
use super::normalize::EmailParser;

static CONTENT_TYPE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="([^"]*)""#).expect("filename pattern is valid")
});

/// Everything found below a message's root part.
#[derive(Debug, Default)]
pub struct Attachments {
    pub files: Vec<AttachedFile>,
    pub emails: Vec<NormalizedMessage>,
    /// Text that could not be attributed to any attachment, deduplicated.
    pub orphans: Vec<String>,
}

/// Classify every part of `root`. Nested messages are normalized at
/// `depth + 1`; beyond the parser's depth limit they are not descended into.
pub fn walk(parser: &EmailParser, root: &MimePart, account: &str, depth: usize) -> Attachments {
    let mut found = Attachments::default();
    let can_descend = depth < parser.max_depth();

    for part in root.walk() {
        let main_type = part.main_type();
        debug!(main_type, depth, "Visiting part");

        if main_type.is_empty() || main_type == "multipart" {
            continue;
        }

        if main_type == "message" {
            if !can_descend {
                warn!(depth, "Nesting limit reached, skipping attached message");
                continue;
            }
            let inner = part.embedded_messages();
            if inner.is_empty() {
                let payload = part.payload(PayloadMode::Decoded);
                let text = decode_text(&payload, None).into_string();
                if !text.trim().is_empty() {
                    debug!("Attached message has no headers, keeping its text");
                    found.orphans.push(text);
                }
                continue;
            }
            info!(count = inner.len(), "Parsing attached email");
            found
                .emails
                .extend(inner.iter().map(|message| parser.normalize_at(message, account, depth + 1)));
            continue;
        }

        let Some(raw_name) = part
            .filename()
            .map(str::to_string)
            .or_else(|| content_type_name(part))
        else {
            info!("Could not find filename of attachment, ignoring attachment");
            continue;
        };

        let name = decode_encoded_words(&raw_name);
        let content = file_content(part);

        if name.ends_with(".eml") {
            if can_descend {
                info!(name = %name, "Attachment appears to be an .eml, attempting to convert");
                match eml_to_message(parser, &content, account, depth) {
                    Some(message) => {
                        info!(name = %name, "Conversion succeeded");
                        found.emails.push(message);
                        continue;
                    }
                    None => info!(name = %name, "Conversion failed, attaching as file"),
                }
            } else {
                warn!(name = %name, depth, "Nesting limit reached, keeping .eml as a file");
            }
        }

        found.files.push(AttachedFile::new(name, part.content_type(), content));
    }

    found.orphans = dedup_in_order(found.orphans);
    found
}

/// Fallback filename: a `name="..."` anywhere in the raw `Content-Type`.
fn content_type_name(part: &MimePart) -> Option<String> {
    let header = part.header("Content-Type")?;
    let name = CONTENT_TYPE_NAME_RE.captures(header)?.get(1)?.as_str().trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Attachment content in its transport form, with line breaks removed so
/// base64 content becomes one contiguous token.
fn file_content(part: &MimePart) -> String {
    let raw = part.payload(PayloadMode::Raw);
    let text = match std::str::from_utf8(&raw) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!("Attachment payload is not text, using the serialized part");
            String::from_utf8_lossy(part.source()).into_owned()
        }
    };

    let content = text.replace("\r\n", "");
    if part.transfer_encoding() == Some("base64") {
        content.replace('\n', "")
    } else {
        content
    }
}

fn eml_to_message(
    parser: &EmailParser,
    content: &str,
    account: &str,
    depth: usize,
) -> Option<NormalizedMessage> {
    let bytes = decode_base64(content.as_bytes())
        .map_err(|e| debug!(error = %e, ".eml content is not base64"))
        .ok()?;
    let source = String::from_utf8(bytes)
        .map_err(|e| debug!(error = %e, ".eml content is not UTF-8"))
        .ok()?;
    let message = MimePart::parse(source.as_bytes())?;
    Some(parser.normalize_at(&message, account, depth + 1))
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn parse(raw: &str) -> MimePart {
        MimePart::parse(raw.as_bytes()).unwrap()
    }

    fn walk_root(raw: &str) -> Attachments {
        walk(&EmailParser::default(), &parse(raw), "acct", 0)
    }

    #[test]
    fn test_named_part_becomes_file() {
        let raw = "Content-Type: multipart/mixed; boundary=\"B\"\n\n\
--B\nContent-Type: text/plain\n\nbody\n\
--B\nContent-Type: application/pdf\nContent-Disposition: attachment; filename=\"r.pdf\"\nContent-Transfer-Encoding: base64\n\naGVs\nbG8=\n\
--B--\n";
        let found = walk_root(raw);
        assert_eq!(found.files.len(), 1);
        let file = &found.files[0];
        assert_eq!(file.name, "r.pdf");
        assert_eq!(file.content_type, "application/pdf");
        assert_eq!(file.content, "aGVsbG8=");
        assert!(found.emails.is_empty());
    }

    #[test]
    fn test_unnamed_parts_are_dropped() {
        let raw = "Content-Type: multipart/mixed; boundary=\"B\"\n\n\
--B\nContent-Type: image/png\n\nPNG\n\
--B--\n";
        let found = walk_root(raw);
        assert!(found.files.is_empty());
        assert!(found.emails.is_empty());
    }

    #[test]
    fn test_filename_from_raw_content_type() {
        let raw = "Content-Type: multipart/mixed; boundary=\"B\"\n\n\
--B\nContent-Type: image/png;name=\"pic.png\"\n\nPNG\n\
--B--\n";
        let found = walk_root(raw);
        assert_eq!(found.files[0].name, "pic.png");
    }

    #[test]
    fn test_encoded_filename_is_decoded() {
        let raw = "Content-Type: multipart/mixed; boundary=\"B\"\n\n\
--B\nContent-Type: text/plain; name=\"=?UTF-8?B?Y2Fmw6kudHh0?=\"\n\nx\n\
--B--\n";
        let found = walk_root(raw);
        assert_eq!(found.files[0].name, "café.txt");
    }

    #[test]
    fn test_attached_message_is_normalized() {
        let raw = "Subject: outer\nContent-Type: multipart/mixed; boundary=\"B\"\n\n\
--B\nContent-Type: text/plain\n\nouter body\n\
--B\nContent-Type: message/rfc822\n\nSubject: inner\nFrom: x@example.com\n\ninner body\n\
--B--\n";
        let found = walk_root(raw);
        assert_eq!(found.emails.len(), 1);
        assert_eq!(found.emails[0].subject, "inner");
        assert_eq!(found.emails[0].sender, "x@example.com");
        assert!(found.files.is_empty());
    }

    #[test]
    fn test_base64_eml_becomes_message() {
        let inner = "Subject: attached\nTo: a@x.com\n\nhello\n";
        let encoded = base64::engine::general_purpose::STANDARD.encode(inner);
        let raw = format!(
            "Content-Type: multipart/mixed; boundary=\"B\"\n\n\
--B\nContent-Type: application/octet-stream; name=\"fwd.eml\"\nContent-Transfer-Encoding: base64\n\n{encoded}\n\
--B--\n"
        );
        let found = walk_root(&raw);
        assert!(found.files.is_empty());
        assert_eq!(found.emails.len(), 1);
        assert_eq!(found.emails[0].subject, "attached");
        assert_eq!(found.emails[0].recipients, vec!["a@x.com"]);
    }

    #[test]
    fn test_broken_eml_stays_a_file() {
        let raw = "Content-Type: multipart/mixed; boundary=\"B\"\n\n\
--B\nContent-Type: application/octet-stream; name=\"bad.eml\"\n\nnot base64 at all!\n\
--B--\n";
        let found = walk_root(raw);
        assert_eq!(found.files.len(), 1);
        assert_eq!(found.files[0].name, "bad.eml");
    }

    #[test]
    fn test_depth_limit_keeps_eml_as_file() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("Subject: deep\n\nx\n");
        let raw = format!(
            "Content-Type: multipart/mixed; boundary=\"B\"\n\n\
--B\nContent-Type: application/octet-stream; name=\"deep.eml\"\nContent-Transfer-Encoding: base64\n\n{encoded}\n\
--B--\n"
        );
        let parser = EmailParser::default().with_max_depth(0);
        let found = walk(&parser, &parse(&raw), "acct", 0);
        assert!(found.emails.is_empty());
        assert_eq!(found.files[0].name, "deep.eml");
    }

    #[test]
    fn test_headerless_message_part_becomes_orphan() {
        let raw = "Content-Type: multipart/mixed; boundary=\"B\"\n\n\
--B\nContent-Type: message/rfc822\n\njust some stray text\n\
--B\nContent-Type: message/rfc822\n\njust some stray text\n\
--B--\n";
        let found = walk_root(raw);
        assert!(found.emails.is_empty());
        assert_eq!(found.orphans.len(), 1);
        assert!(found.orphans[0].contains("just some stray text"));
    }

    #[test]
    fn test_orphan_does_not_hide_following_file() {
        let raw = "Content-Type: multipart/mixed; boundary=\"B\"\n\n\
--B\nContent-Type: message/rfc822\n\nstray words\n\
--B\nContent-Type: application/pdf; name=\"after.pdf\"\n\nPDF\n\
--B--\n";
        let found = walk_root(raw);
        assert!(found.emails.is_empty());
        assert_eq!(found.orphans, vec!["stray words"]);
        assert_eq!(found.files.len(), 1);
        assert_eq!(found.files[0].name, "after.pdf");
        assert_eq!(found.files[0].content, "PDF");
    }

    #[test]
    fn test_distinct_orphans_keep_document_order() {
        let raw = "Content-Type: multipart/mixed; boundary=\"B\"\n\n\
--B\nContent-Type: message/rfc822\n\nsecond thought\n\
--B\nContent-Type: message/rfc822\n\nfirst thought\n\
--B\nContent-Type: message/rfc822\n\nsecond thought\n\
--B\nContent-Type: message/rfc822\n\n   \n\
--B--\n";
        let found = walk_root(raw);
        assert_eq!(found.orphans, vec!["second thought", "first thought"]);
    }

    #[test]
    fn test_delivery_status_gives_one_message_per_block() {
        let raw = "Subject: Undelivered Mail\n\
Content-Type: multipart/report; report-type=delivery-status; boundary=\"R\"\n\n\
--R\nContent-Type: text/plain\n\nDelivery failed.\n\
--R\nContent-Type: message/delivery-status\n\n\
Reporting-MTA: dns; mx.example.com\n\n\
Final-Recipient: rfc822; a@example.com\nAction: failed\n\n\
Final-Recipient: rfc822; b@example.com\nAction: failed\n\
--R--\n";
        let found = walk_root(raw);
        assert_eq!(found.emails.len(), 3);
        assert!(found.orphans.is_empty());
        assert_eq!(
            found.emails[0].header("Reporting-MTA"),
            Some("dns; mx.example.com")
        );
        assert_eq!(
            found.emails[2].header("Final-Recipient"),
            Some("rfc822; b@example.com")
        );
        assert!(found.emails.iter().all(|m| m.account == "acct"));
    }

    #[test]
    fn test_eml_suffix_is_case_sensitive() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("Subject: upper\n\nx\n");
        let raw = format!(
            "Content-Type: multipart/mixed; boundary=\"B\"\n\n\
--B\nContent-Type: application/octet-stream; name=\"FWD.EML\"\nContent-Transfer-Encoding: base64\n\n{encoded}\n\
--B--\n"
        );
        let found = walk_root(&raw);
        assert!(found.emails.is_empty());
        assert_eq!(found.files.len(), 1);
        assert_eq!(found.files[0].name, "FWD.EML");
        assert_eq!(found.files[0].content, encoded);
    }

    #[test]
    fn test_dedup_in_order() {
        let items = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(dedup_in_order(items), vec!["b", "a"]);
    }
}
