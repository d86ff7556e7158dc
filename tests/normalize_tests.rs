//! Integration tests: normalizing fixture messages end to end.

use std::path::Path;

use base64::Engine;

use emlnorm::export::json::to_clean_value;
use emlnorm::model::indicators::ContentIndicators;
use emlnorm::parser::eml::normalize_file;
use emlnorm::parser::mbox::MboxReader;
use emlnorm::parser::EmailParser;

const ACCOUNT: &str = "somedude@hotmail.com";

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn normalize(name: &str) -> emlnorm::model::email::NormalizedMessage {
    normalize_file(&EmailParser::new(), fixture(name), ACCOUNT).unwrap()
}

// ─── Single-part message ────────────────────────────────────────────

#[test]
fn test_basic_message_fields() {
    let msg = normalize("basic.eml");

    assert_eq!(msg.account, ACCOUNT);
    assert_eq!(msg.date_received, "Thu, 8 Aug 2019 17:29:14 +0000");
    assert_eq!(msg.sender, "alice@example.com");
    assert_eq!(msg.recipients, vec!["bob@example.com", "carol@example.org"]);
    assert_eq!(msg.subject, "Quarterly report \u{2013} draft");
    assert_eq!(msg.body, "Hello Bob,This is a test.");
    assert_eq!(msg.indicators.md5, "c84c6859f28046a80a44c1296de42d57");
    assert!(!msg.has_attachments);
}

#[test]
fn test_basic_message_headers_in_order() {
    let msg = normalize("basic.eml");
    let names: Vec<&str> = msg.headers.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Return-Path",
            "Delivered-To",
            "Authentication-Results",
            "Date",
            "From",
            "To",
            "Subject",
            "Message-ID",
            "MIME-Version",
            "Content-Type",
        ]
    );
}

#[test]
fn test_authentication_tokens() {
    let msg = normalize("basic.eml");
    assert_eq!(
        msg.indicators.dkim.as_deref(),
        Some("dkim=pass header.i=@example.com")
    );
    assert_eq!(
        msg.indicators.spf.as_deref(),
        Some("spf=pass (sender IP is 192.0.2.1) smtp.mailfrom=example.com")
    );
    assert_eq!(
        msg.indicators.dmarc.as_deref(),
        Some("dmarc=pass action=none header.from=example.com")
    );
}

#[test]
fn test_latin1_body_and_headers() {
    let msg = normalize("latin1.eml");
    assert_eq!(msg.subject, "Grüße");
    assert_eq!(msg.sender, "juergen@example.de");
    assert_eq!(msg.body, "Viele Grüßeaus München");
}

#[test]
fn test_recipients_from_delivered_to() {
    let msg = normalize("delivered_to.eml");
    assert_eq!(
        msg.recipients,
        vec!["someguy@microsoft.com", "someotherguy@gmail.com"]
    );
}

// ─── Alternatives ───────────────────────────────────────────────────

#[test]
fn test_last_alternative_is_the_body() {
    let msg = normalize("alternative.eml");
    assert_eq!(msg.body, "<html><body><p>Third rendition</p></body></html>");
    assert!(!msg.has_attachments);
}

// ─── Nested messages ────────────────────────────────────────────────

#[test]
fn test_nested_tree() {
    let msg = normalize("nested.eml");

    assert_eq!(msg.subject, "level 3");
    assert!(msg.body.contains("level 3"));
    assert!(msg.has_attachments);

    let subjects: Vec<&str> = msg
        .attached_emails
        .iter()
        .map(|m| m.subject.as_str())
        .collect();
    assert_eq!(subjects, vec!["Level 2 subject", "Another attached"]);

    assert_eq!(msg.attached_files.len(), 1);
    let pixel = &msg.attached_files[0];
    assert_eq!(pixel.name, "pixel.png");
    assert_eq!(pixel.content_type, "image/png");
    let expected = base64::engine::general_purpose::STANDARD.encode((0u8..120).collect::<Vec<u8>>());
    assert_eq!(pixel.content, expected);
    assert_eq!(pixel.indicators, ContentIndicators::compute(&expected));

    let level2 = &msg.attached_emails[0];
    assert_eq!(level2.sender, "user@example.com");
    assert_eq!(level2.recipients, vec!["user@example.com"]);
    assert!(level2.body.contains("Level 2 body"));
    assert_eq!(level2.attached_emails.len(), 1);
    assert_eq!(level2.attached_emails[0].subject, "Level 1 subject");
    assert_eq!(level2.attached_files[0].name, "notes.txt");
}

#[test]
fn test_nested_flatten() {
    let mut msg = normalize("nested.eml");
    msg.flatten();

    let subjects: Vec<&str> = msg
        .flattened_attached_emails
        .iter()
        .map(|m| m.subject.as_str())
        .collect();
    assert_eq!(
        subjects,
        vec!["Another attached", "Level 1 subject", "Level 2 subject"]
    );

    let names: Vec<&str> = msg
        .flattened_attached_files
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, vec!["notes.txt", "pixel.png"]);
}

#[test]
fn test_has_attachments_invariant_everywhere() {
    fn check(msg: &emlnorm::model::email::NormalizedMessage) {
        assert_eq!(
            msg.has_attachments,
            !msg.attached_files.is_empty() || !msg.attached_emails.is_empty()
        );
        assert_eq!(msg.indicators.md5, ContentIndicators::compute(&msg.body).md5);
        msg.attached_emails.iter().for_each(check);
    }
    for name in ["basic.eml", "alternative.eml", "nested.eml", "eml_attached.eml"] {
        check(&normalize(name));
    }
}

#[test]
fn test_depth_limit() {
    let parser = EmailParser::new().with_max_depth(1);
    let msg = normalize_file(&parser, fixture("nested.eml"), ACCOUNT).unwrap();
    assert_eq!(msg.attached_emails.len(), 2);
    assert!(msg.attached_emails[0].attached_emails.is_empty());
}

// ─── Attached .eml files ────────────────────────────────────────────

#[test]
fn test_base64_eml_attachment_becomes_message() {
    let msg = normalize("eml_attached.eml");

    assert_eq!(msg.attached_emails.len(), 1);
    let inner = &msg.attached_emails[0];
    assert_eq!(inner.subject, "Forwarded suspicious mail");
    assert_eq!(inner.sender, "phisher@example.net");
    assert_eq!(inner.recipients, vec!["victim@example.com"]);
    assert!(inner.body.contains("Please click the link."));
    assert_eq!(inner.account, ACCOUNT);

    // not UTF-8 once decoded: kept as a plain file
    assert_eq!(msg.attached_files.len(), 1);
    assert_eq!(msg.attached_files[0].name, "broken.eml");
    assert_eq!(msg.attached_files[0].content, "//79/A==");
}

// ─── JSON ───────────────────────────────────────────────────────────

#[test]
fn test_clean_json_of_nested_tree() {
    let mut msg = normalize("nested.eml");
    msg.flatten();
    let value = to_clean_value(&msg).unwrap();

    assert_eq!(value["subject"], "level 3");
    assert_eq!(value["has_attachments"], true);
    assert_eq!(value["attached_emails"].as_array().unwrap().len(), 2);
    assert_eq!(value["flattened_attached_files"].as_array().unwrap().len(), 2);
    assert!(value["indicators"].get("dkim").is_none());
}

// ─── MBOX ───────────────────────────────────────────────────────────

#[test]
fn test_mbox_messages_normalize() {
    let reader = MboxReader::new(fixture("sample.mbox")).unwrap();
    let parser = EmailParser::new();

    let mut subjects = Vec::new();
    let count = reader
        .for_each_message(
            &mut |entry| {
                subjects.push(parser.normalize(entry.raw, ACCOUNT).subject);
                true
            },
            None,
        )
        .unwrap();

    assert_eq!(count, 3);
    assert_eq!(
        subjects,
        vec!["Quarterly report \u{2013} draft", "Three renditions", "No To header"]
    );
}
