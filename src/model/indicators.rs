//! Content fingerprints.
//!
//! Every body and every attachment payload carries a [`ContentIndicators`]
//! triple. Messages additionally record the DKIM/DMARC/SPF verdict fragments of
//! their `Authentication-Results` header.

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::header::HeaderSource;

/// MD5, SHA-1 and SHA-256 hex digests of a piece of text, plus optional
/// authentication-result tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentIndicators {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,

    /// `dkim=...` token from `Authentication-Results`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dkim: Option<String>,

    /// `dmarc=...` token from `Authentication-Results`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dmarc: Option<String>,

    /// `spf=...` token from `Authentication-Results`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spf: Option<String>,
}

impl ContentIndicators {
    /// Fingerprint the UTF-8 bytes of `content`.
    ///
    /// Total: the empty string yields the digests of the empty byte string.
    pub fn compute(content: &str) -> Self {
        let bytes = content.as_bytes();
        Self {
            md5: hex::encode(Md5::digest(bytes)),
            sha1: hex::encode(Sha1::digest(bytes)),
            sha256: hex::encode(Sha256::digest(bytes)),
            dkim: None,
            dmarc: None,
            spf: None,
        }
    }

    /// Fingerprint `content` and attach the authentication tokens found in
    /// the first `Authentication-Results` header of `headers`.
    pub fn with_authentication<H: HeaderSource + ?Sized>(content: &str, headers: &H) -> Self {
        let mut indicators = Self::compute(content);
        if let Some(results) = headers.header("Authentication-Results") {
            indicators.dkim = auth_token(results, "dkim");
            indicators.dmarc = auth_token(results, "dmarc");
            indicators.spf = auth_token(results, "spf");
        }
        indicators
    }
}

/// First `;`-separated token of `results` starting with `prefix`, with
/// embedded line breaks removed.
fn auth_token(results: &str, prefix: &str) -> Option<String> {
    results
        .split(';')
        .map(str::trim)
        .find(|token| token.starts_with(prefix))
        .map(|token| token.replace(['\r', '\n'], ""))
}
