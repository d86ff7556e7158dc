//! Loading individual `.eml` files (RFC 5322 messages without MBOX framing).

use std::path::Path;

use tracing::debug;

use crate::error::{NormalizeError, Result};
use crate::model::email::NormalizedMessage;

use super::normalize::EmailParser;

/// Read a raw message from disk.
pub fn read_message(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    if path.is_dir() {
        return Err(NormalizeError::InvalidPath(format!(
            "{} is a directory",
            path.display()
        )));
    }
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            NormalizeError::FileNotFound(path.to_path_buf())
        } else {
            NormalizeError::io(path, e)
        }
    })
}

/// Read and normalize a single `.eml` file.
///
/// Only I/O can fail; the message itself is always normalized best-effort.
pub fn normalize_file(
    parser: &EmailParser,
    path: impl AsRef<Path>,
    account: &str,
) -> Result<NormalizedMessage> {
    let path = path.as_ref();
    let data = read_message(path)?;
    debug!(path = %path.display(), bytes = data.len(), "Loaded message");
    Ok(parser.normalize(&data, account))
}
